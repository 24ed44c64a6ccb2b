//! Runtime dataset: the flat, firmware-mirrored form of an authoring graph.

pub(crate) mod animation;
pub(crate) mod behavior;
pub(crate) mod bits;

use crate::dataset::animation::Animation;
use crate::dataset::behavior::{
    ACTION_RECORD_SIZE, Action, Behavior, CONDITION_RECORD_SIZE, Condition, Rule,
};
use crate::dataset::bits::{AnimationBits, check_range};
use crate::foundation::error::{PixelsError, PixelsResult};

/// Everything a die needs to run a program, produced wholesale by one compile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataSet {
    /// Shared pools.
    pub bits: AnimationBits,
    /// Animation records, in authoring order.
    pub animations: Vec<Animation>,
    /// One condition per rule.
    pub conditions: Vec<Condition>,
    /// Actions, grouped per rule.
    pub actions: Vec<Action>,
    /// Rules, in authoring order.
    pub rules: Vec<Rule>,
    /// Rule range forming the die's program.
    pub behavior: Behavior,
}

impl DataSet {
    /// Total bytes of animation records, offset table excluded.
    pub fn animation_size(&self) -> usize {
        self.animations.iter().map(Animation::record_size).sum()
    }

    /// Total bytes of condition records, offset table excluded.
    pub fn condition_size(&self) -> usize {
        self.conditions.len() * CONDITION_RECORD_SIZE
    }

    /// Total bytes of action records, offset table excluded.
    pub fn action_size(&self) -> usize {
        self.actions.len() * ACTION_RECORD_SIZE
    }

    /// Check every cross-reference against the arrays it points into.
    pub fn validate(&self) -> PixelsResult<()> {
        self.bits.validate()?;

        for (name, n) in [
            ("rgb keyframes", self.bits.rgb_keyframes.len()),
            ("rgb tracks", self.bits.rgb_tracks.len()),
            ("keyframes", self.bits.keyframes.len()),
            ("tracks", self.bits.tracks.len()),
            ("animations", self.animations.len()),
            ("conditions", self.conditions.len()),
            ("actions", self.actions.len()),
            ("rules", self.rules.len()),
            ("animation bytes", self.animation_size()),
            ("condition bytes", self.condition_size()),
            ("action bytes", self.action_size()),
        ] {
            if n > usize::from(u16::MAX) {
                return Err(PixelsError::validation(format!(
                    "{name} count {n} does not fit in 16 bits"
                )));
            }
        }

        for (i, anim) in self.animations.iter().enumerate() {
            anim.validate(i, &self.bits)?;
        }

        for (i, action) in self.actions.iter().enumerate() {
            if let Action::PlayAnimation { anim_index, .. } = action
                && usize::from(*anim_index) >= self.animations.len()
            {
                return Err(PixelsError::validation(format!(
                    "action {i} plays animation {anim_index} of {}",
                    self.animations.len()
                )));
            }
        }

        for (i, rule) in self.rules.iter().enumerate() {
            check_range(
                "condition of rule",
                i,
                rule.condition,
                1,
                self.conditions.len(),
            )?;
            check_range(
                "actions of rule",
                i,
                rule.actions_offset,
                rule.action_count,
                self.actions.len(),
            )?;
        }

        check_range(
            "rules of behavior",
            0,
            self.behavior.rules_offset,
            self.behavior.rule_count,
            self.rules.len(),
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/dataset/dataset.rs"]
mod tests;
