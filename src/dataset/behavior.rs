//! Conditions, actions, rules and the behavior record.

/// Packed size of every condition record.
pub const CONDITION_RECORD_SIZE: usize = 4;
/// Packed size of every action record.
pub const ACTION_RECORD_SIZE: usize = 4;
/// Packed size of a rule record.
pub const RULE_RECORD_SIZE: usize = 6;
/// Packed size of the behavior record.
pub const BEHAVIOR_RECORD_SIZE: usize = 4;

/// Flag bits for [`Condition::HelloGoodbye`].
pub mod hello_goodbye {
    /// Die woke up.
    pub const HELLO: u8 = 1;
    /// Die is going to sleep.
    pub const GOODBYE: u8 = 2;
}

/// Flag bits for [`Condition::FaceCompare`].
pub mod face_compare {
    /// Rolled face is lower.
    pub const LESS: u8 = 1;
    /// Rolled face is equal.
    pub const EQUAL: u8 = 2;
    /// Rolled face is higher.
    pub const GREATER: u8 = 4;
}

/// Flag bits for [`Condition::ConnectionState`].
pub mod connection_state {
    /// Host connected.
    pub const CONNECTED: u8 = 1;
    /// Host disconnected.
    pub const DISCONNECTED: u8 = 2;
}

/// Flag bits for [`Condition::BatteryState`].
pub mod battery_state {
    /// Battery fine.
    pub const OK: u8 = 1;
    /// Battery low.
    pub const LOW: u8 = 2;
    /// On the charger.
    pub const CHARGING: u8 = 4;
    /// Charging finished.
    pub const DONE: u8 = 8;
}

/// Wire discriminant of a condition record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConditionType {
    /// Placeholder, never emitted.
    Unknown = 0,
    /// [`Condition::HelloGoodbye`].
    HelloGoodbye = 1,
    /// [`Condition::Handling`].
    Handling = 2,
    /// [`Condition::Rolling`].
    Rolling = 3,
    /// [`Condition::FaceCompare`].
    FaceCompare = 4,
    /// [`Condition::Crooked`].
    Crooked = 5,
    /// [`Condition::ConnectionState`].
    ConnectionState = 6,
    /// [`Condition::BatteryState`].
    BatteryState = 7,
    /// [`Condition::Idle`].
    Idle = 8,
}

/// Compiled rule trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Wake/sleep, see [`hello_goodbye`].
    HelloGoodbye {
        /// Flag bits.
        flags: u8,
    },
    /// Die picked up.
    Handling,
    /// Die rolling.
    Rolling {
        /// Re-trigger period in milliseconds.
        repeat_period_ms: u16,
    },
    /// Roll result compared with a face, see [`face_compare`].
    FaceCompare {
        /// Face compared against.
        face_index: u8,
        /// Flag bits.
        flags: u8,
    },
    /// Die landed crooked.
    Crooked,
    /// Connection changed, see [`connection_state`].
    ConnectionState {
        /// Flag bits.
        flags: u8,
    },
    /// Battery changed, see [`battery_state`].
    BatteryState {
        /// Flag bits.
        flags: u8,
        /// Re-trigger period in milliseconds.
        repeat_period_ms: u16,
    },
    /// No activity.
    Idle {
        /// Re-trigger period in milliseconds.
        repeat_period_ms: u16,
    },
}

impl Condition {
    /// Wire discriminant.
    pub fn kind(&self) -> ConditionType {
        match self {
            Condition::HelloGoodbye { .. } => ConditionType::HelloGoodbye,
            Condition::Handling => ConditionType::Handling,
            Condition::Rolling { .. } => ConditionType::Rolling,
            Condition::FaceCompare { .. } => ConditionType::FaceCompare,
            Condition::Crooked => ConditionType::Crooked,
            Condition::ConnectionState { .. } => ConditionType::ConnectionState,
            Condition::BatteryState { .. } => ConditionType::BatteryState,
            Condition::Idle { .. } => ConditionType::Idle,
        }
    }
}

/// Wire discriminant of an action record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActionType {
    /// Placeholder, never emitted.
    Unknown = 0,
    /// [`Action::PlayAnimation`].
    PlayAnimation = 1,
    /// [`Action::PlayAudioClip`].
    PlayAudioClip = 2,
}

/// Compiled rule effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Play a dataset animation.
    PlayAnimation {
        /// Index into the dataset's animations.
        anim_index: u8,
        /// Face to remap the animation onto.
        face_index: u8,
        /// Repetitions.
        loop_count: u8,
    },
    /// Ask the companion app to play a sound.
    PlayAudioClip {
        /// Clip identifier.
        clip_id: u16,
    },
}

impl Action {
    /// Wire discriminant.
    pub fn kind(&self) -> ActionType {
        match self {
            Action::PlayAnimation { .. } => ActionType::PlayAnimation,
            Action::PlayAudioClip { .. } => ActionType::PlayAudioClip,
        }
    }
}

/// One condition and the contiguous actions it triggers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rule {
    /// Index into the dataset's conditions.
    pub condition: u16,
    /// First action.
    pub actions_offset: u16,
    /// Number of actions.
    pub action_count: u16,
}

/// The die's program: a contiguous run of rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Behavior {
    /// First rule.
    pub rules_offset: u16,
    /// Number of rules.
    pub rule_count: u16,
}
