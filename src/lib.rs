//! Pixels compiles lighting-animation graphs for LED dice and delivers them over a lossy link.
//!
//! The pipeline has two halves:
//!
//! - [`compile()`] flattens an [`EditDataSet`] into a [`DataSet`], which [`write_dataset`] turns
//!   into the byte image the firmware reads in place.
//! - A [`Die`] drives one peripheral: connection lifecycle, message dispatch, chunked
//!   [bulk transfer](Die::upload_bulk_data) and the
//!   [dataset](Die::upload_dataset) / [preview](Die::play_test_animation) handshakes.
//!
//! [`sim::SimulatedDie`] stands in for real hardware in tests and dry runs.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod authoring;
pub(crate) mod compile;
pub(crate) mod dataset;
pub(crate) mod encode;
pub(crate) mod link;
pub(crate) mod protocol;

pub use crate::foundation::config::{MAX_CHUNK_SIZE, TransferOpts};
pub use crate::foundation::core::{ALL_FACES, LED_COUNT, Rgb8};
pub use crate::foundation::error::{PixelsError, PixelsResult};

pub use crate::authoring::model::{
    EditAction, EditAnimation, EditAnimationKind, EditBehavior, EditColor, EditCondition,
    EditDataSet, EditGradient, EditKeyframe, EditPattern, EditRgbGradient, EditRgbKeyframe,
    EditRgbTrack, EditRule, SpecialColor,
};
pub use crate::compile::compiler::{compile, compile_test_animation};
pub use crate::dataset::DataSet;
pub use crate::dataset::animation::{Animation, AnimationType};
pub use crate::dataset::behavior::{
    Action, ActionType, Behavior, Condition, ConditionType, Rule, battery_state,
    connection_state, face_compare, hello_goodbye,
};
pub use crate::dataset::bits::{AnimationBits, Keyframe, RgbKeyframe, RgbTrack, Track};
pub use crate::encode::fingerprint::{content_hash, dataset_hash, test_animation_hash};
pub use crate::encode::writer::{
    compute_size, compute_test_animation_size, write_dataset, write_test_animation,
};

pub use crate::link::connection::{ConnectionState, LastError};
pub use crate::link::die::{Die, DieStatus, TelemetrySubscription};
pub use crate::link::dispatch::{Dispatcher, Handler, HandlerGuard, HandlerId};
pub use crate::link::sim;
pub use crate::link::transport::Link;
pub use crate::protocol::dataset_transfer::TestAnimTransfer;
pub use crate::protocol::messages::{
    AccelFrame, AnimSetHeader, DieInfo, Message, MessageType, RollState, TestAnimAck,
    TestAnimSetHeader,
};
