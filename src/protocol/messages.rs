//! Wire messages exchanged with a die.
//!
//! Every packet starts with a one-byte [`MessageType`]; fields follow packed and little-endian.

use crate::dataset::DataSet;
use crate::foundation::bytes::{ByteReader, ByteWriter};
use crate::foundation::error::{PixelsError, PixelsResult};

/// Leading discriminant of every packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum MessageType {
    WhoAreYou = 1,
    IAmADie = 2,
    State = 3,
    Telemetry = 4,
    BulkSetup = 5,
    BulkSetupAck = 6,
    BulkData = 7,
    BulkDataAck = 8,
    TransferAnimSet = 9,
    TransferAnimSetAck = 10,
    TransferAnimSetFinished = 11,
    TransferTestAnimSet = 15,
    TransferTestAnimSetAck = 16,
    TransferTestAnimSetFinished = 17,
    DebugLog = 18,
    PlayAnim = 19,
    StopAnim = 21,
    RequestState = 23,
    RequestTelemetry = 26,
    Flash = 29,
    FlashFinished = 30,
    RequestBatteryLevel = 33,
    BatteryLevel = 34,
    RequestRssi = 35,
    Rssi = 36,
    SetAllLEDsToColor = 41,
}

impl MessageType {
    /// Parse a discriminant byte.
    pub fn from_u8(v: u8) -> Option<Self> {
        use MessageType::*;
        Some(match v {
            1 => WhoAreYou,
            2 => IAmADie,
            3 => State,
            4 => Telemetry,
            5 => BulkSetup,
            6 => BulkSetupAck,
            7 => BulkData,
            8 => BulkDataAck,
            9 => TransferAnimSet,
            10 => TransferAnimSetAck,
            11 => TransferAnimSetFinished,
            15 => TransferTestAnimSet,
            16 => TransferTestAnimSetAck,
            17 => TransferTestAnimSetFinished,
            18 => DebugLog,
            19 => PlayAnim,
            21 => StopAnim,
            23 => RequestState,
            26 => RequestTelemetry,
            29 => Flash,
            30 => FlashFinished,
            33 => RequestBatteryLevel,
            34 => BatteryLevel,
            35 => RequestRssi,
            36 => Rssi,
            41 => SetAllLEDsToColor,
            _ => return None,
        })
    }
}

/// Pool counts and section sizes announced before a dataset upload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct AnimSetHeader {
    pub palette_size: u16,
    pub rgb_keyframe_count: u16,
    pub rgb_track_count: u16,
    pub keyframe_count: u16,
    pub track_count: u16,
    pub animation_count: u16,
    pub animation_size: u16,
    pub condition_count: u16,
    pub condition_size: u16,
    pub action_count: u16,
    pub action_size: u16,
    pub rule_count: u16,
}

impl AnimSetHeader {
    /// Header for a validated dataset.
    pub fn for_dataset(ds: &DataSet) -> Self {
        // Validation bounds every count to 16 bits.
        Self {
            palette_size: ds.bits.palette_size() as u16,
            rgb_keyframe_count: ds.bits.rgb_keyframes.len() as u16,
            rgb_track_count: ds.bits.rgb_tracks.len() as u16,
            keyframe_count: ds.bits.keyframes.len() as u16,
            track_count: ds.bits.tracks.len() as u16,
            animation_count: ds.animations.len() as u16,
            animation_size: ds.animation_size() as u16,
            condition_count: ds.conditions.len() as u16,
            condition_size: ds.condition_size() as u16,
            action_count: ds.actions.len() as u16,
            action_size: ds.action_size() as u16,
            rule_count: ds.rules.len() as u16,
        }
    }
}

/// Pool counts, animation size and content hash announced before a preview upload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct TestAnimSetHeader {
    pub palette_size: u16,
    pub rgb_keyframe_count: u16,
    pub rgb_track_count: u16,
    pub keyframe_count: u16,
    pub track_count: u16,
    pub animation_size: u16,
    pub hash: u32,
}

impl TestAnimSetHeader {
    /// Header for a validated one-animation dataset.
    pub fn for_dataset(ds: &DataSet, hash: u32) -> Self {
        Self {
            palette_size: ds.bits.palette_size() as u16,
            rgb_keyframe_count: ds.bits.rgb_keyframes.len() as u16,
            rgb_track_count: ds.bits.rgb_tracks.len() as u16,
            keyframe_count: ds.bits.keyframes.len() as u16,
            track_count: ds.bits.tracks.len() as u16,
            animation_size: ds.animation_size() as u16,
            hash,
        }
    }
}

/// Die's answer to a preview announcement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TestAnimAck {
    /// Not enough memory for the preview.
    NoMemory = 0,
    /// Send the data.
    Download = 1,
    /// Same content already held; nothing to send.
    UpToDate = 2,
}

/// Identification reply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DieInfo {
    /// Number of faces.
    pub face_count: u8,
    /// Design/color code.
    pub design_and_color: u8,
    /// Unique device id.
    pub device_id: u32,
    /// Hash of the dataset currently in flash.
    pub data_set_hash: u32,
    /// Flash bytes available for a dataset.
    pub available_flash: u16,
}

/// Physical state reported by the die.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum RollState {
    #[default]
    Unknown = 0,
    OnFace = 1,
    Handling = 2,
    Rolling = 3,
    Crooked = 4,
}

impl RollState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => RollState::OnFace,
            2 => RollState::Handling,
            3 => RollState::Rolling,
            4 => RollState::Crooked,
            _ => RollState::Unknown,
        }
    }
}

/// One accelerometer sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct AccelFrame {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub delta_time_ms: i16,
}

/// A decoded packet.
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum Message {
    WhoAreYou,
    IAmADie(DieInfo),
    State { roll_state: RollState, face: u8 },
    Telemetry { frames: [AccelFrame; 2] },
    BulkSetup { size: i16 },
    BulkSetupAck,
    BulkData { offset: u16, payload: Vec<u8> },
    BulkDataAck { offset: u16 },
    TransferAnimSet(AnimSetHeader),
    TransferAnimSetAck { accepted: bool },
    TransferAnimSetFinished,
    TransferTestAnimSet(TestAnimSetHeader),
    TransferTestAnimSetAck(TestAnimAck),
    TransferTestAnimSetFinished,
    DebugLog { text: String },
    PlayAnim { index: u8, remap_face: u8, loop_count: u8 },
    StopAnim { index: u8, remap_face: u8 },
    RequestState,
    RequestTelemetry { on: bool },
    Flash { count: u8, color: u32 },
    FlashFinished,
    RequestBatteryLevel,
    BatteryLevel { level: f32 },
    RequestRssi,
    Rssi { rssi: i16 },
    SetAllLEDsToColor { color: u32 },
}

impl Message {
    /// Discriminant of this message.
    pub fn kind(&self) -> MessageType {
        match self {
            Message::WhoAreYou => MessageType::WhoAreYou,
            Message::IAmADie(_) => MessageType::IAmADie,
            Message::State { .. } => MessageType::State,
            Message::Telemetry { .. } => MessageType::Telemetry,
            Message::BulkSetup { .. } => MessageType::BulkSetup,
            Message::BulkSetupAck => MessageType::BulkSetupAck,
            Message::BulkData { .. } => MessageType::BulkData,
            Message::BulkDataAck { .. } => MessageType::BulkDataAck,
            Message::TransferAnimSet(_) => MessageType::TransferAnimSet,
            Message::TransferAnimSetAck { .. } => MessageType::TransferAnimSetAck,
            Message::TransferAnimSetFinished => MessageType::TransferAnimSetFinished,
            Message::TransferTestAnimSet(_) => MessageType::TransferTestAnimSet,
            Message::TransferTestAnimSetAck(_) => MessageType::TransferTestAnimSetAck,
            Message::TransferTestAnimSetFinished => MessageType::TransferTestAnimSetFinished,
            Message::DebugLog { .. } => MessageType::DebugLog,
            Message::PlayAnim { .. } => MessageType::PlayAnim,
            Message::StopAnim { .. } => MessageType::StopAnim,
            Message::RequestState => MessageType::RequestState,
            Message::RequestTelemetry { .. } => MessageType::RequestTelemetry,
            Message::Flash { .. } => MessageType::Flash,
            Message::FlashFinished => MessageType::FlashFinished,
            Message::RequestBatteryLevel => MessageType::RequestBatteryLevel,
            Message::BatteryLevel { .. } => MessageType::BatteryLevel,
            Message::RequestRssi => MessageType::RequestRssi,
            Message::Rssi { .. } => MessageType::Rssi,
            Message::SetAllLEDsToColor { .. } => MessageType::SetAllLEDsToColor,
        }
    }

    /// Serialize to a packet. `BulkData` payloads longer than 255 bytes are truncated to 255;
    /// the bulk layer never builds larger ones.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::default();
        w.u8(self.kind() as u8);
        match self {
            Message::WhoAreYou
            | Message::BulkSetupAck
            | Message::TransferAnimSetFinished
            | Message::TransferTestAnimSetFinished
            | Message::RequestState
            | Message::FlashFinished
            | Message::RequestBatteryLevel
            | Message::RequestRssi => {}
            Message::IAmADie(info) => {
                w.u8(info.face_count);
                w.u8(info.design_and_color);
                w.u32(info.device_id);
                w.u32(info.data_set_hash);
                w.u16(info.available_flash);
            }
            Message::State { roll_state, face } => {
                w.u8(*roll_state as u8);
                w.u8(*face);
            }
            Message::Telemetry { frames } => {
                for f in frames {
                    w.i16(f.x);
                    w.i16(f.y);
                    w.i16(f.z);
                    w.i16(f.delta_time_ms);
                }
            }
            Message::BulkSetup { size } => w.i16(*size),
            Message::BulkData { offset, payload } => {
                let n = payload.len().min(usize::from(u8::MAX));
                w.u16(*offset);
                w.u8(n as u8);
                w.bytes(&payload[..n]);
            }
            Message::BulkDataAck { offset } => w.u16(*offset),
            Message::TransferAnimSet(h) => {
                for v in [
                    h.palette_size,
                    h.rgb_keyframe_count,
                    h.rgb_track_count,
                    h.keyframe_count,
                    h.track_count,
                    h.animation_count,
                    h.animation_size,
                    h.condition_count,
                    h.condition_size,
                    h.action_count,
                    h.action_size,
                    h.rule_count,
                ] {
                    w.u16(v);
                }
            }
            Message::TransferAnimSetAck { accepted } => w.u8(u8::from(*accepted)),
            Message::TransferTestAnimSet(h) => {
                for v in [
                    h.palette_size,
                    h.rgb_keyframe_count,
                    h.rgb_track_count,
                    h.keyframe_count,
                    h.track_count,
                    h.animation_size,
                ] {
                    w.u16(v);
                }
                w.u32(h.hash);
            }
            Message::TransferTestAnimSetAck(ack) => w.u8(*ack as u8),
            Message::DebugLog { text } => w.bytes(text.as_bytes()),
            Message::PlayAnim {
                index,
                remap_face,
                loop_count,
            } => {
                w.u8(*index);
                w.u8(*remap_face);
                w.u8(*loop_count);
            }
            Message::StopAnim { index, remap_face } => {
                w.u8(*index);
                w.u8(*remap_face);
            }
            Message::RequestTelemetry { on } => w.u8(u8::from(*on)),
            Message::Flash { count, color } => {
                w.u8(*count);
                w.u32(*color);
            }
            Message::BatteryLevel { level } => w.f32(*level),
            Message::Rssi { rssi } => w.i16(*rssi),
            Message::SetAllLEDsToColor { color } => w.u32(*color),
        }
        w.finish()
    }

    /// Parse a packet. Trailing bytes past the known fields are ignored.
    pub fn decode(packet: &[u8]) -> PixelsResult<Self> {
        let mut r = ByteReader::new(packet);
        let tag = r
            .u8()
            .map_err(|_| PixelsError::decode("empty packet"))?;
        let kind = MessageType::from_u8(tag)
            .ok_or_else(|| PixelsError::decode(format!("unknown message type {tag}")))?;
        Ok(match kind {
            MessageType::WhoAreYou => Message::WhoAreYou,
            MessageType::IAmADie => Message::IAmADie(DieInfo {
                face_count: r.u8()?,
                design_and_color: r.u8()?,
                device_id: r.u32()?,
                data_set_hash: r.u32()?,
                available_flash: r.u16()?,
            }),
            MessageType::State => Message::State {
                roll_state: RollState::from_u8(r.u8()?),
                face: r.u8()?,
            },
            MessageType::Telemetry => {
                let mut frames = [AccelFrame::default(); 2];
                for f in &mut frames {
                    *f = AccelFrame {
                        x: r.i16()?,
                        y: r.i16()?,
                        z: r.i16()?,
                        delta_time_ms: r.i16()?,
                    };
                }
                Message::Telemetry { frames }
            }
            MessageType::BulkSetup => Message::BulkSetup { size: r.i16()? },
            MessageType::BulkSetupAck => Message::BulkSetupAck,
            MessageType::BulkData => {
                let offset = r.u16()?;
                let size = r.u8()?;
                Message::BulkData {
                    offset,
                    payload: r.take(usize::from(size))?.to_vec(),
                }
            }
            MessageType::BulkDataAck => Message::BulkDataAck { offset: r.u16()? },
            MessageType::TransferAnimSet => Message::TransferAnimSet(AnimSetHeader {
                palette_size: r.u16()?,
                rgb_keyframe_count: r.u16()?,
                rgb_track_count: r.u16()?,
                keyframe_count: r.u16()?,
                track_count: r.u16()?,
                animation_count: r.u16()?,
                animation_size: r.u16()?,
                condition_count: r.u16()?,
                condition_size: r.u16()?,
                action_count: r.u16()?,
                action_size: r.u16()?,
                rule_count: r.u16()?,
            }),
            MessageType::TransferAnimSetAck => Message::TransferAnimSetAck {
                accepted: r.u8()? != 0,
            },
            MessageType::TransferAnimSetFinished => Message::TransferAnimSetFinished,
            MessageType::TransferTestAnimSet => Message::TransferTestAnimSet(TestAnimSetHeader {
                palette_size: r.u16()?,
                rgb_keyframe_count: r.u16()?,
                rgb_track_count: r.u16()?,
                keyframe_count: r.u16()?,
                track_count: r.u16()?,
                animation_size: r.u16()?,
                hash: r.u32()?,
            }),
            MessageType::TransferTestAnimSetAck => {
                Message::TransferTestAnimSetAck(match r.u8()? {
                    0 => TestAnimAck::NoMemory,
                    1 => TestAnimAck::Download,
                    2 => TestAnimAck::UpToDate,
                    other => {
                        return Err(PixelsError::decode(format!(
                            "unknown test animation ack {other}"
                        )));
                    }
                })
            }
            MessageType::TransferTestAnimSetFinished => Message::TransferTestAnimSetFinished,
            MessageType::DebugLog => {
                let raw = r.rest();
                let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
                Message::DebugLog {
                    text: String::from_utf8_lossy(&raw[..end]).into_owned(),
                }
            }
            MessageType::PlayAnim => Message::PlayAnim {
                index: r.u8()?,
                remap_face: r.u8()?,
                loop_count: r.u8()?,
            },
            MessageType::StopAnim => Message::StopAnim {
                index: r.u8()?,
                remap_face: r.u8()?,
            },
            MessageType::RequestState => Message::RequestState,
            MessageType::RequestTelemetry => Message::RequestTelemetry { on: r.u8()? != 0 },
            MessageType::Flash => Message::Flash {
                count: r.u8()?,
                color: r.u32()?,
            },
            MessageType::FlashFinished => Message::FlashFinished,
            MessageType::RequestBatteryLevel => Message::RequestBatteryLevel,
            MessageType::BatteryLevel => Message::BatteryLevel { level: r.f32()? },
            MessageType::RequestRssi => Message::RequestRssi,
            MessageType::Rssi => Message::Rssi { rssi: r.i16()? },
            MessageType::SetAllLEDsToColor => Message::SetAllLEDsToColor { color: r.u32()? },
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/protocol/messages.rs"]
mod tests;
