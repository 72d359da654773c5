use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire protocol version stamped on every outbound envelope.
pub const PROTOCOL_VERSION: u32 = 1;

/// Envelope `type` tag for decoded position measurements.
pub const POSITION_SAMPLE_TYPE: &str = "position_sample";

/// Envelope `source` tag identifying this system.
pub const SOURCE_ID: &str = "les02";

/// Largest value a 24-bit position field can carry.
pub const POSITION_MAX: u32 = 0x00FF_FFFF;

/// Logical sender of a frame, derived from the identifier's least
/// significant bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Master,
    Slave,
}

impl Channel {
    /// Lowercase wire form (`"master"` / `"slave"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Master => "master",
            Channel::Slave => "slave",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Master => write!(f, "MASTER"),
            Channel::Slave => write!(f, "SLAVE"),
        }
    }
}

/// Message category, derived from the identifier with bit 0 masked off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    System,
    Error,
    Status,
    Position,
    /// Catch-all for every base identifier outside the table.
    Unknown,
}

impl MessageKind {
    /// Every kind that owns a base identifier, in table order.
    pub const KNOWN: [MessageKind; 4] = [
        MessageKind::System,
        MessageKind::Error,
        MessageKind::Status,
        MessageKind::Position,
    ];

    /// The fixed base identifier for this kind; `None` for [`MessageKind::Unknown`].
    pub const fn base_id(&self) -> Option<u32> {
        match self {
            MessageKind::System => Some(0x10),
            MessageKind::Error => Some(0x20),
            MessageKind::Status => Some(0x30),
            MessageKind::Position => Some(0x80),
            MessageKind::Unknown => None,
        }
    }
}

/// A bus frame after classification.
///
/// Built by the frame source at the moment the raw message is observed and
/// consumed exactly once by the translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Wall-clock instant the frame was received.
    pub timestamp: DateTime<Utc>,
    pub identifier: u32,
    pub channel: Channel,
    pub kind: MessageKind,
    /// Declared data length (0..=8), equal to `payload.len()`.
    pub length: u8,
    pub payload: Vec<u8>,
}

/// A decoded position measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSample {
    pub timestamp: DateTime<Utc>,
    pub channel: Channel,
    /// Raw 24-bit position (0..=[`POSITION_MAX`]).
    pub position_raw: u32,
}

/// Body of a `position_sample` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionPayload {
    pub channel: Channel,
    pub position_raw: u32,
}

/// Versioned wrapper sent to every subscriber, one JSON text message each.
///
/// ```json
/// {"proto":1,"type":"position_sample","ts":1700000000.123456,
///  "source":"les02","payload":{"channel":"master","position_raw":66051}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub proto: u32,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Seconds since the Unix epoch, microsecond resolution.
    pub ts: f64,
    pub source: String,
    pub payload: PositionPayload,
}

impl EventEnvelope {
    /// Wrap a [`PositionSample`] in a `position_sample` envelope.
    pub fn position_sample(sample: &PositionSample) -> Self {
        Self {
            proto: PROTOCOL_VERSION,
            event_type: POSITION_SAMPLE_TYPE.to_string(),
            ts: epoch_seconds(&sample.timestamp),
            source: SOURCE_ID.to_string(),
            payload: PositionPayload {
                channel: sample.channel,
                position_raw: sample.position_raw,
            },
        }
    }
}

/// Convert a UTC instant to floating-point seconds since the Unix epoch.
pub fn epoch_seconds(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

/// Raised when a payload is too short to hold the requested field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("short payload: need at least {required} bytes, got {actual}")]
    ShortPayload { required: usize, actual: usize },
}

/// Error type shared by the bus reader, the bridge and the broadcast server.
#[derive(Error, Debug)]
pub enum Les02Error {
    #[error("Decode Error: {0}")]
    Decode(#[from] DecodeError),

    /// The bus collaborator failed; ends the frame sequence.
    #[error("Transport Error: {0}")]
    Transport(String),

    /// A send to one subscriber failed.
    #[error("Delivery Error: {0}")]
    Delivery(String),

    /// An inbound subscriber connection failed during handshake or while held open.
    #[error("Connection Error: {0}")]
    Connection(String),

    #[error("Bind Error on {addr}: {details}")]
    Bind { addr: String, details: String },

    #[error("Config Error: {0}")]
    Config(String),
}
