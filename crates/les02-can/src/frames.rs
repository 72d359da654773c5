//! Identifier classification and payload decoding.
//!
//! The LES02 protocol packs two facts into every frame identifier:
//!
//! | Bits | Meaning |
//! |---|---|
//! | bit 0 | Channel: `0` → [`Channel::Master`], `1` → [`Channel::Slave`] |
//! | `id & 0xFE` | Base identifier, looked up in the [`MessageKind`] table |
//!
//! Position frames carry a 24-bit big-endian value in their first three
//! data bytes.  All functions here are pure.

use les02_types::{Channel, DecodeError, DecodedFrame, MessageKind, epoch_seconds};

/// Mask that clears the channel bit and keeps the base identifier.
const BASE_ID_MASK: u32 = 0xFE;

/// Number of payload bytes a position value occupies.
const POSITION_BYTES: usize = 3;

/// Length a position frame must declare to be forwarded as an event.
pub const POSITION_FRAME_LEN: u8 = 4;

/// Even identifiers belong to the master, odd ones to the slave.
pub fn classify_channel(identifier: u32) -> Channel {
    if identifier & 1 == 0 {
        Channel::Master
    } else {
        Channel::Slave
    }
}

/// Map an identifier to its [`MessageKind`] by masking off the channel bit.
///
/// Never fails: anything outside the base-id table is
/// [`MessageKind::Unknown`].
pub fn classify_kind(identifier: u32) -> MessageKind {
    let base = identifier & BASE_ID_MASK;
    MessageKind::KNOWN
        .into_iter()
        .find(|kind| kind.base_id() == Some(base))
        .unwrap_or(MessageKind::Unknown)
}

/// Decode the 24-bit big-endian position from the first three payload bytes.
///
/// Bytes past index 2 are ignored; enforcing the 4-byte framing rule is the
/// caller's job.
///
/// # Errors
///
/// Returns [`DecodeError::ShortPayload`] when `payload` has fewer than three
/// bytes.
pub fn decode_position(payload: &[u8]) -> Result<u32, DecodeError> {
    match payload {
        [msb, mid, lsb, ..] => Ok(u32::from(*msb) << 16 | u32::from(*mid) << 8 | u32::from(*lsb)),
        _ => Err(DecodeError::ShortPayload {
            required: POSITION_BYTES,
            actual: payload.len(),
        }),
    }
}

/// Console rendering of a frame in the listener's dump format.
///
/// Forwardable position frames print as `[ts] MASTER POS=66051`; every
/// other frame prints raw as `[ts] SLAVE ID=0x31 DLC=2 DATA=0a0b`.
pub struct FrameDump<'a>(pub &'a DecodedFrame);

impl std::fmt::Display for FrameDump<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let frame = self.0;
        let ts = epoch_seconds(&frame.timestamp);

        if frame.kind == MessageKind::Position
            && frame.length == POSITION_FRAME_LEN
            && let Ok(position) = decode_position(&frame.payload)
        {
            return write!(f, "[{ts:.6}] {} POS={position}", frame.channel);
        }

        write!(
            f,
            "[{ts:.6}] {} ID=0x{:02X} DLC={} DATA=",
            frame.channel, frame.identifier, frame.length
        )?;
        for byte in &frame.payload {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
