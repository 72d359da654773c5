//! Frame → envelope translation.
//!
//! Only position frames that declare exactly four data bytes are forwarded.
//! Every other frame, including position frames of any other length, is
//! dropped without an error.

use les02_can::decode_position;
use les02_can::frames::POSITION_FRAME_LEN;
use les02_types::{DecodedFrame, EventEnvelope, MessageKind, PositionSample};
use tracing::trace;

/// Extract a [`PositionSample`] from a forwardable position frame.
///
/// # Panics
///
/// Panics if a four-byte position frame fails to decode, which would mean
/// the frame's `length` and `payload` disagree.
pub fn position_sample(frame: &DecodedFrame) -> Option<PositionSample> {
    if frame.kind != MessageKind::Position {
        return None;
    }
    if frame.length != POSITION_FRAME_LEN {
        trace!(
            identifier = frame.identifier,
            length = frame.length,
            "position frame with unexpected length dropped"
        );
        return None;
    }

    let position_raw = match decode_position(&frame.payload) {
        Ok(value) => value,
        Err(e) => unreachable!("position frame with length {} failed to decode: {e}", frame.length),
    };

    Some(PositionSample {
        timestamp: frame.timestamp,
        channel: frame.channel,
        position_raw,
    })
}

/// Consume a frame and wrap it in a `position_sample` envelope when it is
/// forwardable.
pub fn translate(frame: DecodedFrame) -> Option<EventEnvelope> {
    position_sample(&frame).map(|sample| EventEnvelope::position_sample(&sample))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use les02_can::source::classify;
    use les02_can::RawFrame;
    use les02_types::Channel;

    fn frame(identifier: u32, payload: &[u8]) -> DecodedFrame {
        classify(
            RawFrame::new(identifier, payload),
            Utc.timestamp_micros(1_700_000_000_250_000).unwrap(),
        )
    }

    #[test]
    fn four_byte_position_frame_becomes_envelope() {
        let env = translate(frame(0x80, &[0x00, 0x00, 0x01, 0x00])).expect("envelope");
        assert_eq!(env.payload.position_raw, 1);
        assert_eq!(env.payload.channel, Channel::Master);
        assert_eq!(env.proto, 1);
        assert_eq!(env.event_type, "position_sample");
        assert_eq!(env.source, "les02");
        assert!((env.ts - 1_700_000_000.25).abs() < 1e-6);
    }

    #[test]
    fn slave_position_keeps_channel() {
        let env = translate(frame(0x81, &[0xFF, 0xFF, 0xFF, 0x7E])).expect("envelope");
        assert_eq!(env.payload.channel, Channel::Slave);
        assert_eq!(env.payload.position_raw, 16_777_215);
    }

    #[test]
    fn position_frame_with_other_length_is_dropped() {
        assert!(translate(frame(0x80, &[0x01, 0x02, 0x03])).is_none());
        assert!(translate(frame(0x80, &[0x01, 0x02, 0x03, 0x04, 0x05])).is_none());
        assert!(translate(frame(0x81, &[0x01])).is_none());
        assert!(translate(frame(0x80, &[])).is_none());
    }

    #[test]
    fn non_position_kinds_are_dropped() {
        let payload = [0x00, 0x00, 0x01, 0x00];
        for id in [0x10, 0x11, 0x20, 0x21, 0x30, 0x31, 0x00, 0x7F, 0x82, 0xFF] {
            assert!(translate(frame(id, &payload)).is_none(), "id {id:#x}");
        }
    }

    #[test]
    fn sample_carries_frame_timestamp() {
        let f = frame(0x80, &[0x01, 0x02, 0x03, 0x00]);
        let sample = position_sample(&f).expect("sample");
        assert_eq!(sample.timestamp, f.timestamp);
        assert_eq!(sample.position_raw, 66051);
    }

    #[test]
    #[should_panic(expected = "failed to decode")]
    fn inconsistent_length_is_an_invariant_violation() {
        let mut f = frame(0x80, &[0x01, 0x02]);
        f.length = 4;
        let _ = translate(f);
    }
}
