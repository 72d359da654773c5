//! [`FrameSource`] – adapts a blocking bus transport into a sequence of
//! classified [`DecodedFrame`] values.

use chrono::{DateTime, Utc};
use les02_types::{DecodedFrame, Les02Error};
use tracing::debug;

use crate::frames::{classify_channel, classify_kind};

/// One message as delivered by the bus, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub identifier: u32,
    /// 0..=8 data bytes.
    pub payload: Vec<u8>,
}

impl RawFrame {
    pub fn new(identifier: u32, payload: &[u8]) -> Self {
        Self {
            identifier,
            payload: payload.to_vec(),
        }
    }

    /// Declared data length, always equal to the payload size.
    pub fn len(&self) -> u8 {
        u8::try_from(self.payload.len()).unwrap_or(u8::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// A blocking source of raw bus messages.
///
/// Implementations own a single-use bus handle.  The reader thread is the
/// only caller, so `recv` may block for as long as the bus is quiet.
pub trait BusTransport: Send {
    /// Block until the next message arrives.
    ///
    /// Returns `Ok(None)` when the bus closed cleanly.
    ///
    /// # Errors
    ///
    /// Returns [`Les02Error::Transport`] when the underlying interface fails.
    fn recv(&mut self) -> Result<Option<RawFrame>, Les02Error>;
}

impl<T: BusTransport + ?Sized> BusTransport for Box<T> {
    fn recv(&mut self) -> Result<Option<RawFrame>, Les02Error> {
        (**self).recv()
    }
}

/// Wraps one transport handle and yields classified frames from it.
pub struct FrameSource<T> {
    transport: T,
}

impl<T: BusTransport> FrameSource<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Consume the source and return its frame sequence.
    ///
    /// The sequence is infinite while the bus is alive.  It ends after a
    /// clean close, or after yielding a single transport error; it is never
    /// restarted.  Reading again requires a new `FrameSource` over a fresh
    /// transport.
    pub fn produce_frames(self) -> Frames<T> {
        Frames {
            transport: Some(self.transport),
        }
    }
}

/// Classify a raw message received at `timestamp`.
pub fn classify(raw: RawFrame, timestamp: DateTime<Utc>) -> DecodedFrame {
    DecodedFrame {
        timestamp,
        identifier: raw.identifier,
        channel: classify_channel(raw.identifier),
        kind: classify_kind(raw.identifier),
        length: raw.len(),
        payload: raw.payload,
    }
}

/// Iterator returned by [`FrameSource::produce_frames`].
pub struct Frames<T> {
    transport: Option<T>,
}

impl<T: BusTransport> Iterator for Frames<T> {
    type Item = Result<DecodedFrame, Les02Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let transport = self.transport.as_mut()?;
        match transport.recv() {
            Ok(Some(raw)) => Some(Ok(classify(raw, Utc::now()))),
            Ok(None) => {
                debug!("bus transport closed");
                self.transport = None;
                None
            }
            Err(e) => {
                self.transport = None;
                Some(Err(e))
            }
        }
    }
}

impl<T: BusTransport> std::iter::FusedIterator for Frames<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedBus;
    use les02_types::{Channel, MessageKind};

    #[test]
    fn classifies_every_raw_message() {
        let bus = ScriptedBus::new(vec![
            RawFrame::new(0x80, &[0x00, 0x00, 0x01, 0x00]),
            RawFrame::new(0x31, &[0xAA]),
            RawFrame::new(0x7F, &[]),
        ]);

        let frames: Vec<DecodedFrame> = FrameSource::new(bus)
            .produce_frames()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].channel, Channel::Master);
        assert_eq!(frames[0].kind, MessageKind::Position);
        assert_eq!(frames[0].length, 4);
        assert_eq!(frames[1].channel, Channel::Slave);
        assert_eq!(frames[1].kind, MessageKind::Status);
        assert_eq!(frames[1].payload, vec![0xAA]);
        assert_eq!(frames[2].kind, MessageKind::Unknown);
        assert_eq!(frames[2].length, 0);
    }

    #[test]
    fn timestamps_are_monotonic_in_read_order() {
        let bus = ScriptedBus::new((0..16).map(|i| RawFrame::new(0x80 + (i % 2), &[0, 0, i as u8, 0])).collect());
        let frames: Vec<_> = FrameSource::new(bus).produce_frames().map(Result::unwrap).collect();
        assert!(frames.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn transport_error_ends_sequence() {
        let bus = ScriptedBus::new(vec![RawFrame::new(0x80, &[1, 2, 3, 4])]).then_fail("interface down");
        let mut frames = FrameSource::new(bus).produce_frames();

        assert!(matches!(frames.next(), Some(Ok(_))));
        match frames.next() {
            Some(Err(Les02Error::Transport(msg))) => assert_eq!(msg, "interface down"),
            other => panic!("expected transport error, got {other:?}"),
        }
        assert!(frames.next().is_none());
        assert!(frames.next().is_none());
    }

    #[test]
    fn clean_close_ends_sequence() {
        let mut frames = FrameSource::new(ScriptedBus::new(Vec::new())).produce_frames();
        assert!(frames.next().is_none());
        assert!(frames.next().is_none());
    }
}
