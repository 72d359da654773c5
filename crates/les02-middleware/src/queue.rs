//! Hand-off queue between the blocking bus reader and the async runtime.
//!
//! The producer side lives on a plain OS thread and never blocks: the queue
//! is unbounded, so a slow consumer cannot stall frame ingestion.  The
//! consumer side drains without parking the runtime; when the queue is empty
//! it sleeps for a short idle back-off (default 1 ms) and tries again.
//!
//! Items come out in exactly the order they went in.

use std::time::Duration;

use les02_types::DecodedFrame;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

/// Default sleep between polls of an empty queue.
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Why the frame stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The bus closed cleanly.
    Closed,
    /// The bus transport failed with the given reason.
    TransportFailed(String),
    /// The producer went away without sending an end marker (reader thread
    /// panicked or was dropped).
    ProducerLost,
}

/// One slot in the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeItem {
    Frame(DecodedFrame),
    /// End-of-stream marker; nothing follows it.
    End(StreamEnd),
}

/// Create a connected producer/consumer pair.
pub fn bridge_queue() -> (FrameProducer, FrameConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        FrameProducer { tx },
        FrameConsumer {
            rx,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            finished: false,
        },
    )
}

/// Sending half, owned by the reader thread.
#[derive(Debug)]
pub struct FrameProducer {
    tx: UnboundedSender<BridgeItem>,
}

impl FrameProducer {
    /// Enqueue a frame.  Never blocks.
    ///
    /// Returns `false` when the consumer has been dropped.
    pub fn push(&self, frame: DecodedFrame) -> bool {
        self.tx.send(BridgeItem::Frame(frame)).is_ok()
    }

    /// Enqueue the end-of-stream marker and close the producer.
    pub fn finish(self, end: StreamEnd) {
        let _ = self.tx.send(BridgeItem::End(end));
    }
}

/// Receiving half, polled from an async task.
#[derive(Debug)]
pub struct FrameConsumer {
    rx: UnboundedReceiver<BridgeItem>,
    idle_backoff: Duration,
    finished: bool,
}

impl FrameConsumer {
    /// Override the idle back-off (builder-style).
    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }

    pub fn idle_backoff(&self) -> Duration {
        self.idle_backoff
    }

    /// Take the next item if one is ready, without waiting.
    ///
    /// A producer that disappears without its marker is reported once as
    /// [`StreamEnd::ProducerLost`]; after any end marker this returns `None`.
    pub fn try_next(&mut self) -> Option<BridgeItem> {
        if self.finished {
            return None;
        }
        let item = match self.rx.try_recv() {
            Ok(item) => item,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => BridgeItem::End(StreamEnd::ProducerLost),
        };
        if matches!(item, BridgeItem::End(_)) {
            self.finished = true;
            self.rx.close();
        }
        Some(item)
    }

    /// Wait for the next item, sleeping `idle_backoff` between empty polls.
    ///
    /// Returns `None` only after the end marker has already been handed out.
    pub async fn next(&mut self) -> Option<BridgeItem> {
        loop {
            if self.finished {
                return None;
            }
            if let Some(item) = self.try_next() {
                return Some(item);
            }
            tokio::time::sleep(self.idle_backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use les02_types::{Channel, MessageKind};

    fn frame(identifier: u32) -> DecodedFrame {
        DecodedFrame {
            timestamp: Utc::now(),
            identifier,
            channel: Channel::Master,
            kind: MessageKind::Unknown,
            length: 0,
            payload: Vec::new(),
        }
    }

    #[tokio::test]
    async fn items_come_out_in_order() {
        let (producer, mut consumer) = bridge_queue();
        for id in 0..100 {
            assert!(producer.push(frame(id)));
        }
        producer.finish(StreamEnd::Closed);

        for id in 0..100 {
            match consumer.next().await {
                Some(BridgeItem::Frame(f)) => assert_eq!(f.identifier, id),
                other => panic!("expected frame {id}, got {other:?}"),
            }
        }
        assert_eq!(consumer.next().await, Some(BridgeItem::End(StreamEnd::Closed)));
        assert_eq!(consumer.next().await, None);
    }

    #[test]
    fn try_next_is_non_blocking_on_empty_queue() {
        let (_producer, mut consumer) = bridge_queue();
        assert!(consumer.try_next().is_none());
    }

    #[test]
    fn dropped_producer_reports_producer_lost_once() {
        let (producer, mut consumer) = bridge_queue();
        drop(producer);
        assert_eq!(consumer.try_next(), Some(BridgeItem::End(StreamEnd::ProducerLost)));
        assert_eq!(consumer.try_next(), None);
    }

    #[test]
    fn push_fails_after_consumer_dropped() {
        let (producer, consumer) = bridge_queue();
        drop(consumer);
        assert!(!producer.push(frame(1)));
    }

    #[tokio::test]
    async fn consumer_waits_for_frames_from_another_thread() {
        let (producer, consumer) = bridge_queue();
        let mut consumer = consumer.with_idle_backoff(Duration::from_millis(1));

        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.push(frame(0x80));
            producer.finish(StreamEnd::TransportFailed("gone".to_string()));
        });

        assert!(matches!(consumer.next().await, Some(BridgeItem::Frame(_))));
        assert_eq!(
            consumer.next().await,
            Some(BridgeItem::End(StreamEnd::TransportFailed("gone".to_string())))
        );
        writer.join().unwrap();
    }
}
