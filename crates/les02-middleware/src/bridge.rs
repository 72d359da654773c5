//! The bridge between the blocking bus and the async broadcast side.
//!
//! ```text
//! bus ─► FrameSource ─► [reader thread] ─► queue ─► run_bridge ─► translate ─► broadcast
//! ```
//!
//! The reader thread is the only place that blocks.  It owns the transport
//! and does nothing but push frames.  When the frame sequence ends it pushes
//! an end-of-stream marker.  The drain loop stops on that marker; the
//! broadcast server keeps serving its subscribers, who simply get no further
//! events.

use std::thread::JoinHandle;
use std::time::Duration;

use les02_can::{BusTransport, FrameSource};
use les02_types::Les02Error;
use tracing::{debug, error, info, warn};

use crate::queue::{BridgeItem, FrameConsumer, FrameProducer, StreamEnd, bridge_queue};
use crate::server::BroadcastServer;
use crate::translator::translate;

/// Counters and end reason of a finished bridge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeReport {
    /// Frames drained from the queue.
    pub frames: u64,
    /// Envelopes handed to the broadcast server.
    pub events: u64,
    pub end: StreamEnd,
}

/// Run `source` to completion on a dedicated OS thread, pushing every frame
/// into `producer`.
///
/// # Errors
///
/// Returns [`Les02Error::Transport`] if the thread cannot be spawned.
pub fn spawn_reader<T>(source: FrameSource<T>, producer: FrameProducer) -> Result<JoinHandle<()>, Les02Error>
where
    T: BusTransport + 'static,
{
    std::thread::Builder::new()
        .name("les02-bus-reader".to_string())
        .spawn(move || read_into(source, producer))
        .map_err(|e| Les02Error::Transport(format!("failed to spawn reader thread: {e}")))
}

fn read_into<T: BusTransport>(source: FrameSource<T>, producer: FrameProducer) {
    for item in source.produce_frames() {
        match item {
            Ok(frame) => {
                if !producer.push(frame) {
                    debug!("bridge consumer dropped; reader stopping");
                    return;
                }
            }
            Err(e) => {
                error!(error = %e, "bus transport failed; no further events will be broadcast");
                producer.finish(StreamEnd::TransportFailed(e.to_string()));
                return;
            }
        }
    }
    producer.finish(StreamEnd::Closed);
}

/// Drain `consumer`, translating frames and broadcasting the resulting
/// envelopes in queue order, until the end-of-stream marker arrives.
///
/// Each broadcast completes before the next frame is taken, so envelopes
/// leave in the order their frames were read.
pub async fn run_bridge(mut consumer: FrameConsumer, server: &BroadcastServer) -> BridgeReport {
    let mut frames = 0u64;
    let mut events = 0u64;

    while let Some(item) = consumer.next().await {
        match item {
            BridgeItem::Frame(frame) => {
                frames += 1;
                if let Some(envelope) = translate(frame) {
                    server.broadcast(&envelope).await;
                    events += 1;
                }
            }
            BridgeItem::End(end) => {
                match &end {
                    StreamEnd::Closed => info!(frames, events, "bus closed; bridge stopped"),
                    StreamEnd::TransportFailed(reason) => {
                        error!(frames, events, reason = %reason, "bridge stopped after transport failure")
                    }
                    StreamEnd::ProducerLost => warn!(frames, events, "bus reader vanished; bridge stopped"),
                }
                return BridgeReport { frames, events, end };
            }
        }
    }

    BridgeReport {
        frames,
        events,
        end: StreamEnd::ProducerLost,
    }
}

/// Wire `source` to `server`: spawn the reader thread and the drain task.
///
/// Must be called from inside a Tokio runtime.  The returned task resolves
/// when the frame sequence ends.
///
/// # Errors
///
/// Returns [`Les02Error::Transport`] if the reader thread cannot be spawned.
pub fn start_bridge<T>(
    source: FrameSource<T>,
    server: BroadcastServer,
    idle_backoff: Duration,
) -> Result<tokio::task::JoinHandle<BridgeReport>, Les02Error>
where
    T: BusTransport + 'static,
{
    let (producer, consumer) = bridge_queue();
    let consumer = consumer.with_idle_backoff(idle_backoff);
    spawn_reader(source, producer)?;
    Ok(tokio::spawn(async move { run_bridge(consumer, &server).await }))
}
