//! `les02-middleware` – The Bridge
//!
//! Moves classified bus frames from the blocking reader thread to every
//! connected WebSocket subscriber without letting either side stall the
//! other.
//!
//! # Modules
//!
//! - [`queue`] – FIFO hand-off between the reader thread and the async
//!   runtime, with an end-of-stream marker.
//! - [`translator`] – Turns forwardable position frames into
//!   [`EventEnvelope`]s.
//! - [`bridge`] – The dedicated reader thread and the async drain loop.
//! - [`registry`] – The set of connected subscribers.
//! - [`server`] – The WebSocket [`BroadcastServer`].
//!
//! [`EventEnvelope`]: les02_types::EventEnvelope

pub mod bridge;
pub mod queue;
pub mod registry;
pub mod server;
#[cfg(test)]
mod testing;
pub mod translator;

pub use bridge::{BridgeReport, run_bridge, spawn_reader, start_bridge};
pub use queue::{BridgeItem, FrameConsumer, FrameProducer, StreamEnd, bridge_queue};
pub use registry::{SubscriberHandle, SubscriberRegistry, SubscriberSink};
pub use server::{BroadcastServer, ConnectionState, DEFAULT_HOST, DEFAULT_PORT};
pub use translator::{position_sample, translate};
