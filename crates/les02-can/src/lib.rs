//! `les02-can` – The Bus Side
//!
//! Everything between the raw field bus and a classified [`DecodedFrame`].
//!
//! # Modules
//!
//! - [`frames`] – Pure identifier classification and position decoding.
//! - [`source`] – The [`BusTransport`] seam and the [`FrameSource`] adapter
//!   that turns raw messages into timestamped, classified frames.
//! - [`sim`] – In-process buses for demos and tests without hardware.
//! - `socket` – Linux SocketCAN transport (cargo feature `socketcan`).
//!
//! [`DecodedFrame`]: les02_types::DecodedFrame

pub mod frames;
pub mod sim;
#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socket;
pub mod source;

pub use frames::{FrameDump, classify_channel, classify_kind, decode_position};
pub use sim::{ScriptedBus, SimulatedBus};
#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use socket::SocketCanTransport;
pub use source::{BusTransport, FrameSource, Frames, RawFrame};
