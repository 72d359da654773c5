//! [`SocketCanTransport`] – blocking reads from a Linux SocketCAN interface.

use les02_types::Les02Error;
use socketcan::{CanSocket, EmbeddedFrame, Id, Socket};
use tracing::info;

use crate::source::{BusTransport, RawFrame};

/// A raw CAN socket bound to one interface (e.g. `"can0"`, `"vcan0"`).
pub struct SocketCanTransport {
    interface: String,
    socket: CanSocket,
}

impl SocketCanTransport {
    /// Open and bind a raw CAN socket on `interface`.
    ///
    /// # Errors
    ///
    /// Returns [`Les02Error::Transport`] if the interface does not exist or
    /// cannot be bound.
    pub fn open(interface: &str) -> Result<Self, Les02Error> {
        let socket = CanSocket::open(interface)
            .map_err(|e| Les02Error::Transport(format!("open {interface}: {e}")))?;
        info!(interface, "CAN socket opened");
        Ok(Self {
            interface: interface.to_string(),
            socket,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl BusTransport for SocketCanTransport {
    fn recv(&mut self) -> Result<Option<RawFrame>, Les02Error> {
        let frame = self
            .socket
            .read_frame()
            .map_err(|e| Les02Error::Transport(format!("read on {}: {e}", self.interface)))?;

        let identifier = match frame.id() {
            Id::Standard(id) => u32::from(id.as_raw()),
            Id::Extended(id) => id.as_raw(),
        };
        Ok(Some(RawFrame::new(identifier, frame.data())))
    }
}
