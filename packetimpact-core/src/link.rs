//! Link-layer collaborator traits
//!
//! A connection never touches raw sockets directly. It talks to an
//! [`Injector`] to transmit frames and a [`Sniffer`] to receive them, so the
//! same orchestration runs over pcap/pnet on a real interface or over an
//! in-memory peer in tests.

use crate::Result;
use std::time::Duration;

/// Transmits raw link-layer frames
pub trait Injector: Send {
    /// Send exactly `frame` as one link-layer frame
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Release the underlying socket
    fn close(&mut self) -> Result<()>;
}

/// Receives raw link-layer frames
pub trait Sniffer: Send {
    /// Block for at most `timeout` waiting for the next captured frame.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// Discard every frame that is already buffered
    fn drain(&mut self) -> Result<()>;

    /// Release the underlying socket
    fn close(&mut self) -> Result<()>;
}
