//! Connections that drive a remote network stack through crafted frames
//!
//! A testbench connection plays one peer of a conversation with the device
//! under test. It builds every outgoing frame from per-layer defaults,
//! injects it on a raw socket, and waits for captured frames matching a
//! partially specified expectation while tolerating unrelated traffic.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use packetimpact_packet::{Tcp, TcpFlags};
//! use packetimpact_testbench::{Endpoints, TcpIpv4};
//!
//! # fn main() -> packetimpact_core::Result<()> {
//! let endpoints = Endpoints::from_env()?;
//! let mut conn = TcpIpv4::new(
//!     &endpoints,
//!     Tcp { dst_port: Some(8080), ..Default::default() },
//!     Tcp { src_port: Some(8080), ..Default::default() },
//! )?;
//! conn.handshake()?;
//! conn.send(Tcp::with_flags(TcpFlags::RST), Vec::new())?;
//! conn.close()?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod flags;
pub mod ipv6_conn;
pub mod port;
pub mod state;
pub mod tcp_ipv4;
pub mod udp_ipv4;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::Connection;
pub use flags::{Endpoints, Flags};
pub use ipv6_conn::Ipv6Conn;
pub use port::PortPicker;
pub use state::{EtherState, Ipv4State, Ipv6State, LayerState, TcpState, UdpState};
pub use tcp_ipv4::{TcpIpv4, HANDSHAKE_TIMEOUT};
pub use udp_ipv4::UdpIpv4;
