//! Layer model for crafting and matching raw frames
//!
//! This crate describes link-layer frames as stacks of partially specified
//! protocol headers. Every header field is optional: an unset field is
//! computed from context when the frame is serialized and is ignored when a
//! captured frame is matched against an expectation.
//!
//! Supported layers:
//!
//! - **Ethernet II** headers with common EtherTypes
//! - **IPv4** headers with options and header checksum calculation
//! - **IPv6** fixed headers
//! - **TCP** headers with flags, options and pseudo-header checksum
//! - **UDP** headers with pseudo-header checksum
//! - **Payload** raw bytes
//!
//! # Architecture
//!
//! - [`layer`] - The closed [`Layer`] enum with merge, match and diff
//! - [`frame`] - [`Frame`] serialization, tolerant parsing and matching
//! - [`ethernet`], [`ip`], [`ipv6`], [`tcp`], [`udp`], [`payload`] - Per-protocol headers
//! - [`checksum`] - Internet checksum calculation utilities
//! - [`seqnum`] - Wraparound-safe TCP sequence numbers
//!
//! # Quick Start
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use packetimpact_packet::{Ether, Frame, Ipv4, Layer, MacAddress, Payload, Udp};
//!
//! let frame = Frame::new(vec![
//!     Layer::Ether(Ether {
//!         src_addr: Some(MacAddress::new([0x02, 0, 0, 0, 0, 1])),
//!         dst_addr: Some(MacAddress::new([0x02, 0, 0, 0, 0, 2])),
//!         ..Default::default()
//!     }),
//!     Layer::Ipv4(Ipv4 {
//!         src_addr: Some(Ipv4Addr::new(192, 168, 1, 1)),
//!         dst_addr: Some(Ipv4Addr::new(192, 168, 1, 2)),
//!         ..Default::default()
//!     }),
//!     Layer::Udp(Udp {
//!         src_port: Some(12345),
//!         dst_port: Some(53),
//!         ..Default::default()
//!     }),
//!     Layer::Payload(Payload::from("hello")),
//! ]);
//!
//! let bytes = frame.to_bytes().unwrap();
//! let parsed = Frame::parse(&bytes);
//! assert!(frame.matches(&parsed));
//! ```

#[macro_use]
mod macros;

pub mod checksum;
pub mod ethernet;
pub mod frame;
pub mod ip;
pub mod ipv6;
pub mod layer;
pub mod payload;
pub mod seqnum;
pub mod tcp;
pub mod udp;

// Re-export commonly used types for convenience
pub use checksum::{internet_checksum, transport_checksum};
pub use ethernet::{EtherType, Ether, MacAddress};
pub use frame::Frame;
pub use ip::{IpProtocol, Ipv4};
pub use ipv6::Ipv6;
pub use layer::{FieldDiff, Layer};
pub use payload::Payload;
pub use seqnum::SeqNum;
pub use tcp::{Tcp, TcpFlags};
pub use udp::Udp;
