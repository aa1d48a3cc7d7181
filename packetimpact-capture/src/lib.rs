//! Link-layer collaborators for packetimpact
//!
//! This crate provides the concrete raw-socket implementations of the
//! [`Injector`](packetimpact_core::Injector) and
//! [`Sniffer`](packetimpact_core::Sniffer) traits, plus discovery of the
//! addresses configured on the test host.
//!
//! ## Features
//!
//! - **Injection**: frames are sent unmodified through a pnet datalink channel
//! - **Sniffing**: inbound-only libpcap capture with deadline-bounded receive
//! - **BPF Filters**: expressions narrowing a sniffer to a single peer
//! - **Devices**: interface lookup and `ip addr show` parsing
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use packetimpact_capture::{PcapSniffer, SnifferConfig};
//! use packetimpact_core::Sniffer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut sniffer = PcapSniffer::with_config("eth0", SnifferConfig::default())?;
//! if let Some(frame) = sniffer.recv(Duration::from_secs(1))? {
//!     println!("Got frame: {} bytes", frame.len());
//! }
//! sniffer.close()?;
//! # Ok(())
//! # }
//! ```

pub mod filters;
pub mod injector;
pub mod interface;
pub mod netdevs;
pub mod sniffer;

// Re-export main types
pub use injector::DatalinkInjector;
pub use interface::{get_interface, list_interfaces, InterfaceInfo};
pub use netdevs::{find_device_by_ip, list_devices, mac_to_ip, parse_devices, DeviceInfo};
pub use sniffer::{PcapSniffer, SnifferConfig};
