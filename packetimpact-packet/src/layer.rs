//! The closed set of protocol layers a frame is built from

use crate::ethernet::{EtherType, Ether, MacAddress};
use crate::frame::Frame;
use crate::ip::{IpProtocol, Ipv4};
use crate::ipv6::Ipv6;
use crate::payload::Payload;
use crate::tcp::{Tcp, TcpFlags};
use crate::udp::Udp;
use packetimpact_core::{Error, Result};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Rendering of a single field value in diagnostics
pub trait FieldValue {
    fn render(&self) -> String;
}

macro_rules! display_field_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn render(&self) -> String {
                    self.to_string()
                }
            }
        )+
    };
}

display_field_value!(u8, u16, u32, Ipv4Addr, Ipv6Addr, MacAddress, EtherType, IpProtocol, TcpFlags);

impl FieldValue for Vec<u8> {
    fn render(&self) -> String {
        let hex: Vec<String> = self.iter().map(|byte| format!("{:02x}", byte)).collect();
        format!("[{}]", hex.join(" "))
    }
}

/// One field whose captured value differs from the expected one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    pub field: &'static str,
    /// Captured value, `None` when the field was absent
    pub got: Option<String>,
    pub want: String,
}

impl fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.got {
            Some(got) => write!(f, "{}: got {}, want {}", self.field, got, self.want),
            None => write!(f, "{}: got unset, want {}", self.field, self.want),
        }
    }
}

/// A protocol layer whose fields are each either set or "don't care"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layer {
    Ether(Ether),
    Ipv4(Ipv4),
    Ipv6(Ipv6),
    Tcp(Tcp),
    Udp(Udp),
    Payload(Payload),
}

impl Layer {
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Ether(_) => "Ether",
            Layer::Ipv4(_) => "IPv4",
            Layer::Ipv6(_) => "IPv6",
            Layer::Tcp(_) => "TCP",
            Layer::Udp(_) => "UDP",
            Layer::Payload(_) => "Payload",
        }
    }

    /// Overwrite every field of `self` that is set in `other`.
    ///
    /// Fails only when the two layers are different protocols.
    pub fn merge(&mut self, other: &Layer) -> Result<()> {
        match (self, other) {
            (Layer::Ether(base), Layer::Ether(other)) => base.merge(other),
            (Layer::Ipv4(base), Layer::Ipv4(other)) => base.merge(other),
            (Layer::Ipv6(base), Layer::Ipv6(other)) => base.merge(other),
            (Layer::Tcp(base), Layer::Tcp(other)) => base.merge(other),
            (Layer::Udp(base), Layer::Udp(other)) => base.merge(other),
            (Layer::Payload(base), Layer::Payload(other)) => base.merge(other),
            (base, other) => return Err(Error::layer_mismatch(base.to_string(), other.to_string())),
        }
        Ok(())
    }

    /// Whether every field set in `self` holds the same value in `actual`.
    /// Layers of different protocols never match.
    pub fn matches(&self, actual: &Layer) -> bool {
        match (self, actual) {
            (Layer::Ether(want), Layer::Ether(got)) => want.matches(got),
            (Layer::Ipv4(want), Layer::Ipv4(got)) => want.matches(got),
            (Layer::Ipv6(want), Layer::Ipv6(got)) => want.matches(got),
            (Layer::Tcp(want), Layer::Tcp(got)) => want.matches(got),
            (Layer::Udp(want), Layer::Udp(got)) => want.matches(got),
            (Layer::Payload(want), Layer::Payload(got)) => want.matches(got),
            _ => false,
        }
    }

    /// Fields set in `want` that differ in `self`, or `None` when the layers
    /// are different protocols.
    pub fn diff(&self, want: &Layer) -> Option<Vec<FieldDiff>> {
        let diffs = match (self, want) {
            (Layer::Ether(got), Layer::Ether(want)) => got.diff_fields(want),
            (Layer::Ipv4(got), Layer::Ipv4(want)) => got.diff_fields(want),
            (Layer::Ipv6(got), Layer::Ipv6(want)) => got.diff_fields(want),
            (Layer::Tcp(got), Layer::Tcp(want)) => got.diff_fields(want),
            (Layer::Udp(got), Layer::Udp(want)) => got.diff_fields(want),
            (Layer::Payload(got), Layer::Payload(want)) => got.diff_fields(want),
            _ => return None,
        };
        Some(diffs)
    }

    /// A layer of the same protocol with every field unset
    pub fn wildcard(&self) -> Layer {
        match self {
            Layer::Ether(_) => Layer::Ether(Ether::default()),
            Layer::Ipv4(_) => Layer::Ipv4(Ipv4::default()),
            Layer::Ipv6(_) => Layer::Ipv6(Ipv6::default()),
            Layer::Tcp(_) => Layer::Tcp(Tcp::default()),
            Layer::Udp(_) => Layer::Udp(Udp::default()),
            Layer::Payload(_) => Layer::Payload(Payload::default()),
        }
    }

    /// Length in bytes of this layer's own header (or data, for a payload)
    pub fn length(&self) -> usize {
        match self {
            Layer::Ether(_) => Ether::HEADER_SIZE,
            Layer::Ipv4(ipv4) => ipv4.header_len(),
            Layer::Ipv6(_) => Ipv6::HEADER_SIZE,
            Layer::Tcp(tcp) => tcp.header_len(),
            Layer::Udp(_) => Udp::HEADER_SIZE,
            Layer::Payload(payload) => payload.len(),
        }
    }

    pub fn as_tcp(&self) -> Option<&Tcp> {
        match self {
            Layer::Tcp(tcp) => Some(tcp),
            _ => None,
        }
    }

    pub fn as_udp(&self) -> Option<&Udp> {
        match self {
            Layer::Udp(udp) => Some(udp),
            _ => None,
        }
    }

    pub fn as_payload(&self) -> Option<&Payload> {
        match self {
            Layer::Payload(payload) => Some(payload),
            _ => None,
        }
    }

    /// Serialize this layer's header given the already serialized bytes of
    /// every layer nested inside it.
    pub(crate) fn header_bytes(&self, frame: &Frame, index: usize, payload: &[u8]) -> Result<Vec<u8>> {
        match self {
            Layer::Ether(ether) => ether.header_bytes(frame, index),
            Layer::Ipv4(ipv4) => ipv4.header_bytes(frame, index, payload),
            Layer::Ipv6(ipv6) => ipv6.header_bytes(frame, index, payload),
            Layer::Tcp(tcp) => tcp.header_bytes(frame, index, payload),
            Layer::Udp(udp) => udp.header_bytes(frame, index, payload),
            Layer::Payload(data) => Ok(data.header_bytes()),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.name())?;
        match self {
            Layer::Ether(layer) => layer.write_fields(f)?,
            Layer::Ipv4(layer) => layer.write_fields(f)?,
            Layer::Ipv6(layer) => layer.write_fields(f)?,
            Layer::Tcp(layer) => layer.write_fields(f)?,
            Layer::Udp(layer) => layer.write_fields(f)?,
            Layer::Payload(layer) => layer.write_fields(f)?,
        }
        write!(f, "}}")
    }
}

impl From<Ether> for Layer {
    fn from(layer: Ether) -> Self {
        Layer::Ether(layer)
    }
}

impl From<Ipv4> for Layer {
    fn from(layer: Ipv4) -> Self {
        Layer::Ipv4(layer)
    }
}

impl From<Ipv6> for Layer {
    fn from(layer: Ipv6) -> Self {
        Layer::Ipv6(layer)
    }
}

impl From<Tcp> for Layer {
    fn from(layer: Tcp) -> Self {
        Layer::Tcp(layer)
    }
}

impl From<Udp> for Layer {
    fn from(layer: Udp) -> Self {
        Layer::Udp(layer)
    }
}

impl From<Payload> for Layer {
    fn from(layer: Payload) -> Self {
        Layer::Payload(layer)
    }
}
