//! Ethernet II header layer
//!
//! This module provides the partially specified Ethernet II header used as the
//! outermost layer of every frame, plus the MAC address and EtherType types.

use crate::frame::Frame;
use crate::layer::Layer;
use bytes::{BufMut, BytesMut};
use packetimpact_core::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Common EtherType values used in Ethernet II frames
#[derive(Debug, Clone, Copy)]
pub enum EtherType {
    /// IPv4 (0x0800)
    IPv4,
    /// ARP (0x0806)
    ARP,
    /// VLAN-tagged frame (0x8100)
    VLAN,
    /// IPv6 (0x86DD)
    IPv6,
    /// Custom EtherType
    Custom(u16),
}

impl EtherType {
    /// Convert EtherType to u16 value
    pub fn to_u16(self) -> u16 {
        match self {
            EtherType::IPv4 => 0x0800,
            EtherType::ARP => 0x0806,
            EtherType::VLAN => 0x8100,
            EtherType::IPv6 => 0x86DD,
            EtherType::Custom(val) => val,
        }
    }

    /// Create EtherType from u16 value
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0800 => EtherType::IPv4,
            0x0806 => EtherType::ARP,
            0x8100 => EtherType::VLAN,
            0x86DD => EtherType::IPv6,
            val => EtherType::Custom(val),
        }
    }

    /// The EtherType announcing `layer` as the Ethernet payload
    fn for_layer(layer: &Layer) -> Option<Self> {
        match layer {
            Layer::Ipv4(_) => Some(EtherType::IPv4),
            Layer::Ipv6(_) => Some(EtherType::IPv6),
            _ => None,
        }
    }
}

// Compare on the wire value so Custom(0x0800) equals IPv4.
impl PartialEq for EtherType {
    fn eq(&self, other: &Self) -> bool {
        self.to_u16() == other.to_u16()
    }
}

impl Eq for EtherType {}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::IPv4 => write!(f, "IPv4"),
            EtherType::ARP => write!(f, "ARP"),
            EtherType::VLAN => write!(f, "VLAN"),
            EtherType::IPv6 => write!(f, "IPv6"),
            EtherType::Custom(val) => write!(f, "0x{:04X}", val),
        }
    }
}

/// MAC address (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Broadcast MAC address (FF:FF:FF:FF:FF:FF)
    pub const BROADCAST: MacAddress = MacAddress([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);

    /// Zero MAC address (00:00:00:00:00:00)
    pub const ZERO: MacAddress = MacAddress([0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    /// Create a new MAC address from a byte array
    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Create a MAC address from a slice
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 6] = slice.try_into().ok()?;
        Some(MacAddress(bytes))
    }

    /// Get the MAC address as a byte array
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Check if this is a multicast address (bit 0 of first octet is 1)
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    /// Parses `aa:bb:cc:dd:ee:ff` (or `-` separated) notation
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(Error::setup(format!("invalid MAC address '{}'", s)));
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(parts) {
            if part.len() != 2 {
                return Err(Error::setup(format!("invalid MAC address '{}'", s)));
            }
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| Error::setup(format!("invalid MAC address hex '{}'", s)))?;
        }

        Ok(MacAddress(bytes))
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}

/// Ethernet II header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ether {
    /// Source MAC address
    pub src_addr: Option<MacAddress>,
    /// Destination MAC address
    pub dst_addr: Option<MacAddress>,
    /// EtherType of the payload
    pub ether_type: Option<EtherType>,
}

layer_fields!(Ether {
    src_addr,
    dst_addr,
    ether_type,
});

impl Ether {
    /// Ethernet header size (dst + src + type)
    pub const HEADER_SIZE: usize = 14;

    /// Parse the header, returning it with the bytes it encapsulates
    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < Self::HEADER_SIZE {
            return None;
        }

        let ether = Ether {
            dst_addr: MacAddress::from_slice(&data[0..6]),
            src_addr: MacAddress::from_slice(&data[6..12]),
            ether_type: Some(EtherType::from_u16(u16::from_be_bytes([data[12], data[13]]))),
        };

        Some((ether, &data[Self::HEADER_SIZE..]))
    }

    pub(crate) fn header_bytes(&self, frame: &Frame, index: usize) -> Result<Vec<u8>> {
        let dst = self
            .dst_addr
            .ok_or_else(|| Error::construction("Ethernet destination address is not set"))?;
        let src = self
            .src_addr
            .ok_or_else(|| Error::construction("Ethernet source address is not set"))?;
        let ether_type = match self.ether_type {
            Some(ether_type) => ether_type,
            None => frame
                .get(index + 1)
                .and_then(EtherType::for_layer)
                .ok_or_else(|| {
                    Error::construction("EtherType is not set and can't be derived from the next layer")
                })?,
        };

        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE);
        buffer.put_slice(dst.as_bytes());
        buffer.put_slice(src.as_bytes());
        buffer.put_u16(ether_type.to_u16());
        Ok(buffer.to_vec())
    }
}
