//! IPv4 header layer
//!
//! This module provides the partially specified IPv4 header, including header
//! checksum calculation and the IP protocol numbers shared with IPv6.

use crate::checksum::internet_checksum;
use crate::frame::Frame;
use crate::layer::Layer;
use bytes::{BufMut, BytesMut};
use packetimpact_core::{Error, Result};
use std::fmt;
use std::net::Ipv4Addr;

/// IP Protocol numbers
#[derive(Debug, Clone, Copy)]
pub enum IpProtocol {
    /// ICMP (1)
    ICMP,
    /// TCP (6)
    TCP,
    /// UDP (17)
    UDP,
    /// ICMPv6 (58)
    ICMPv6,
    /// IPv6 no next header (59)
    NoNextHeader,
    /// Custom protocol number
    Custom(u8),
}

impl IpProtocol {
    pub fn to_u8(self) -> u8 {
        match self {
            IpProtocol::ICMP => 1,
            IpProtocol::TCP => 6,
            IpProtocol::UDP => 17,
            IpProtocol::ICMPv6 => 58,
            IpProtocol::NoNextHeader => 59,
            IpProtocol::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => IpProtocol::ICMP,
            6 => IpProtocol::TCP,
            17 => IpProtocol::UDP,
            58 => IpProtocol::ICMPv6,
            59 => IpProtocol::NoNextHeader,
            val => IpProtocol::Custom(val),
        }
    }

    /// The protocol number announcing `layer` as the IP payload
    pub(crate) fn for_layer(layer: &Layer) -> Option<Self> {
        match layer {
            Layer::Tcp(_) => Some(IpProtocol::TCP),
            Layer::Udp(_) => Some(IpProtocol::UDP),
            _ => None,
        }
    }
}

impl PartialEq for IpProtocol {
    fn eq(&self, other: &Self) -> bool {
        self.to_u8() == other.to_u8()
    }
}

impl Eq for IpProtocol {}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpProtocol::ICMP => write!(f, "ICMP"),
            IpProtocol::TCP => write!(f, "TCP"),
            IpProtocol::UDP => write!(f, "UDP"),
            IpProtocol::ICMPv6 => write!(f, "ICMPv6"),
            IpProtocol::NoNextHeader => write!(f, "NoNextHeader"),
            IpProtocol::Custom(val) => write!(f, "{}", val),
        }
    }
}

/// Reserved flag bit
pub const IPV4_FLAG_RESERVED: u8 = 0b100;
/// Don't Fragment flag bit
pub const IPV4_FLAG_DONT_FRAGMENT: u8 = 0b010;
/// More Fragments flag bit
pub const IPV4_FLAG_MORE_FRAGMENTS: u8 = 0b001;

/// IPv4 header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ipv4 {
    /// Internet Header Length in 32-bit words
    pub ihl: Option<u8>,
    /// Type of Service / DSCP
    pub tos: Option<u8>,
    /// Total length (header + data) in bytes
    pub total_length: Option<u16>,
    /// Identification
    pub id: Option<u16>,
    /// Flags (3 bits)
    pub flags: Option<u8>,
    /// Fragment offset (in 8-byte blocks, 13 bits)
    pub fragment_offset: Option<u16>,
    /// Time to Live
    pub ttl: Option<u8>,
    /// Protocol of the payload
    pub protocol: Option<IpProtocol>,
    /// Header checksum
    pub checksum: Option<u16>,
    /// Source IP address
    pub src_addr: Option<Ipv4Addr>,
    /// Destination IP address
    pub dst_addr: Option<Ipv4Addr>,
    /// Options, padded to a 4-byte boundary when serialized
    pub options: Option<Vec<u8>>,
}

layer_fields!(Ipv4 {
    ihl,
    tos,
    total_length,
    id,
    flags,
    fragment_offset,
    ttl,
    protocol,
    checksum,
    src_addr,
    dst_addr,
    options,
});

impl Ipv4 {
    /// Minimum IPv4 header size (without options)
    pub const MIN_HEADER_SIZE: usize = 20;

    /// TTL used when none is set
    pub const DEFAULT_TTL: u8 = 64;

    /// Header length in bytes as it goes on the wire
    pub fn header_len(&self) -> usize {
        match self.ihl {
            Some(ihl) => ihl as usize * 4,
            None => Self::MIN_HEADER_SIZE + padded_options(self.options.as_deref()).len(),
        }
    }

    /// Whether this header describes a fragment other than the first
    pub fn is_trailing_fragment(&self) -> bool {
        self.fragment_offset.unwrap_or(0) != 0
    }

    /// Parse the header, returning it with the bytes it encapsulates.
    ///
    /// The encapsulated bytes are bounded by the total length field so that
    /// link-layer padding is not mistaken for payload.
    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < Self::MIN_HEADER_SIZE {
            return None;
        }

        let version = data[0] >> 4;
        let ihl = data[0] & 0x0F;
        if version != 4 {
            return None;
        }

        let header_len = ihl as usize * 4;
        if header_len < Self::MIN_HEADER_SIZE || data.len() < header_len {
            return None;
        }

        let total_length = u16::from_be_bytes([data[2], data[3]]);
        let flags_and_offset = u16::from_be_bytes([data[6], data[7]]);

        let ipv4 = Ipv4 {
            ihl: Some(ihl),
            tos: Some(data[1]),
            total_length: Some(total_length),
            id: Some(u16::from_be_bytes([data[4], data[5]])),
            flags: Some((flags_and_offset >> 13) as u8),
            fragment_offset: Some(flags_and_offset & 0x1FFF),
            ttl: Some(data[8]),
            protocol: Some(IpProtocol::from_u8(data[9])),
            checksum: Some(u16::from_be_bytes([data[10], data[11]])),
            src_addr: Some(Ipv4Addr::new(data[12], data[13], data[14], data[15])),
            dst_addr: Some(Ipv4Addr::new(data[16], data[17], data[18], data[19])),
            options: Some(data[Self::MIN_HEADER_SIZE..header_len].to_vec()),
        };

        let end = (total_length as usize).clamp(header_len, data.len());
        Some((ipv4, &data[header_len..end]))
    }

    pub(crate) fn header_bytes(&self, frame: &Frame, index: usize, payload: &[u8]) -> Result<Vec<u8>> {
        let options = padded_options(self.options.as_deref());
        let header_size = Self::MIN_HEADER_SIZE + options.len();

        let ihl = match self.ihl {
            Some(ihl) => ihl,
            None => (header_size / 4) as u8,
        };
        let total_length = match self.total_length {
            Some(total_length) => total_length,
            None => u16::try_from(header_size + payload.len())
                .map_err(|_| Error::construction("IPv4 packet exceeds 65535 bytes"))?,
        };
        let protocol = match self.protocol {
            Some(protocol) => protocol,
            None => frame
                .get(index + 1)
                .and_then(IpProtocol::for_layer)
                .ok_or_else(|| {
                    Error::construction("IPv4 protocol is not set and can't be derived from the next layer")
                })?,
        };
        let src = self
            .src_addr
            .ok_or_else(|| Error::construction("IPv4 source address is not set"))?;
        let dst = self
            .dst_addr
            .ok_or_else(|| Error::construction("IPv4 destination address is not set"))?;

        let mut buffer = BytesMut::with_capacity(header_size);

        // Version (4 bits) + IHL (4 bits)
        buffer.put_u8((4 << 4) | (ihl & 0x0F));
        buffer.put_u8(self.tos.unwrap_or(0));
        buffer.put_u16(total_length);
        buffer.put_u16(self.id.unwrap_or(0));

        // Flags (3 bits) + Fragment Offset (13 bits)
        let flags = (self.flags.unwrap_or(0) & 0b111) as u16;
        buffer.put_u16((flags << 13) | (self.fragment_offset.unwrap_or(0) & 0x1FFF));

        buffer.put_u8(self.ttl.unwrap_or(Self::DEFAULT_TTL));
        buffer.put_u8(protocol.to_u8());
        buffer.put_u16(self.checksum.unwrap_or(0));
        buffer.put_slice(&src.octets());
        buffer.put_slice(&dst.octets());
        buffer.put_slice(&options);

        let mut header = buffer.to_vec();
        if self.checksum.is_none() {
            let checksum = internet_checksum(&header);
            header[10..12].copy_from_slice(&checksum.to_be_bytes());
        }
        Ok(header)
    }
}

/// Options padded with zeros to a 4-byte boundary
pub(crate) fn padded_options(options: Option<&[u8]>) -> Vec<u8> {
    let mut padded = options.unwrap_or_default().to_vec();
    let padded_len = (padded.len() + 3) & !3;
    padded.resize(padded_len, 0);
    padded
}
