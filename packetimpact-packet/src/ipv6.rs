//! IPv6 header layer

use crate::frame::Frame;
use crate::ip::IpProtocol;
use bytes::{BufMut, BytesMut};
use packetimpact_core::{Error, Result};
use std::net::Ipv6Addr;

/// IPv6 fixed header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ipv6 {
    /// Traffic class
    pub traffic_class: Option<u8>,
    /// Flow label (20 bits)
    pub flow_label: Option<u32>,
    /// Length of everything after the fixed header
    pub payload_length: Option<u16>,
    /// Protocol of the payload
    pub next_header: Option<IpProtocol>,
    /// Hop limit
    pub hop_limit: Option<u8>,
    /// Source IP address
    pub src_addr: Option<Ipv6Addr>,
    /// Destination IP address
    pub dst_addr: Option<Ipv6Addr>,
}

layer_fields!(Ipv6 {
    traffic_class,
    flow_label,
    payload_length,
    next_header,
    hop_limit,
    src_addr,
    dst_addr,
});

impl Ipv6 {
    /// IPv6 fixed header size
    pub const HEADER_SIZE: usize = 40;

    /// Hop limit used when none is set
    pub const DEFAULT_HOP_LIMIT: u8 = 64;

    /// Parse the fixed header, returning it with the bytes it encapsulates
    /// (bounded by the payload length field).
    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < Self::HEADER_SIZE || data[0] >> 4 != 6 {
            return None;
        }

        let first_word = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let payload_length = u16::from_be_bytes([data[4], data[5]]);
        let src: [u8; 16] = data[8..24].try_into().ok()?;
        let dst: [u8; 16] = data[24..40].try_into().ok()?;

        let ipv6 = Ipv6 {
            traffic_class: Some((first_word >> 20) as u8),
            flow_label: Some(first_word & 0x000F_FFFF),
            payload_length: Some(payload_length),
            next_header: Some(IpProtocol::from_u8(data[6])),
            hop_limit: Some(data[7]),
            src_addr: Some(Ipv6Addr::from(src)),
            dst_addr: Some(Ipv6Addr::from(dst)),
        };

        let end = (Self::HEADER_SIZE + payload_length as usize).min(data.len());
        Some((ipv6, &data[Self::HEADER_SIZE..end]))
    }

    pub(crate) fn header_bytes(&self, frame: &Frame, index: usize, payload: &[u8]) -> Result<Vec<u8>> {
        let payload_length = match self.payload_length {
            Some(payload_length) => payload_length,
            None => u16::try_from(payload.len())
                .map_err(|_| Error::construction("IPv6 payload exceeds 65535 bytes"))?,
        };
        let next_header = match self.next_header {
            Some(next_header) => next_header,
            None => match frame.get(index + 1) {
                None => IpProtocol::NoNextHeader,
                Some(next) => IpProtocol::for_layer(next).ok_or_else(|| {
                    Error::construction(
                        "IPv6 next header is not set and can't be derived from the next layer",
                    )
                })?,
            },
        };
        let src = self
            .src_addr
            .ok_or_else(|| Error::construction("IPv6 source address is not set"))?;
        let dst = self
            .dst_addr
            .ok_or_else(|| Error::construction("IPv6 destination address is not set"))?;

        let first_word = (6u32 << 28)
            | (self.traffic_class.unwrap_or(0) as u32) << 20
            | (self.flow_label.unwrap_or(0) & 0x000F_FFFF);

        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE);
        buffer.put_u32(first_word);
        buffer.put_u16(payload_length);
        buffer.put_u8(next_header.to_u8());
        buffer.put_u8(self.hop_limit.unwrap_or(Self::DEFAULT_HOP_LIMIT));
        buffer.put_slice(&src.octets());
        buffer.put_slice(&dst.octets());
        Ok(buffer.to_vec())
    }
}
