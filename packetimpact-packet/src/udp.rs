//! UDP header layer
//!
//! This module provides the partially specified UDP header and its
//! pseudo-header checksum calculation.

use crate::checksum::pseudo_header_checksum;
use crate::frame::Frame;
use crate::ip::IpProtocol;
use bytes::{BufMut, BytesMut};
use packetimpact_core::{Error, Result};

/// UDP header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Udp {
    /// Source port
    pub src_port: Option<u16>,
    /// Destination port
    pub dst_port: Option<u16>,
    /// Length (header + data)
    pub length: Option<u16>,
    /// Checksum
    pub checksum: Option<u16>,
}

layer_fields!(Udp {
    src_port,
    dst_port,
    length,
    checksum,
});

impl Udp {
    /// UDP header size in bytes
    pub const HEADER_SIZE: usize = 8;

    /// Parse the header, returning it with the datagram data.
    ///
    /// The data is bounded by the length field when it is consistent with
    /// the captured bytes.
    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < Self::HEADER_SIZE {
            return None;
        }

        let length = u16::from_be_bytes([data[4], data[5]]);
        let udp = Udp {
            src_port: Some(u16::from_be_bytes([data[0], data[1]])),
            dst_port: Some(u16::from_be_bytes([data[2], data[3]])),
            length: Some(length),
            checksum: Some(u16::from_be_bytes([data[6], data[7]])),
        };

        let end = (length as usize).clamp(Self::HEADER_SIZE, data.len());
        Some((udp, &data[Self::HEADER_SIZE..end]))
    }

    pub(crate) fn header_bytes(&self, frame: &Frame, index: usize, payload: &[u8]) -> Result<Vec<u8>> {
        let src_port = self
            .src_port
            .ok_or_else(|| Error::construction("UDP source port is not set"))?;
        let dst_port = self
            .dst_port
            .ok_or_else(|| Error::construction("UDP destination port is not set"))?;
        let length = match self.length {
            Some(length) => length,
            None => u16::try_from(Self::HEADER_SIZE + payload.len())
                .map_err(|_| Error::construction("UDP datagram exceeds 65535 bytes"))?,
        };

        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE);
        buffer.put_u16(src_port);
        buffer.put_u16(dst_port);
        buffer.put_u16(length);
        buffer.put_u16(self.checksum.unwrap_or(0));

        let mut header = buffer.to_vec();
        if self.checksum.is_none() {
            let mut datagram = header.clone();
            datagram.extend_from_slice(payload);
            let mut checksum = pseudo_header_checksum(frame, index, IpProtocol::UDP, &datagram)?;
            // A computed zero goes on the wire as all ones (RFC 768)
            if checksum == 0 {
                checksum = 0xFFFF;
            }
            header[6..8].copy_from_slice(&checksum.to_be_bytes());
        }
        Ok(header)
    }
}
