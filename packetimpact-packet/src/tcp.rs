//! TCP header layer
//!
//! This module provides the partially specified TCP header, its flags and the
//! pseudo-header checksum calculation against the enclosing IP layer.

use crate::checksum::pseudo_header_checksum;
use crate::frame::Frame;
use crate::ip::{padded_options, IpProtocol};
use bytes::{BufMut, BytesMut};
use packetimpact_core::{Error, Result};
use std::fmt;
use std::ops::BitOr;

/// TCP flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    /// FIN - No more data from sender
    pub fin: bool,
    /// SYN - Synchronize sequence numbers
    pub syn: bool,
    /// RST - Reset the connection
    pub rst: bool,
    /// PSH - Push function
    pub psh: bool,
    /// ACK - Acknowledgment field is significant
    pub ack: bool,
    /// URG - Urgent pointer field is significant
    pub urg: bool,
    /// ECE - ECN-Echo
    pub ece: bool,
    /// CWR - Congestion Window Reduced
    pub cwr: bool,
}

impl TcpFlags {
    /// No flags set
    pub const NONE: TcpFlags = TcpFlags::from_u8(0);

    /// FIN flag
    pub const FIN: TcpFlags = TcpFlags::from_u8(0b0000_0001);

    /// SYN flag (connection initiation)
    pub const SYN: TcpFlags = TcpFlags::from_u8(0b0000_0010);

    /// RST flag (connection reset)
    pub const RST: TcpFlags = TcpFlags::from_u8(0b0000_0100);

    /// PSH flag
    pub const PSH: TcpFlags = TcpFlags::from_u8(0b0000_1000);

    /// ACK flag
    pub const ACK: TcpFlags = TcpFlags::from_u8(0b0001_0000);

    /// SYN+ACK flags (connection acknowledgment)
    pub const SYN_ACK: TcpFlags = TcpFlags::from_u8(0b0001_0010);

    /// FIN+ACK flags (connection termination)
    pub const FIN_ACK: TcpFlags = TcpFlags::from_u8(0b0001_0001);

    /// PSH+ACK flags (push data)
    pub const PSH_ACK: TcpFlags = TcpFlags::from_u8(0b0001_1000);

    /// RST+ACK flags
    pub const RST_ACK: TcpFlags = TcpFlags::from_u8(0b0001_0100);

    /// Convert flags to u8 value
    pub const fn to_u8(self) -> u8 {
        (self.fin as u8)
            | (self.syn as u8) << 1
            | (self.rst as u8) << 2
            | (self.psh as u8) << 3
            | (self.ack as u8) << 4
            | (self.urg as u8) << 5
            | (self.ece as u8) << 6
            | (self.cwr as u8) << 7
    }

    /// Parse flags from u8 value
    pub const fn from_u8(value: u8) -> Self {
        TcpFlags {
            fin: (value & 0b0000_0001) != 0,
            syn: (value & 0b0000_0010) != 0,
            rst: (value & 0b0000_0100) != 0,
            psh: (value & 0b0000_1000) != 0,
            ack: (value & 0b0001_0000) != 0,
            urg: (value & 0b0010_0000) != 0,
            ece: (value & 0b0100_0000) != 0,
            cwr: (value & 0b1000_0000) != 0,
        }
    }

    /// Whether every flag set in `other` is also set in `self`
    pub const fn contains(self, other: TcpFlags) -> bool {
        self.to_u8() & other.to_u8() == other.to_u8()
    }

    /// Whether SYN or FIN is set, the two flags that occupy sequence space
    pub const fn consumes_sequence(self) -> bool {
        self.syn || self.fin
    }
}

impl BitOr for TcpFlags {
    type Output = TcpFlags;

    fn bitor(self, rhs: TcpFlags) -> TcpFlags {
        TcpFlags::from_u8(self.to_u8() | rhs.to_u8())
    }
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.fin, "FIN"),
            (self.syn, "SYN"),
            (self.rst, "RST"),
            (self.psh, "PSH"),
            (self.ack, "ACK"),
            (self.urg, "URG"),
            (self.ece, "ECE"),
            (self.cwr, "CWR"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", set.join("|"))
        }
    }
}

/// TCP header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tcp {
    /// Source port
    pub src_port: Option<u16>,
    /// Destination port
    pub dst_port: Option<u16>,
    /// Sequence number
    pub seq_num: Option<u32>,
    /// Acknowledgment number
    pub ack_num: Option<u32>,
    /// Data offset in 32-bit words
    pub data_offset: Option<u8>,
    /// TCP flags
    pub flags: Option<TcpFlags>,
    /// Window size
    pub window_size: Option<u16>,
    /// Checksum
    pub checksum: Option<u16>,
    /// Urgent pointer
    pub urgent_pointer: Option<u16>,
    /// Options, padded to a 4-byte boundary when serialized
    pub options: Option<Vec<u8>>,
}

layer_fields!(Tcp {
    src_port,
    dst_port,
    seq_num,
    ack_num,
    data_offset,
    flags,
    window_size,
    checksum,
    urgent_pointer,
    options,
});

impl Tcp {
    /// Minimum TCP header size (without options)
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Window advertised when none is set
    pub const DEFAULT_WINDOW_SIZE: u16 = 32768;

    /// A TCP layer with only the given flags set
    pub fn with_flags(flags: TcpFlags) -> Self {
        Tcp {
            flags: Some(flags),
            ..Default::default()
        }
    }

    /// Header length in bytes as it goes on the wire
    pub fn header_len(&self) -> usize {
        match self.data_offset {
            Some(data_offset) => data_offset as usize * 4,
            None => Self::MIN_HEADER_SIZE + padded_options(self.options.as_deref()).len(),
        }
    }

    /// The flags of this header, treating unset as no flags
    pub fn flags_or_none(&self) -> TcpFlags {
        self.flags.unwrap_or(TcpFlags::NONE)
    }

    /// Parse the header, returning it with the segment data
    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < Self::MIN_HEADER_SIZE {
            return None;
        }

        let data_offset = data[12] >> 4;
        let header_len = data_offset as usize * 4;
        if header_len < Self::MIN_HEADER_SIZE || data.len() < header_len {
            return None;
        }

        let tcp = Tcp {
            src_port: Some(u16::from_be_bytes([data[0], data[1]])),
            dst_port: Some(u16::from_be_bytes([data[2], data[3]])),
            seq_num: Some(u32::from_be_bytes([data[4], data[5], data[6], data[7]])),
            ack_num: Some(u32::from_be_bytes([data[8], data[9], data[10], data[11]])),
            data_offset: Some(data_offset),
            flags: Some(TcpFlags::from_u8(data[13])),
            window_size: Some(u16::from_be_bytes([data[14], data[15]])),
            checksum: Some(u16::from_be_bytes([data[16], data[17]])),
            urgent_pointer: Some(u16::from_be_bytes([data[18], data[19]])),
            options: Some(data[Self::MIN_HEADER_SIZE..header_len].to_vec()),
        };

        Some((tcp, &data[header_len..]))
    }

    pub(crate) fn header_bytes(&self, frame: &Frame, index: usize, payload: &[u8]) -> Result<Vec<u8>> {
        let src_port = self
            .src_port
            .ok_or_else(|| Error::construction("TCP source port is not set"))?;
        let dst_port = self
            .dst_port
            .ok_or_else(|| Error::construction("TCP destination port is not set"))?;

        let options = padded_options(self.options.as_deref());
        let header_size = Self::MIN_HEADER_SIZE + options.len();
        let data_offset = match self.data_offset {
            Some(data_offset) => data_offset,
            None => (header_size / 4) as u8,
        };

        let mut buffer = BytesMut::with_capacity(header_size);
        buffer.put_u16(src_port);
        buffer.put_u16(dst_port);
        buffer.put_u32(self.seq_num.unwrap_or(0));
        buffer.put_u32(self.ack_num.unwrap_or(0));
        // Data offset (4 bits) + reserved
        buffer.put_u8(data_offset << 4);
        buffer.put_u8(self.flags_or_none().to_u8());
        buffer.put_u16(self.window_size.unwrap_or(Self::DEFAULT_WINDOW_SIZE));
        buffer.put_u16(self.checksum.unwrap_or(0));
        buffer.put_u16(self.urgent_pointer.unwrap_or(0));
        buffer.put_slice(&options);

        let mut header = buffer.to_vec();
        if self.checksum.is_none() {
            let mut segment = header.clone();
            segment.extend_from_slice(payload);
            let checksum = pseudo_header_checksum(frame, index, IpProtocol::TCP, &segment)?;
            header[16..18].copy_from_slice(&checksum.to_be_bytes());
        }
        Ok(header)
    }
}
