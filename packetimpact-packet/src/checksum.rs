//! Checksum calculations for network packets
//!
//! This module provides the Internet Checksum (RFC 1071) used in the IPv4,
//! TCP and UDP headers, and the pseudo-header variants used by TCP and UDP
//! over both IPv4 and IPv6.

use crate::frame::Frame;
use crate::ip::IpProtocol;
use crate::layer::Layer;
use packetimpact_core::{Error, Result};
use std::net::IpAddr;

/// Calculates the Internet Checksum as defined in RFC 1071.
///
/// The data is treated as a sequence of 16-bit words which are summed, and
/// the one's complement of the folded sum is returned.
///
/// # Examples
///
/// ```
/// use packetimpact_packet::checksum::internet_checksum;
///
/// let data = vec![0x45, 0x00, 0x00, 0x3c];
/// let checksum = internet_checksum(&data);
/// ```
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u64 = 0;

    // Process 16-bit words
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        let word = u16::from_be_bytes([chunk[0], chunk[1]]);
        sum += word as u64;
    }

    // Handle odd byte if present
    if let Some(&byte) = chunks.remainder().first() {
        sum += (byte as u64) << 8;
    }

    // Fold to 16 bits
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    // Return one's complement
    !sum as u16
}

/// Calculates the checksum of a TCP or UDP segment including the pseudo-header.
///
/// The IPv4 pseudo-header (RFC 793) is used for IPv4 addresses and the IPv6
/// one (RFC 8200 section 8.1) for IPv6 addresses. Mixed address families are
/// rejected.
///
/// # Examples
///
/// ```
/// use std::net::{IpAddr, Ipv4Addr};
/// use packetimpact_packet::checksum::transport_checksum;
/// use packetimpact_packet::ip::IpProtocol;
///
/// let src = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1));
/// let dst = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2));
/// let data = vec![0x00, 0x35, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00];
/// let checksum = transport_checksum(src, dst, IpProtocol::UDP, &data).unwrap();
/// ```
pub fn transport_checksum(src: IpAddr, dst: IpAddr, protocol: IpProtocol, data: &[u8]) -> Result<u16> {
    let mut pseudo_header = Vec::with_capacity(40 + data.len());

    match (src, dst) {
        (IpAddr::V4(src), IpAddr::V4(dst)) => {
            let length = u16::try_from(data.len())
                .map_err(|_| Error::construction("segment too long for an IPv4 pseudo-header"))?;
            pseudo_header.extend_from_slice(&src.octets());
            pseudo_header.extend_from_slice(&dst.octets());
            pseudo_header.push(0);
            pseudo_header.push(protocol.to_u8());
            pseudo_header.extend_from_slice(&length.to_be_bytes());
        }
        (IpAddr::V6(src), IpAddr::V6(dst)) => {
            let length = u32::try_from(data.len())
                .map_err(|_| Error::construction("segment too long for an IPv6 pseudo-header"))?;
            pseudo_header.extend_from_slice(&src.octets());
            pseudo_header.extend_from_slice(&dst.octets());
            pseudo_header.extend_from_slice(&length.to_be_bytes());
            pseudo_header.extend_from_slice(&[0, 0, 0]);
            pseudo_header.push(protocol.to_u8());
        }
        _ => {
            return Err(Error::construction(format!(
                "pseudo-header addresses {} and {} are of different families",
                src, dst
            )))
        }
    }

    // TCP/UDP header and data
    pseudo_header.extend_from_slice(data);

    Ok(internet_checksum(&pseudo_header))
}

/// Checksum of the transport segment at `index`, using the addresses of the
/// IP layer directly before it.
pub(crate) fn pseudo_header_checksum(
    frame: &Frame,
    index: usize,
    protocol: IpProtocol,
    segment: &[u8],
) -> Result<u16> {
    let previous = index.checked_sub(1).and_then(|i| frame.get(i));
    let (src, dst) = match previous {
        Some(Layer::Ipv4(ipv4)) => match (ipv4.src_addr, ipv4.dst_addr) {
            (Some(src), Some(dst)) => (IpAddr::V4(src), IpAddr::V4(dst)),
            _ => return Err(Error::construction("IPv4 addresses are needed for the pseudo-header")),
        },
        Some(Layer::Ipv6(ipv6)) => match (ipv6.src_addr, ipv6.dst_addr) {
            (Some(src), Some(dst)) => (IpAddr::V6(src), IpAddr::V6(dst)),
            _ => return Err(Error::construction("IPv6 addresses are needed for the pseudo-header")),
        },
        _ => {
            return Err(Error::construction(format!(
                "{} checksum is not set and there is no IP layer before it",
                protocol
            )))
        }
    };
    transport_checksum(src, dst, protocol, segment)
}

/// Validates an Internet checksum.
///
/// The checksum over data that includes its own checksum field is 0 (or
/// 0xFFFF, its one's complement equivalent) when valid.
pub fn validate_checksum(data: &[u8]) -> bool {
    let result = internet_checksum(data);
    result == 0 || result == 0xFFFF
}
