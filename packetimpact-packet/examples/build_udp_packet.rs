//! Example: Building and re-parsing a UDP frame
//!
//! Only the addresses and ports are given; lengths, protocol numbers and
//! checksums are computed when the frame is serialized.

use std::net::Ipv4Addr;
use packetimpact_packet::{Ether, Frame, Ipv4, Layer, MacAddress, Payload, Udp};

fn main() {
    let frame = Frame::new(vec![
        Layer::Ether(Ether {
            src_addr: Some(MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])),
            dst_addr: Some(MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF])),
            ..Default::default()
        }),
        Layer::Ipv4(Ipv4 {
            src_addr: Some(Ipv4Addr::new(192, 168, 1, 100)),
            dst_addr: Some(Ipv4Addr::new(192, 168, 1, 1)),
            ..Default::default()
        }),
        Layer::Udp(Udp {
            src_port: Some(54321),
            dst_port: Some(53),
            ..Default::default()
        }),
        Layer::Payload(Payload::from("hello")),
    ]);

    let bytes = frame.to_bytes().expect("Failed to build UDP frame");
    println!("UDP frame built successfully!");
    println!("Total size: {} bytes", bytes.len());
    println!("Ethernet header: {:02X?}", &bytes[..14]);

    let parsed = Frame::parse(&bytes);
    println!("Parsed: {}", parsed);
    println!("Matches the template: {}", frame.matches(&parsed));
}
