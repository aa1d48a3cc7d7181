//! Example: Matching a captured SYN against a partial expectation
//!
//! The expectation only constrains the TCP flags and destination port, so
//! every other field of the captured frame is ignored.

use std::net::Ipv4Addr;
use packetimpact_packet::{Ether, Frame, Ipv4, Layer, MacAddress, Tcp, TcpFlags};

fn main() {
    let syn = Frame::new(vec![
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
        Layer::Tcp(Tcp {
            src_port: Some(54321),
            dst_port: Some(80),
            seq_num: Some(1000),
            flags: Some(TcpFlags::SYN),
            ..Default::default()
        }),
    ]);

    let bytes = syn.to_bytes().expect("Failed to build TCP SYN frame");
    let captured = Frame::parse(&bytes);
    println!("Captured: {}", captured);

    let expect_syn = Frame::new(vec![
        Layer::Ether(Ether::default()),
        Layer::Ipv4(Ipv4::default()),
        Layer::Tcp(Tcp {
            dst_port: Some(80),
            flags: Some(TcpFlags::SYN),
            ..Default::default()
        }),
    ]);
    println!("SYN expectation matches: {}", expect_syn.matches(&captured));

    let expect_syn_ack = Frame::new(vec![
        Layer::Ether(Ether::default()),
        Layer::Ipv4(Ipv4::default()),
        Layer::Tcp(Tcp::with_flags(TcpFlags::SYN_ACK)),
    ]);
    println!("SYN-ACK expectation matches: {}", expect_syn_ack.matches(&captured));
    println!("{}", captured.diff(&expect_syn_ack));
}
