//! Example: complete a handshake with the DUT and reset the connection
//!
//! Run with: sudo -E cargo run --example tcp_handshake -- --port 8080
//! with the PACKETIMPACT_* variables describing the test network.

use clap::Parser;
use packetimpact_packet::{Tcp, TcpFlags};
use packetimpact_testbench::{Endpoints, Flags, TcpIpv4};
use std::time::Duration;

#[derive(Parser, Debug)]
struct Args {
    #[command(flatten)]
    flags: Flags,

    /// Port the DUT listens on
    #[arg(long, default_value_t = 80)]
    port: u16,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let args = Args::parse();
    let endpoints = Endpoints::resolve(&args.flags)?;

    let mut conn = TcpIpv4::new(
        &endpoints,
        Tcp {
            dst_port: Some(args.port),
            ..Default::default()
        },
        Tcp {
            src_port: Some(args.port),
            ..Default::default()
        },
    )?;

    conn.handshake()?;
    if let Some(syn_ack) = conn.syn_ack() {
        println!("SYN-ACK: seq {:?}, window {:?}", syn_ack.seq_num, syn_ack.window_size);
    }

    conn.send(Tcp::with_flags(TcpFlags::RST_ACK), Vec::new())?;
    match conn.expect(Tcp::default(), Duration::from_millis(500)) {
        Ok(tcp) => println!("DUT answered the reset with {:?}", tcp.flags),
        Err(e) if e.is_timeout() => println!("DUT stayed silent after the reset"),
        Err(e) => return Err(e.into()),
    }

    conn.close()?;
    Ok(())
}
