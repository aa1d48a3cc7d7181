//! Raw IPv6 connections

use crate::connection::{raw_link, Connection};
use crate::flags::Endpoints;
use crate::state::{EtherState, Ipv6State, LayerState};
use packetimpact_core::{Error, Injector, Result, Sniffer};
use packetimpact_packet::{Ether, Frame, Ipv6, Layer};
use std::time::Duration;
use tracing::info;

/// A connection speaking Ethernet and IPv6, leaving everything above the
/// network layer to the caller
pub struct Ipv6Conn {
    conn: Connection,
}

impl Ipv6Conn {
    pub fn new(endpoints: &Endpoints, out: Ipv6, inbound: Ipv6) -> Result<Self> {
        let (injector, sniffer) = raw_link(endpoints)?;
        Self::with_link(endpoints, out, inbound, injector, sniffer)
    }

    pub fn with_link(
        endpoints: &Endpoints,
        out: Ipv6,
        inbound: Ipv6,
        injector: Box<dyn Injector>,
        sniffer: Box<dyn Sniffer>,
    ) -> Result<Self> {
        info!("IPv6 connection {} -> {}", endpoints.local_ipv6, endpoints.remote_ipv6);
        let layer_states = vec![
            LayerState::Ether(EtherState::new(
                endpoints.local_mac,
                endpoints.remote_mac,
                Ether::default(),
                Ether::default(),
            )),
            LayerState::Ipv6(Ipv6State::new(endpoints.local_ipv6, endpoints.remote_ipv6, out, inbound)),
        ];
        Ok(Self {
            conn: Connection::new(layer_states, injector, sniffer),
        })
    }

    pub fn create_frame(&self, ipv6: Ipv6, additional: Vec<Layer>) -> Result<Frame> {
        self.conn.create_frame(&Layer::Ipv6(ipv6), additional)
    }

    /// Send `additional` over IPv6, `ipv6` overriding the connection's defaults
    pub fn send(&mut self, ipv6: Ipv6, additional: Vec<Layer>) -> Result<()> {
        self.conn.send(&Layer::Ipv6(ipv6), additional)
    }

    pub fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        self.conn.send_frame(frame)
    }

    /// Wait for a packet whose IPv6 header matches `ipv6`
    pub fn expect(&mut self, ipv6: Ipv6, timeout: Duration) -> Result<Ipv6> {
        match self.conn.expect(Layer::Ipv6(ipv6), timeout)? {
            Layer::Ipv6(ipv6) => Ok(ipv6),
            other => Err(Error::PacketParsing(format!("expected an IPv6 layer, got {}", other))),
        }
    }

    pub fn expect_frame(&mut self, expected: &Frame, timeout: Duration) -> Result<Frame> {
        self.conn.expect_frame(expected, timeout)
    }

    pub fn drain(&mut self) -> Result<()> {
        self.conn.drain()
    }

    pub fn close(&mut self) -> Result<()> {
        self.conn.close()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
