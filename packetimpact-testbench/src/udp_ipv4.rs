//! UDP over IPv4 connections

use crate::connection::{raw_link, Connection};
use crate::flags::Endpoints;
use crate::state::{EtherState, Ipv4State, LayerState, UdpState};
use packetimpact_core::{Error, Injector, Result, Sniffer};
use packetimpact_packet::{Ether, Frame, Ipv4, Layer, Payload, Udp};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::info;

/// A connection speaking Ethernet, IPv4 and UDP to the remote peer
pub struct UdpIpv4 {
    conn: Connection,
    local_addr: SocketAddr,
}

impl UdpIpv4 {
    pub fn new(endpoints: &Endpoints, out: Udp, inbound: Udp) -> Result<Self> {
        let (injector, sniffer) = raw_link(endpoints)?;
        Self::with_link(endpoints, out, inbound, injector, sniffer)
    }

    pub fn with_link(
        endpoints: &Endpoints,
        out: Udp,
        inbound: Udp,
        injector: Box<dyn Injector>,
        sniffer: Box<dyn Sniffer>,
    ) -> Result<Self> {
        let udp = UdpState::new(IpAddr::V4(endpoints.local_ipv4), out, inbound)?;
        let local_addr = udp.local_addr();
        info!("UDP connection {} -> {}", local_addr, endpoints.remote_ipv4);
        let layer_states = vec![
            LayerState::Ether(EtherState::new(
                endpoints.local_mac,
                endpoints.remote_mac,
                Ether::default(),
                Ether::default(),
            )),
            LayerState::Ipv4(Ipv4State::new(
                endpoints.local_ipv4,
                endpoints.remote_ipv4,
                Ipv4::default(),
                Ipv4::default(),
            )),
            LayerState::Udp(udp),
        ];
        Ok(Self {
            conn: Connection::new(layer_states, injector, sniffer),
            local_addr,
        })
    }

    /// Address and reserved port datagrams are sent from
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn create_frame(&self, udp: Udp, additional: Vec<Layer>) -> Result<Frame> {
        self.conn.create_frame(&Layer::Udp(udp), additional)
    }

    /// Send a datagram, `udp` overriding the connection's defaults
    pub fn send(&mut self, udp: Udp, additional: Vec<Layer>) -> Result<()> {
        self.conn.send(&Layer::Udp(udp), additional)
    }

    pub fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        self.conn.send_frame(frame)
    }

    /// Send `additional` directly after the IPv4 header, in place of UDP
    pub fn send_ip(&mut self, additional: Vec<Layer>) -> Result<()> {
        let frame = self.conn.create_outer_frame(additional)?;
        self.conn.send_frame(&frame)
    }

    /// Wait for a datagram matching `udp`
    pub fn expect(&mut self, udp: Udp, timeout: Duration) -> Result<Udp> {
        match self.conn.expect(Layer::Udp(udp), timeout)? {
            Layer::Udp(udp) => Ok(udp),
            other => Err(Error::PacketParsing(format!("expected a UDP layer, got {}", other))),
        }
    }

    /// Wait for a datagram matching `udp` that carries `payload`.
    /// An empty payload leaves the data unconstrained.
    pub fn expect_data(&mut self, udp: Udp, payload: Option<Payload>, timeout: Duration) -> Result<Frame> {
        let additional = payload
            .filter(|payload| !payload.is_empty())
            .map(Layer::Payload)
            .into_iter()
            .collect();
        self.conn.expect_layers(Layer::Udp(udp), additional, timeout)
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
