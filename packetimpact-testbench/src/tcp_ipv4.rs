//! TCP over IPv4 connections

use crate::connection::{raw_link, Connection};
use crate::flags::Endpoints;
use crate::state::{EtherState, Ipv4State, LayerState, TcpState};
use packetimpact_core::{Error, Injector, Result, Sniffer};
use packetimpact_packet::{Ether, Frame, Ipv4, Layer, Payload, SeqNum, Tcp, TcpFlags};
use std::net::IpAddr;
use std::time::Duration;
use tracing::info;

/// Longest the handshake waits for the SYN-ACK
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// A connection speaking Ethernet, IPv4 and TCP to the remote peer
pub struct TcpIpv4 {
    conn: Connection,
}

impl TcpIpv4 {
    /// Connect over the raw sockets of the test device.
    ///
    /// Fields set in `out` and `inbound` override the connection defaults
    /// for every segment sent and expected.
    pub fn new(endpoints: &Endpoints, out: Tcp, inbound: Tcp) -> Result<Self> {
        let (injector, sniffer) = raw_link(endpoints)?;
        Self::with_link(endpoints, out, inbound, injector, sniffer)
    }

    /// Connect over an existing injector and sniffer
    pub fn with_link(
        endpoints: &Endpoints,
        out: Tcp,
        inbound: Tcp,
        injector: Box<dyn Injector>,
        sniffer: Box<dyn Sniffer>,
    ) -> Result<Self> {
        let tcp = TcpState::new(IpAddr::V4(endpoints.local_ipv4), out, inbound)?;
        info!(
            "TCP connection {}:{} -> {}",
            endpoints.local_ipv4,
            tcp.local_port(),
            endpoints.remote_ipv4
        );
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
            LayerState::Tcp(tcp),
        ];
        Ok(Self {
            conn: Connection::new(layer_states, injector, sniffer),
        })
    }

    fn tcp_state(&self) -> Option<&TcpState> {
        self.conn.layer_states().last().and_then(LayerState::as_tcp)
    }

    /// Perform the three-way handshake, keeping the SYN-ACK
    pub fn handshake(&mut self) -> Result<()> {
        self.send(Tcp::with_flags(TcpFlags::SYN), Vec::new())?;
        let syn_ack = self.expect(Tcp::with_flags(TcpFlags::SYN_ACK), HANDSHAKE_TIMEOUT)?;
        self.conn
            .layer_states_mut()
            .last_mut()
            .and_then(LayerState::as_tcp_mut)
            .ok_or_else(|| Error::State("connection has no TCP layer".to_string()))?
            .set_syn_ack(syn_ack);
        self.send(Tcp::with_flags(TcpFlags::ACK), Vec::new())
    }

    pub fn create_frame(&self, tcp: Tcp, additional: Vec<Layer>) -> Result<Frame> {
        self.conn.create_frame(&Layer::Tcp(tcp), additional)
    }

    /// Send a segment, `tcp` overriding the connection's defaults
    pub fn send(&mut self, tcp: Tcp, additional: Vec<Layer>) -> Result<()> {
        self.conn.send(&Layer::Tcp(tcp), additional)
    }

    pub fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        self.conn.send_frame(frame)
    }

    /// Wait for a segment matching `tcp`
    pub fn expect(&mut self, tcp: Tcp, timeout: Duration) -> Result<Tcp> {
        match self.conn.expect(Layer::Tcp(tcp), timeout)? {
            Layer::Tcp(tcp) => Ok(tcp),
            other => Err(Error::PacketParsing(format!("expected a TCP layer, got {}", other))),
        }
    }

    /// Wait for a segment matching `tcp` that carries `payload`
    pub fn expect_data(&mut self, tcp: Tcp, payload: Option<Payload>, timeout: Duration) -> Result<Frame> {
        let additional = payload.map(Layer::Payload).into_iter().collect();
        self.conn.expect_layers(Layer::Tcp(tcp), additional, timeout)
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

    /// Sequence number of the next byte sent to the peer
    pub fn local_seq_num(&self) -> Option<SeqNum> {
        self.tcp_state().map(TcpState::local_seq_num)
    }

    /// Sequence number of the next byte expected from the peer
    pub fn remote_seq_num(&self) -> Option<SeqNum> {
        self.tcp_state().and_then(TcpState::remote_seq_num)
    }

    /// The SYN-ACK captured by [`TcpIpv4::handshake`]
    pub fn syn_ack(&self) -> Option<&Tcp> {
        self.tcp_state().and_then(TcpState::syn_ack)
    }

    pub fn local_port(&self) -> Option<u16> {
        self.tcp_state().map(TcpState::local_port)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
