//! Per-layer connection state
//!
//! Every layer of a connection keeps an `out` template for the headers it
//! sends and an `in` template for the headers it expects back. The TCP state
//! also tracks both sequence numbers so that each frame it builds continues
//! the conversation where the previous one left off.

use crate::port::PortPicker;
use packetimpact_core::{Error, Result};
use packetimpact_packet::{Ether, Frame, Ipv4, Ipv6, Layer, MacAddress, SeqNum, Tcp, Udp};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tracing::debug;

/// State of one layer of a [`Connection`](crate::Connection)
#[derive(Debug)]
pub enum LayerState {
    Ether(EtherState),
    Ipv4(Ipv4State),
    Ipv6(Ipv6State),
    Tcp(TcpState),
    Udp(UdpState),
}

impl LayerState {
    pub fn name(&self) -> &'static str {
        match self {
            LayerState::Ether(_) => "Ether",
            LayerState::Ipv4(_) => "IPv4",
            LayerState::Ipv6(_) => "IPv6",
            LayerState::Tcp(_) => "TCP",
            LayerState::Udp(_) => "UDP",
        }
    }

    /// A fresh copy of the layer to send next
    pub fn outgoing(&self) -> Layer {
        match self {
            LayerState::Ether(state) => Layer::Ether(state.out.clone()),
            LayerState::Ipv4(state) => Layer::Ipv4(state.out.clone()),
            LayerState::Ipv6(state) => Layer::Ipv6(state.out.clone()),
            LayerState::Tcp(state) => Layer::Tcp(state.outgoing()),
            LayerState::Udp(state) => Layer::Udp(state.out.clone()),
        }
    }

    /// A fresh copy of the layer expected in place of `received`.
    ///
    /// Returns `None` when `received` can never satisfy this layer.
    pub fn incoming(&self, received: &Layer) -> Option<Layer> {
        match self {
            LayerState::Ether(state) => Some(Layer::Ether(state.inbound.clone())),
            LayerState::Ipv4(state) => Some(Layer::Ipv4(state.inbound.clone())),
            LayerState::Ipv6(state) => Some(Layer::Ipv6(state.inbound.clone())),
            LayerState::Tcp(state) => received.as_tcp().map(|tcp| Layer::Tcp(state.incoming(tcp))),
            LayerState::Udp(state) => Some(Layer::Udp(state.inbound.clone())),
        }
    }

    /// Update the state after the layer at `index` of `frame` went on the wire
    pub fn sent(&mut self, frame: &Frame, index: usize) -> Result<()> {
        match self {
            LayerState::Tcp(state) => state.sent(frame, index),
            _ => Ok(()),
        }
    }

    /// Update the state after the layer at `index` of `frame` was matched
    pub fn received(&mut self, frame: &Frame, index: usize) -> Result<()> {
        match self {
            LayerState::Tcp(state) => state.received(frame, index),
            _ => Ok(()),
        }
    }

    /// Release any port held by this layer
    pub fn close(&mut self) -> Result<()> {
        match self {
            LayerState::Tcp(state) => state.port.close(),
            LayerState::Udp(state) => state.port.close(),
            _ => Ok(()),
        }
    }

    pub fn as_tcp(&self) -> Option<&TcpState> {
        match self {
            LayerState::Tcp(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_tcp_mut(&mut self) -> Option<&mut TcpState> {
        match self {
            LayerState::Tcp(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_udp(&self) -> Option<&UdpState> {
        match self {
            LayerState::Udp(state) => Some(state),
            _ => None,
        }
    }
}

/// Ethernet addressing between the local and remote hosts
#[derive(Debug, Clone)]
pub struct EtherState {
    out: Ether,
    inbound: Ether,
}

impl EtherState {
    /// Fields set in `out` and `inbound` take precedence over the addresses
    pub fn new(local_mac: MacAddress, remote_mac: MacAddress, out: Ether, inbound: Ether) -> Self {
        let mut state = EtherState {
            out: Ether {
                src_addr: Some(local_mac),
                dst_addr: Some(remote_mac),
                ..Default::default()
            },
            inbound: Ether {
                src_addr: Some(remote_mac),
                dst_addr: Some(local_mac),
                ..Default::default()
            },
        };
        state.out.merge(&out);
        state.inbound.merge(&inbound);
        state
    }
}

/// IPv4 addressing between the local and remote hosts
#[derive(Debug, Clone)]
pub struct Ipv4State {
    out: Ipv4,
    inbound: Ipv4,
}

impl Ipv4State {
    pub fn new(local: Ipv4Addr, remote: Ipv4Addr, out: Ipv4, inbound: Ipv4) -> Self {
        let mut state = Ipv4State {
            out: Ipv4 {
                src_addr: Some(local),
                dst_addr: Some(remote),
                ..Default::default()
            },
            inbound: Ipv4 {
                src_addr: Some(remote),
                dst_addr: Some(local),
                ..Default::default()
            },
        };
        state.out.merge(&out);
        state.inbound.merge(&inbound);
        state
    }
}

/// IPv6 addressing between the local and remote hosts
#[derive(Debug, Clone)]
pub struct Ipv6State {
    out: Ipv6,
    inbound: Ipv6,
}

impl Ipv6State {
    pub fn new(local: Ipv6Addr, remote: Ipv6Addr, out: Ipv6, inbound: Ipv6) -> Self {
        let mut state = Ipv6State {
            out: Ipv6 {
                src_addr: Some(local),
                dst_addr: Some(remote),
                ..Default::default()
            },
            inbound: Ipv6 {
                src_addr: Some(remote),
                dst_addr: Some(local),
                ..Default::default()
            },
        };
        state.out.merge(&out);
        state.inbound.merge(&inbound);
        state
    }
}

/// TCP ports and sequence numbers of one simulated peer
#[derive(Debug)]
pub struct TcpState {
    out: Tcp,
    inbound: Tcp,
    local_seq_num: SeqNum,
    remote_seq_num: Option<SeqNum>,
    syn_ack: Option<Tcp>,
    fin_sent: bool,
    port: PortPicker,
}

impl TcpState {
    /// Reserve a local port on `local_ip` and start from a random sequence number
    pub fn new(local_ip: IpAddr, out: Tcp, inbound: Tcp) -> Result<Self> {
        let port = PortPicker::stream(local_ip)?;
        Ok(Self::with_port(port, SeqNum::new(rand::random()), out, inbound))
    }

    pub(crate) fn with_port(port: PortPicker, local_seq_num: SeqNum, out: Tcp, inbound: Tcp) -> Self {
        let mut state = TcpState {
            out: Tcp {
                src_port: Some(port.port()),
                ..Default::default()
            },
            inbound: Tcp {
                dst_port: Some(port.port()),
                ..Default::default()
            },
            local_seq_num,
            remote_seq_num: None,
            syn_ack: None,
            fin_sent: false,
            port,
        };
        state.out.merge(&out);
        state.inbound.merge(&inbound);
        state
    }

    /// Sequence number of the next byte this side sends
    pub fn local_seq_num(&self) -> SeqNum {
        self.local_seq_num
    }

    /// Sequence number of the next byte expected from the remote, once known
    pub fn remote_seq_num(&self) -> Option<SeqNum> {
        self.remote_seq_num
    }

    /// The SYN-ACK captured during the handshake
    pub fn syn_ack(&self) -> Option<&Tcp> {
        self.syn_ack.as_ref()
    }

    pub fn set_syn_ack(&mut self, syn_ack: Tcp) {
        self.syn_ack = Some(syn_ack);
    }

    pub fn fin_sent(&self) -> bool {
        self.fin_sent
    }

    pub fn local_port(&self) -> u16 {
        self.port.port()
    }

    fn outgoing(&self) -> Tcp {
        let mut tcp = self.out.clone();
        tcp.seq_num = Some(self.local_seq_num.value());
        if let Some(remote) = self.remote_seq_num {
            tcp.ack_num = Some(remote.value());
        }
        tcp
    }

    fn incoming(&self, received: &Tcp) -> Tcp {
        let mut tcp = self.inbound.clone();
        if let Some(remote) = self.remote_seq_num {
            tcp.seq_num = Some(remote.value());
        }
        // An ack number is only meaningful with ACK set
        if received.flags_or_none().ack {
            tcp.ack_num = Some(self.local_seq_num.value());
        }
        tcp
    }

    fn sent(&mut self, frame: &Frame, index: usize) -> Result<()> {
        let tcp = tcp_at(frame, index)?;
        let flags = tcp.flags_or_none();

        if !self.fin_sent {
            self.local_seq_num.update_forward(frame.nested_length(index) as u32);
        }
        if flags.consumes_sequence() {
            self.local_seq_num.update_forward(1);
        }
        if flags.fin {
            self.fin_sent = true;
        }

        debug!("TCP sent {}: local seq now {}", flags, self.local_seq_num);
        Ok(())
    }

    fn received(&mut self, frame: &Frame, index: usize) -> Result<()> {
        let tcp = tcp_at(frame, index)?;
        let seq_num = tcp
            .seq_num
            .ok_or_else(|| Error::State("received TCP layer has no sequence number".to_string()))?;

        let mut remote = SeqNum::new(seq_num);
        if tcp.flags_or_none().consumes_sequence() {
            remote.update_forward(1);
        }
        remote.update_forward(frame.nested_length(index) as u32);
        self.remote_seq_num = Some(remote);

        debug!("TCP received {}: remote seq now {}", tcp.flags_or_none(), remote);
        Ok(())
    }
}

fn tcp_at(frame: &Frame, index: usize) -> Result<&Tcp> {
    match frame.get(index) {
        Some(Layer::Tcp(tcp)) => Ok(tcp),
        Some(other) => Err(Error::State(format!("can't update TCP state with {}", other))),
        None => Err(Error::State(format!("frame has no layer {}", index))),
    }
}

/// UDP ports of one simulated peer
#[derive(Debug)]
pub struct UdpState {
    out: Udp,
    inbound: Udp,
    port: PortPicker,
}

impl UdpState {
    /// Reserve a local port on `local_ip`
    pub fn new(local_ip: IpAddr, out: Udp, inbound: Udp) -> Result<Self> {
        let port = PortPicker::datagram(local_ip)?;
        Ok(Self::with_port(port, out, inbound))
    }

    pub(crate) fn with_port(port: PortPicker, out: Udp, inbound: Udp) -> Self {
        let mut state = UdpState {
            out: Udp {
                src_port: Some(port.port()),
                ..Default::default()
            },
            inbound: Udp {
                dst_port: Some(port.port()),
                ..Default::default()
            },
            port,
        };
        state.out.merge(&out);
        state.inbound.merge(&inbound);
        state
    }

    /// Address and port datagrams are sent from
    pub fn local_addr(&self) -> SocketAddr {
        self.port.local_addr()
    }
}
