//! In-memory link standing in for the raw sockets in connection tests

use crate::flags::Endpoints;
use packetimpact_core::{Error, Injector, Result, Sniffer};
use packetimpact_packet::{Ether, Frame, Ipv4, Ipv6, Layer, MacAddress, Payload, Tcp, Udp};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

type Responder = Box<dyn FnMut(&Frame) -> Vec<Frame> + Send>;

#[derive(Default)]
struct WireState {
    sent: Vec<Vec<u8>>,
    inbound: VecDeque<Vec<u8>>,
    polls: usize,
    timeouts: Vec<Duration>,
    latency: Duration,
    responder: Option<Responder>,
    fail_injector_close: bool,
    fail_sniffer_close: bool,
    injector_closed: bool,
    sniffer_closed: bool,
}

/// Both directions of a scripted link, shared with the injector and sniffer
#[derive(Clone, Default)]
pub(crate) struct Wire {
    state: Arc<Mutex<WireState>>,
}

impl Wire {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn link(&self) -> (Box<dyn Injector>, Box<dyn Sniffer>) {
        (
            Box::new(MockInjector { wire: self.clone() }),
            Box::new(MockSniffer { wire: self.clone() }),
        )
    }

    /// Queue a frame for the connection to capture
    pub(crate) fn push(&self, frame: &Frame) {
        let bytes = frame.to_bytes().unwrap();
        self.state.lock().inbound.push_back(bytes);
    }

    /// Answer every injected frame with the frames `responder` returns
    pub(crate) fn respond_with(&self, responder: impl FnMut(&Frame) -> Vec<Frame> + Send + 'static) {
        self.state.lock().responder = Some(Box::new(responder));
    }

    /// Every injected frame, parsed
    pub(crate) fn sent(&self) -> Vec<Frame> {
        self.state.lock().sent.iter().map(|bytes| Frame::parse(bytes)).collect()
    }

    pub(crate) fn sent_bytes(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    /// Number of times the sniffer was asked for a frame
    pub(crate) fn polls(&self) -> usize {
        self.state.lock().polls
    }

    /// The timeout passed to each sniffer poll, in order
    pub(crate) fn recv_timeouts(&self) -> Vec<Duration> {
        self.state.lock().timeouts.clone()
    }

    /// Delay every sniffer poll that delivers a frame by `latency`
    pub(crate) fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    pub(crate) fn pending(&self) -> usize {
        self.state.lock().inbound.len()
    }

    pub(crate) fn fail_close(&self) {
        let mut state = self.state.lock();
        state.fail_injector_close = true;
        state.fail_sniffer_close = true;
    }

    pub(crate) fn is_closed(&self) -> bool {
        let state = self.state.lock();
        state.injector_closed && state.sniffer_closed
    }
}

struct MockInjector {
    wire: Wire,
}

impl Injector for MockInjector {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        let mut guard = self.wire.state.lock();
        let state = &mut *guard;
        state.sent.push(frame.to_vec());
        if let Some(responder) = state.responder.as_mut() {
            for response in responder(&Frame::parse(frame)) {
                state.inbound.push_back(response.to_bytes()?);
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.wire.state.lock();
        state.injector_closed = true;
        if state.fail_injector_close {
            return Err(Error::Interface("injector socket already gone".to_string()));
        }
        Ok(())
    }
}

struct MockSniffer {
    wire: Wire,
}

impl Sniffer for MockSniffer {
    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let (frame, latency) = {
            let mut state = self.wire.state.lock();
            state.polls += 1;
            state.timeouts.push(timeout);
            (state.inbound.pop_front(), state.latency)
        };
        if frame.is_some() && !latency.is_zero() {
            std::thread::sleep(latency.min(timeout));
        }
        Ok(frame)
    }

    fn drain(&mut self) -> Result<()> {
        self.wire.state.lock().inbound.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.wire.state.lock();
        state.sniffer_closed = true;
        if state.fail_sniffer_close {
            return Err(Error::Capture("capture handle already gone".to_string()));
        }
        Ok(())
    }
}

/// Endpoints with the local side on loopback so ports can be reserved
pub(crate) fn endpoints() -> Endpoints {
    Endpoints {
        device: "lo".to_string(),
        local_mac: MacAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
        remote_mac: MacAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]),
        local_ipv4: Ipv4Addr::LOCALHOST,
        remote_ipv4: Ipv4Addr::new(127, 0, 0, 2),
        local_ipv6: "fe80::1".parse().unwrap(),
        remote_ipv6: "fe80::2".parse().unwrap(),
    }
}

fn ether_from_peer(endpoints: &Endpoints) -> Layer {
    Layer::Ether(Ether {
        src_addr: Some(endpoints.remote_mac),
        dst_addr: Some(endpoints.local_mac),
        ..Default::default()
    })
}

fn ipv4_from_peer(endpoints: &Endpoints) -> Ipv4 {
    Ipv4 {
        src_addr: Some(endpoints.remote_ipv4),
        dst_addr: Some(endpoints.local_ipv4),
        ..Default::default()
    }
}

fn with_payload(mut layers: Vec<Layer>, payload: &[u8]) -> Frame {
    if !payload.is_empty() {
        layers.push(Layer::Payload(Payload::new(payload)));
    }
    Frame::new(layers)
}

/// A TCP segment from the remote peer
pub(crate) fn tcp_from_peer(endpoints: &Endpoints, tcp: Tcp, payload: &[u8]) -> Frame {
    with_payload(
        vec![
            ether_from_peer(endpoints),
            Layer::Ipv4(ipv4_from_peer(endpoints)),
            Layer::Tcp(tcp),
        ],
        payload,
    )
}

/// A UDP datagram from the remote peer
pub(crate) fn udp_from_peer(endpoints: &Endpoints, udp: Udp, payload: &[u8]) -> Frame {
    with_payload(
        vec![
            ether_from_peer(endpoints),
            Layer::Ipv4(ipv4_from_peer(endpoints)),
            Layer::Udp(udp),
        ],
        payload,
    )
}

/// An IPv4 packet from the remote peer carrying nothing after its header
pub(crate) fn bare_ipv4_from_peer(endpoints: &Endpoints, ipv4: Ipv4) -> Frame {
    let mut header = ipv4_from_peer(endpoints);
    header.merge(&ipv4);
    Frame::new(vec![ether_from_peer(endpoints), Layer::Ipv4(header)])
}

/// An IPv6 packet from the remote peer
pub(crate) fn ipv6_from_peer(endpoints: &Endpoints, inner: Vec<Layer>) -> Frame {
    let mut layers = vec![
        ether_from_peer(endpoints),
        Layer::Ipv6(Ipv6 {
            src_addr: Some(endpoints.remote_ipv6),
            dst_addr: Some(endpoints.local_ipv6),
            ..Default::default()
        }),
    ];
    layers.extend(inner);
    Frame::new(layers)
}
