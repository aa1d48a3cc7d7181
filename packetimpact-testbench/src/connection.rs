//! Frame exchange with one remote peer
//!
//! A [`Connection`] stacks one [`LayerState`] per protocol layer on top of an
//! injector and a sniffer. Outgoing frames start from every state's
//! `outgoing()` template; captured frames are matched against every state's
//! `incoming()` template merged with the caller's expectation.

use crate::flags::Endpoints;
use crate::state::LayerState;
use packetimpact_capture::filters::peer_filter;
use packetimpact_capture::{DatalinkInjector, PcapSniffer, SnifferConfig};
use packetimpact_core::{Error, Injector, Result, Sniffer};
use packetimpact_packet::{Frame, Layer};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Layer states driven over one injector/sniffer pair
pub struct Connection {
    layer_states: Vec<LayerState>,
    injector: Box<dyn Injector>,
    sniffer: Box<dyn Sniffer>,
    closed: bool,
}

impl Connection {
    pub fn new(layer_states: Vec<LayerState>, injector: Box<dyn Injector>, sniffer: Box<dyn Sniffer>) -> Self {
        let names: Vec<&str> = layer_states.iter().map(LayerState::name).collect();
        debug!("New connection over [{}]", names.join(" / "));
        Self {
            layer_states,
            injector,
            sniffer,
            closed: false,
        }
    }

    pub fn layer_states(&self) -> &[LayerState] {
        &self.layer_states
    }

    pub fn layer_states_mut(&mut self) -> &mut [LayerState] {
        &mut self.layer_states
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    /// Build a frame from every state's outgoing layer, with `layer` merged
    /// into the innermost one and `additional` appended unchanged.
    pub fn create_frame(&self, layer: &Layer, additional: Vec<Layer>) -> Result<Frame> {
        self.ensure_open()?;
        let mut frame: Frame = self.layer_states.iter().map(LayerState::outgoing).collect();
        if let Some(innermost) = frame.last_mut() {
            innermost.merge(layer)?;
        }
        for extra in additional {
            frame.push(extra);
        }
        Ok(frame)
    }

    /// Build a frame from every state's outgoing layer except the innermost,
    /// followed by `additional`.
    pub fn create_outer_frame(&self, additional: Vec<Layer>) -> Result<Frame> {
        self.ensure_open()?;
        let outer = self.layer_states.len().saturating_sub(1);
        Ok(self.layer_states[..outer]
            .iter()
            .map(LayerState::outgoing)
            .chain(additional)
            .collect())
    }

    /// Inject `frame` and update every state with what actually went out.
    ///
    /// The states see the frame parsed back from the injected bytes, so
    /// fields computed during serialization are known to them.
    pub fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        self.ensure_open()?;
        let bytes = frame.to_bytes()?;
        self.injector.send(&bytes)?;
        trace!("injected {} bytes", bytes.len());

        let sent = Frame::parse(&bytes);
        debug!("Sent {}", sent);
        for (index, state) in self.layer_states.iter_mut().enumerate() {
            state.sent(&sent, index)?;
        }
        Ok(())
    }

    /// Create a frame with [`Connection::create_frame`] and send it
    pub fn send(&mut self, layer: &Layer, additional: Vec<Layer>) -> Result<()> {
        let frame = self.create_frame(layer, additional)?;
        self.send_frame(&frame)
    }

    /// The frame every state expects in place of `received`, or `None` when
    /// `received` can't match whatever the caller expects.
    pub fn incoming(&self, received: &Frame) -> Option<Frame> {
        if received.len() < self.layer_states.len() {
            return None;
        }
        self.layer_states
            .iter()
            .zip(received)
            .map(|(state, layer)| state.incoming(layer))
            .collect::<Option<Vec<Layer>>>()
            .map(Frame::new)
    }

    fn expectation(&self, expected: &Frame, received: &Frame) -> Option<Frame> {
        let mut want = self.incoming(received)?;
        want.merge(expected).ok()?;
        Some(want)
    }

    /// Whether `received` satisfies both the layer states and `expected`.
    /// Layers that can't be merged simply don't match.
    pub fn matches(&self, expected: &Frame, received: &Frame) -> bool {
        self.expectation(expected, received)
            .is_some_and(|want| want.matches(received))
    }

    fn recv_frame(&mut self, timeout: Duration) -> Result<Option<Frame>> {
        if timeout.is_zero() {
            return Ok(None);
        }
        Ok(self.sniffer.recv(timeout)?.map(|bytes| Frame::parse(&bytes)))
    }

    /// Wait up to `timeout` for a frame matching `expected`.
    ///
    /// Unrelated frames are skipped and reported in the timeout error if no
    /// frame matches. The matched frame updates every layer state.
    pub fn expect_frame(&mut self, expected: &Frame, timeout: Duration) -> Result<Frame> {
        self.ensure_open()?;
        let deadline = Instant::now() + timeout;
        let mut mismatches = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(received) = self.recv_frame(remaining)? else {
                return Err(Error::Timeout {
                    expected: expected.to_string(),
                    waited: timeout,
                    mismatches,
                });
            };

            match self.expectation(expected, &received) {
                Some(want) if want.matches(&received) => {
                    for (index, state) in self.layer_states.iter_mut().enumerate() {
                        state.received(&received, index)?;
                    }
                    debug!("Matched {}", received);
                    return Ok(received);
                }
                want => {
                    let diff = received.diff(want.as_ref().unwrap_or(expected));
                    debug!("Ignoring {}", diff);
                    mismatches.push(diff);
                }
            }
        }
    }

    /// Wait for a frame whose innermost layer matches `layer`, followed by
    /// `additional`; the outer layers only need to satisfy the states.
    pub fn expect_layers(&mut self, layer: Layer, additional: Vec<Layer>, timeout: Duration) -> Result<Frame> {
        let mut expected: Frame = self
            .layer_states
            .iter()
            .map(|state| state.outgoing().wildcard())
            .collect();
        match expected.last_mut() {
            Some(innermost) => *innermost = layer,
            None => expected.push(layer),
        }
        for extra in additional {
            expected.push(extra);
        }
        self.expect_frame(&expected, timeout)
    }

    /// Wait for a frame whose innermost layer matches `layer` and return
    /// that layer as captured.
    pub fn expect(&mut self, layer: Layer, timeout: Duration) -> Result<Layer> {
        let frame = self.expect_layers(layer, Vec::new(), timeout)?;
        let innermost = self.layer_states.len().saturating_sub(1);
        frame
            .get(innermost)
            .cloned()
            .ok_or_else(|| Error::PacketParsing(format!("{} has no layer {}", frame, innermost)))
    }

    /// Discard every frame captured so far
    pub fn drain(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.sniffer.drain()
    }

    /// Close the injector, the sniffer and every layer state.
    ///
    /// Every resource is closed even if an earlier one fails; the failures
    /// are reported together.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.closed = true;

        let mut failures = Vec::new();
        if let Err(e) = self.injector.close() {
            failures.push(format!("injector: {}", e));
        }
        if let Err(e) = self.sniffer.close() {
            failures.push(format!("sniffer: {}", e));
        }
        for state in &mut self.layer_states {
            if let Err(e) = state.close() {
                failures.push(format!("{} state: {}", state.name(), e));
            }
        }

        if failures.is_empty() {
            info!("Connection closed");
            Ok(())
        } else {
            Err(Error::Close(failures))
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Connection dropped without being closed");
            if let Err(e) = self.close() {
                warn!("Failed to close connection: {}", e);
            }
        }
    }
}

/// Open an injector and a sniffer on the test device, the sniffer narrowed
/// to frames from the remote peer.
pub fn raw_link(endpoints: &Endpoints) -> Result<(Box<dyn Injector>, Box<dyn Sniffer>)> {
    let injector = DatalinkInjector::new(&endpoints.device)?;
    let config = SnifferConfig {
        filter: Some(peer_filter(endpoints.remote_mac, endpoints.local_mac)),
        ..Default::default()
    };
    let sniffer = PcapSniffer::with_config(&endpoints.device, config)?;
    Ok((Box::new(injector), Box::new(sniffer)))
}

#[cfg(test)]
mod tests;
