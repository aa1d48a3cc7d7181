//! Frames: ordered stacks of layers, outermost first
//!
//! Context-dependent fields (lengths, checksums, next-protocol numbers) are
//! resolved from the frame the layer sits in, addressed by index, so a layer
//! never holds references to its neighbours.

use crate::ethernet::{EtherType, Ether};
use crate::ip::{IpProtocol, Ipv4};
use crate::ipv6::Ipv6;
use crate::layer::Layer;
use crate::payload::Payload;
use crate::tcp::Tcp;
use crate::udp::Udp;
use bytes::{BufMut, BytesMut};
use packetimpact_core::Result;
use std::fmt;
use std::ops::Index;
use tracing::trace;

/// An ordered sequence of layers making up one link-layer packet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    layers: Vec<Layer>,
}

impl Frame {
    pub fn new(layers: Vec<Layer>) -> Self {
        Frame { layers }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn last(&self) -> Option<&Layer> {
        self.layers.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut Layer> {
        self.layers.last_mut()
    }

    pub fn push(&mut self, layer: impl Into<Layer>) {
        self.layers.push(layer.into());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Layer> {
        self.layers.iter()
    }

    pub fn into_layers(self) -> Vec<Layer> {
        self.layers
    }

    /// Total length of every layer nested inside the layer at `index`
    pub fn nested_length(&self, index: usize) -> usize {
        self.layers.iter().skip(index + 1).map(Layer::length).sum()
    }

    /// Serialize every layer to wire bytes.
    ///
    /// Layers are serialized innermost first so that each header can account
    /// for the bytes it encapsulates.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes: Vec<u8> = Vec::new();
        for (index, layer) in self.layers.iter().enumerate().rev() {
            let header = layer.header_bytes(self, index, &bytes)?;
            let mut buffer = BytesMut::with_capacity(header.len() + bytes.len());
            buffer.put_slice(&header);
            buffer.put_slice(&bytes);
            bytes = buffer.to_vec();
        }
        trace!("serialized {} layers into {} bytes", self.layers.len(), bytes.len());
        Ok(bytes)
    }

    /// Parse a captured link-layer frame, starting with Ethernet.
    ///
    /// Parsing never fails: once a header can't be parsed the remaining
    /// bytes are kept as a trailing payload layer.
    pub fn parse(data: &[u8]) -> Frame {
        let mut layers = Vec::new();
        let mut parser = Parser::Ether;
        let mut rest = data;

        loop {
            match parser.parse(rest) {
                Some((layer, inner)) => {
                    let next = Parser::after(&layer);
                    layers.push(layer);
                    rest = inner;
                    match next {
                        Some(next) if !rest.is_empty() || next != Parser::Payload => parser = next,
                        _ => break,
                    }
                }
                None => {
                    if !rest.is_empty() {
                        layers.push(Layer::Payload(Payload::new(rest)));
                    }
                    break;
                }
            }
        }

        Frame { layers }
    }

    /// Merge `other` into `self` layer by layer; layers beyond the end of
    /// `self` are appended.
    pub fn merge(&mut self, other: &Frame) -> Result<()> {
        for (index, layer) in other.layers.iter().enumerate() {
            match self.layers.get_mut(index) {
                Some(base) => base.merge(layer)?,
                None => self.layers.push(layer.clone()),
            }
        }
        Ok(())
    }

    /// Whether `actual` satisfies every layer of this expectation.
    ///
    /// `actual` may carry extra trailing layers but never fewer.
    pub fn matches(&self, actual: &Frame) -> bool {
        if actual.layers.len() < self.layers.len() {
            return false;
        }
        self.layers
            .iter()
            .zip(&actual.layers)
            .all(|(want, got)| want.matches(got))
    }

    /// Describe how `self`, a captured frame, differs from `want`
    pub fn diff(&self, want: &Frame) -> String {
        let mut lines = Vec::new();
        for (index, wanted) in want.layers.iter().enumerate() {
            match self.layers.get(index) {
                None => lines.push(format!("missing layer {}: want {}", index, wanted)),
                Some(got) => match got.diff(wanted) {
                    None => lines.push(format!("layer {}: got {}, want {}", index, got, wanted)),
                    Some(diffs) if diffs.is_empty() => {}
                    Some(diffs) => {
                        lines.push(format!("layer {} ({}):", index, got.name()));
                        lines.extend(diffs.iter().map(|diff| format!("  {}", diff)));
                    }
                },
            }
        }
        if lines.is_empty() {
            return format!("{} matches", self);
        }
        format!("{}\n{}", self, lines.join("\n"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parser {
    Ether,
    Ipv4,
    Ipv6,
    Tcp,
    Udp,
    Payload,
}

impl Parser {
    fn parse(self, data: &[u8]) -> Option<(Layer, &[u8])> {
        match self {
            Parser::Ether => Ether::parse(data).map(|(l, rest)| (Layer::Ether(l), rest)),
            Parser::Ipv4 => Ipv4::parse(data).map(|(l, rest)| (Layer::Ipv4(l), rest)),
            Parser::Ipv6 => Ipv6::parse(data).map(|(l, rest)| (Layer::Ipv6(l), rest)),
            Parser::Tcp => Tcp::parse(data).map(|(l, rest)| (Layer::Tcp(l), rest)),
            Parser::Udp => Udp::parse(data).map(|(l, rest)| (Layer::Udp(l), rest)),
            Parser::Payload => Some((Layer::Payload(Payload::new(data)), &data[data.len()..])),
        }
    }

    /// The parser for the bytes encapsulated by `layer`
    fn after(layer: &Layer) -> Option<Parser> {
        match layer {
            Layer::Ether(ether) => Some(match ether.ether_type {
                Some(EtherType::IPv4) => Parser::Ipv4,
                Some(EtherType::IPv6) => Parser::Ipv6,
                _ => Parser::Payload,
            }),
            // Only the first fragment carries the transport header
            Layer::Ipv4(ipv4) if ipv4.is_trailing_fragment() => Some(Parser::Payload),
            Layer::Ipv4(ipv4) => Some(Self::for_protocol(ipv4.protocol)),
            Layer::Ipv6(ipv6) => Some(Self::for_protocol(ipv6.next_header)),
            Layer::Tcp(_) | Layer::Udp(_) => Some(Parser::Payload),
            Layer::Payload(_) => None,
        }
    }

    fn for_protocol(protocol: Option<IpProtocol>) -> Parser {
        match protocol {
            Some(IpProtocol::TCP) => Parser::Tcp,
            Some(IpProtocol::UDP) => Parser::Udp,
            _ => Parser::Payload,
        }
    }
}

impl Index<usize> for Frame {
    type Output = Layer;

    fn index(&self, index: usize) -> &Layer {
        &self.layers[index]
    }
}

impl FromIterator<Layer> for Frame {
    fn from_iter<I: IntoIterator<Item = Layer>>(iter: I) -> Self {
        Frame {
            layers: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Layer>> for Frame {
    fn from(layers: Vec<Layer>) -> Self {
        Frame { layers }
    }
}

impl<'a> IntoIterator for &'a Frame {
    type Item = &'a Layer;
    type IntoIter = std::slice::Iter<'a, Layer>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layers: Vec<String> = self.layers.iter().map(Layer::to_string).collect();
        write!(f, "[{}]", layers.join(" / "))
    }
}
