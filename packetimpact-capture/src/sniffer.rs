//! Inbound frame capture with libpcap

use crate::interface::get_interface;
use packetimpact_core::{Error, Result, Sniffer};
use pcap::{Active, Capture, Device, Direction};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Default snapshot length (maximum bytes per packet)
const DEFAULT_SNAPLEN: i32 = 65535;

/// Default pcap read timeout (milliseconds)
const DEFAULT_POLL_TIMEOUT_MS: i32 = 10;

/// Default longest a drain may keep reading (milliseconds)
const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 100;

/// Configuration for a sniffer
#[derive(Debug, Clone)]
pub struct SnifferConfig {
    /// Maximum bytes to capture per packet
    pub snaplen: i32,
    /// Longest a single pcap read may block, in milliseconds
    pub poll_timeout_ms: i32,
    /// Longest a drain may keep discarding frames, in milliseconds
    pub drain_timeout_ms: u64,
    /// Enable promiscuous mode
    pub promiscuous: bool,
    /// Buffer size (0 = default)
    pub buffer_size: i32,
    /// Enable immediate mode (deliver packets immediately)
    pub immediate_mode: bool,
    /// Optional BPF filter, see [`crate::filters`]
    pub filter: Option<String>,
}

impl Default for SnifferConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
            promiscuous: true,
            buffer_size: 0,
            immediate_mode: true,
            filter: None,
        }
    }
}

/// Captures frames arriving on one interface
pub struct PcapSniffer {
    interface: String,
    capture: Option<Capture<Active>>,
    drain_timeout: Duration,
}

impl PcapSniffer {
    /// Open a sniffer on `interface` with the default configuration
    pub fn new(interface: &str) -> Result<Self> {
        Self::with_config(interface, SnifferConfig::default())
    }

    /// Open a sniffer on `interface` with a custom configuration
    pub fn with_config(interface: &str, config: SnifferConfig) -> Result<Self> {
        let interface_info = get_interface(interface)?;
        if !interface_info.is_up {
            return Err(Error::Capture(format!(
                "Interface '{}' is not up",
                interface
            )));
        }

        debug!("Initializing pcap capture on {}", interface);
        let device = Device::from(interface);
        let mut capture = Capture::from_device(device)
            .map_err(|e| Error::Capture(format!("Failed to create capture: {}", e)))?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.poll_timeout_ms)
            .immediate_mode(config.immediate_mode);

        if config.buffer_size > 0 {
            capture = capture.buffer_size(config.buffer_size);
        }

        let mut capture = capture
            .open()
            .map_err(|e| Error::Capture(format!("Failed to open capture: {}", e)))?;

        // Frames we inject ourselves must not be captured
        capture
            .direction(Direction::In)
            .map_err(|e| Error::Capture(format!("Failed to set capture direction: {}", e)))?;

        if let Some(filter) = config.filter.as_ref() {
            capture
                .filter(filter, true)
                .map_err(|e| Error::Capture(format!("Failed to apply filter: {}", e)))?;
            debug!("Applied filter: {}", filter);
        }

        info!("Opened sniffer on interface: {}", interface);
        Ok(Self {
            interface: interface.to_string(),
            capture: Some(capture),
            drain_timeout: Duration::from_millis(config.drain_timeout_ms),
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn capture(&mut self) -> Result<&mut Capture<Active>> {
        let interface = &self.interface;
        self.capture
            .as_mut()
            .ok_or_else(|| Error::Capture(format!("sniffer on {} is closed", interface)))
    }
}

impl Sniffer for PcapSniffer {
    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let deadline = Instant::now() + timeout;
        let capture = self.capture()?;

        loop {
            if Instant::now() >= deadline {
                return Ok(None);
            }
            match capture.next_packet() {
                Ok(packet) => {
                    trace!("Captured {} bytes", packet.data.len());
                    return Ok(Some(packet.data.to_vec()));
                }
                Err(pcap::Error::TimeoutExpired) => {
                    // Timeout is normal, poll again until the deadline
                    continue;
                }
                Err(e) => return Err(Error::Capture(format!("Packet capture error: {}", e))),
            }
        }
    }

    fn drain(&mut self) -> Result<()> {
        let budget = self.drain_timeout;
        let capture = self.capture()?;
        let drained = drain_within(budget, || capture.next_packet().map(|_| ()))?;

        debug!("Drained {} frames on {}", drained, self.interface);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.capture.take().is_some() {
            info!("Closed sniffer on interface: {}", self.interface);
        }
        Ok(())
    }
}

/// Discard frames from `next` until a read times out or `budget` runs out,
/// whichever comes first. Returns the number of frames discarded.
fn drain_within<F>(budget: Duration, mut next: F) -> Result<usize>
where
    F: FnMut() -> std::result::Result<(), pcap::Error>,
{
    let deadline = Instant::now() + budget;
    let mut drained = 0usize;

    while Instant::now() < deadline {
        match next() {
            Ok(()) => drained += 1,
            Err(pcap::Error::TimeoutExpired) => break,
            Err(e) => return Err(Error::Capture(format!("Packet capture error: {}", e))),
        }
    }
    if Instant::now() >= deadline {
        debug!("Drain stopped after {:?} with traffic still arriving", budget);
    }
    Ok(drained)
}

impl Drop for PcapSniffer {
    fn drop(&mut self) {
        if self.capture.is_some() {
            warn!("Sniffer on {} dropped without being closed", self.interface);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters;
    use packetimpact_packet::MacAddress;

    #[test]
    fn test_sniffer_config_default() {
        let config = SnifferConfig::default();
        assert_eq!(config.snaplen, DEFAULT_SNAPLEN);
        assert_eq!(config.poll_timeout_ms, DEFAULT_POLL_TIMEOUT_MS);
        assert_eq!(config.drain_timeout_ms, DEFAULT_DRAIN_TIMEOUT_MS);
        assert!(config.promiscuous);
        assert!(config.immediate_mode);
        assert!(config.filter.is_none());
    }

    #[test]
    fn test_sniffer_on_missing_interface() {
        assert!(matches!(
            PcapSniffer::new("nonexistent_interface_xyz"),
            Err(Error::InterfaceNotFound(_))
        ));
    }

    #[test]
    fn test_sniffer_lifecycle() {
        let config = SnifferConfig {
            filter: Some(filters::peer_filter(
                MacAddress::new([0x02, 0, 0, 0, 0, 2]),
                MacAddress::new([0x02, 0, 0, 0, 0, 1]),
            )),
            ..Default::default()
        };

        // This might fail if not running with permissions
        match PcapSniffer::with_config("lo", config) {
            Ok(mut sniffer) => {
                assert_eq!(sniffer.interface(), "lo");
                sniffer.drain().unwrap();
                assert_eq!(sniffer.recv(Duration::ZERO).unwrap(), None);

                sniffer.close().unwrap();
                assert!(sniffer.recv(Duration::from_millis(1)).is_err());
            }
            Err(e) => {
                println!("Could not create sniffer (may need privileges): {}", e);
            }
        }
    }

    #[test]
    fn test_drain_stops_at_first_read_timeout() {
        let mut queued = 3;
        let drained = drain_within(Duration::from_secs(5), || {
            if queued == 0 {
                return Err(pcap::Error::TimeoutExpired);
            }
            queued -= 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(drained, 3);
    }

    #[test]
    fn test_drain_is_bounded_under_continuous_traffic() {
        let start = Instant::now();
        let drained = drain_within(Duration::from_millis(20), || Ok(())).unwrap();
        assert!(drained > 0);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_drain_reports_capture_errors() {
        let err = drain_within(Duration::from_secs(5), || Err(pcap::Error::NoMorePackets)).unwrap_err();
        assert!(matches!(err, Error::Capture(_)));
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = SnifferConfig {
            filter: Some("invalid filter syntax !!!".to_string()),
            ..Default::default()
        };
        if let Err(e) = PcapSniffer::with_config("lo", config) {
            assert!(matches!(e, Error::Capture(_)));
        } else {
            panic!("Expected the filter to be rejected");
        }
    }
}
