//! Error types for packetimpact

use std::time::Duration;
use thiserror::Error;

/// Result type alias for packetimpact operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for packetimpact
#[derive(Error, Debug)]
pub enum Error {
    /// Network I/O error
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Testbench setup failed (device discovery, address parsing, port allocation)
    #[error("Setup error: {0}")]
    Setup(String),

    /// Interface not found
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Interface error
    #[error("Interface error: {0}")]
    Interface(String),

    /// Capture error
    #[error("Packet capture error: {0}")]
    Capture(String),

    /// Two layers of different protocols were merged
    #[error("can't merge {other} into {base}")]
    LayerMismatch { base: String, other: String },

    /// No captured frame matched an expectation before the deadline
    #[error(
        "got no frames matching {expected} during {waited:?}{}",
        render_mismatches(.mismatches)
    )]
    Timeout {
        expected: String,
        waited: Duration,
        mismatches: Vec<String>,
    },

    /// Packet construction error
    #[error("Packet construction error: {0}")]
    PacketConstruction(String),

    /// Packet parsing error
    #[error("Packet parsing error: {0}")]
    PacketParsing(String),

    /// A layer state was updated with a layer it does not track
    #[error("Layer state error: {0}")]
    State(String),

    /// The connection was already closed
    #[error("connection is closed")]
    ConnectionClosed,

    /// One or more resources failed to close
    #[error("unable to close: {}", .0.join("; "))]
    Close(Vec<String>),
}

impl Error {
    /// Create a setup error with a custom message
    pub fn setup<S: Into<String>>(msg: S) -> Self {
        Error::Setup(msg.into())
    }

    /// Create a packet construction error with a custom message
    pub fn construction<S: Into<String>>(msg: S) -> Self {
        Error::PacketConstruction(msg.into())
    }

    /// Create a layer mismatch error from the two layer descriptions
    pub fn layer_mismatch(base: impl ToString, other: impl ToString) -> Self {
        Error::LayerMismatch {
            base: base.to_string(),
            other: other.to_string(),
        }
    }

    /// Returns true if this is a timeout waiting for a frame
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

fn render_mismatches(mismatches: &[String]) -> String {
    if mismatches.is_empty() {
        return String::new();
    }
    let mut out = String::from(": got");
    for mismatch in mismatches {
        out.push_str("\n\t");
        out.push_str(&mismatch.replace('\n', "\n\t"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_without_mismatches() {
        let err = Error::Timeout {
            expected: "[TCP{flags: SYN}]".to_string(),
            waited: Duration::from_secs(1),
            mismatches: Vec::new(),
        };
        assert_eq!(
            err.to_string(),
            "got no frames matching [TCP{flags: SYN}] during 1s"
        );
        assert!(err.is_timeout());
    }

    #[test]
    fn test_timeout_lists_every_mismatch() {
        let err = Error::Timeout {
            expected: "[UDP{}]".to_string(),
            waited: Duration::from_millis(500),
            mismatches: vec!["first".to_string(), "second\nline".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains(": got\n\tfirst"));
        assert!(msg.contains("\n\tsecond\n\tline"));
    }

    #[test]
    fn test_close_joins_causes() {
        let err = Error::Close(vec!["sniffer".into(), "port".into()]);
        assert_eq!(err.to_string(), "unable to close: sniffer; port");
    }

    #[test]
    fn test_layer_mismatch_message() {
        let err = Error::layer_mismatch("TCP{}", "UDP{}");
        assert_eq!(err.to_string(), "can't merge UDP{} into TCP{}");
        assert!(!err.is_timeout());
    }
}
