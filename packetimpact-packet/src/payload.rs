//! Raw payload layer

/// Opaque bytes carried by the innermost layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    /// The payload bytes
    pub bytes: Option<Vec<u8>>,
}

layer_fields!(Payload { bytes });

impl Payload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Payload {
            bytes: Some(bytes.into()),
        }
    }

    /// Length of the payload, zero when unset
    pub fn len(&self) -> usize {
        self.bytes.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn header_bytes(&self) -> Vec<u8> {
        self.bytes.clone().unwrap_or_default()
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::new(text.as_bytes())
    }
}
