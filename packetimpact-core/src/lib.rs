//! packetimpact core library
//!
//! This crate provides the error type shared by every packetimpact crate and
//! the traits describing the link-layer collaborators a testbench connection
//! drives: an [`Injector`] that puts raw frames on the wire and a [`Sniffer`]
//! that hands back captured frames.

pub mod error;
pub mod link;

// Re-export commonly used types
pub use error::{Error, Result};
pub use link::{Injector, Sniffer};
