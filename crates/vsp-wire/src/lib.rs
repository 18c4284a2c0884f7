//! VSP Wire Protocol - Checksummed text packets
//!
//! This crate implements the wire format spoken with the simulator:
//! - Control-byte escaping
//! - `$payload#cc` framing with a mod-256 checksum
//! - A byte-fed decoder for the receive path
//! - Comma-delimited response fields with backslash escapes

pub mod escape;
pub mod fields;
pub mod frame;

pub use escape::*;
pub use fields::*;
pub use frame::*;
