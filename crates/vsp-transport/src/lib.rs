//! VSP Transport Layer - TCP connection to a running simulation
//!
//! This crate provides:
//! - `host:port` address parsing and candidate iteration
//! - Acknowledged send / checksummed receive with bounded retries
//! - Out-of-band single-byte signals
//! - A single-flight [`Link`] shared by the session and its monitor

pub mod address;
pub mod channel;
pub mod config;
pub mod connection;
pub mod link;

pub use address::*;
pub use channel::*;
pub use config::*;
pub use connection::*;
pub use link::*;
