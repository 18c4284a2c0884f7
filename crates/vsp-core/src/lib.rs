//! VSP Core - Fundamental types shared by every layer
//!
//! This crate defines:
//! - The error taxonomy (transport, protocol, hierarchy, session)
//! - Identifiers (BreakpointId)
//! - Simulated time (SimTime)

pub mod error;
pub mod id;
pub mod time;

pub use error::*;
pub use id::*;
pub use time::*;
