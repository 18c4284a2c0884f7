//! VSP Test Harness - Mock simulator and end-to-end scenarios
//!
//! This crate provides:
//! - A scripted simulator peer speaking the wire protocol over loopback TCP
//! - Counted fault injection (NAKed commands, corrupted replies)
//! - End-to-end session scenarios: stepping, breakpoints, attribute reads,
//!   free runs, interrupts and teardown

pub mod faults;
pub mod integration;
pub mod simulator;

pub use faults::*;
pub use integration::*;
pub use simulator::*;
