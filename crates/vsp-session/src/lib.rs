//! VSP Session - Control plane and object model of a simulator connection
//!
//! This crate implements:
//! - Hierarchy: modules, attributes, commands and targets parsed from the
//!   peer's hierarchy document and resolved by dotted path
//! - Session: connect handshake, run/stop/step/stepi/interrupt, breakpoints
//! - Run monitor: background status polling while the simulation free-runs
//! - Shell dispatch: verb registry, aliases and scoped lookup for front ends

pub mod breakpoint;
pub mod config;
pub mod hierarchy;
pub mod logging;
pub mod monitor;
pub mod session;
pub mod shell;
pub mod status;

pub use breakpoint::*;
pub use config::*;
pub use hierarchy::*;
pub use monitor::*;
pub use session::*;
pub use shell::*;
pub use status::*;
