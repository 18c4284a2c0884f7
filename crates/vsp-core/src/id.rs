//! Identity types for VSP sessions
//!
//! Breakpoint identifiers are handed out by the simulator, never by the
//! client; the client only parses and echoes them.

use std::fmt;
use std::str::FromStr;

use crate::VspError;

/// Breakpoint identity - assigned by the peer, unique within a session
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BreakpointId(pub u64);

impl BreakpointId {
    #[inline]
    pub fn new(id: u64) -> Self {
        BreakpointId(id)
    }

    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for BreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Breakpoint({})", self.0)
    }
}

impl fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BreakpointId {
    type Err = VspError;

    /// Parses a decimal id, leading zeros allowed (`00000001`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VspError::InvalidBreakpointId(s.to_string()));
        }
        digits
            .parse::<u64>()
            .map(BreakpointId)
            .map_err(|_| VspError::InvalidBreakpointId(s.to_string()))
    }
}
