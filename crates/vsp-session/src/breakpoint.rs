//! Breakpoints
//!
//! A successful `mkbp` reply carries the new id at a fixed offset of its
//! first field, e.g. `breakpoint-id:00000001`.

use std::fmt;

use vsp_core::{BreakpointId, VspError, VspResult};

/// Characters preceding the id in a `mkbp` reply
pub const BREAKPOINT_ID_OFFSET: usize = "breakpoint-id:".len();

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Breakpoint {
    pub id: BreakpointId,
    pub target: String,
    pub address: String,
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} @ {}", self.id, self.target, self.address)
    }
}

/// Extract the peer-assigned id from a `mkbp` reply
pub fn parse_breakpoint_id(fields: &[String]) -> VspResult<BreakpointId> {
    let first = fields
        .first()
        .ok_or_else(|| VspError::InvalidBreakpointId(String::new()))?;
    first
        .get(BREAKPOINT_ID_OFFSET..)
        .ok_or_else(|| VspError::InvalidBreakpointId(first.clone()))?
        .parse()
        .map_err(|_| VspError::InvalidBreakpointId(first.clone()))
}
