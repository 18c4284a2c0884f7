//! Simulated time
//!
//! The simulator reports its clock as an integer count of nanoseconds since
//! elaboration. It never runs backwards.

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;
use std::time::Duration;

use crate::VspError;

/// Simulated time in nanoseconds
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    #[inline]
    pub fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    #[inline]
    pub fn as_nanos(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// Wire spelling of a time span, e.g. `resume,1000ns`
    pub fn to_wire(self) -> String {
        format!("{}ns", self.0)
    }
}

impl Add for SimTime {
    type Output = SimTime;

    /// Saturates at `u64::MAX`
    #[inline]
    fn add(self, rhs: SimTime) -> Self::Output {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    /// Saturates at zero
    #[inline]
    fn sub(self, rhs: SimTime) -> Self::Output {
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

impl From<Duration> for SimTime {
    fn from(d: Duration) -> Self {
        SimTime(d.as_nanos().min(u64::MAX as u128) as u64)
    }
}

impl From<SimTime> for Duration {
    fn from(t: SimTime) -> Self {
        Duration::from_nanos(t.0)
    }
}

impl FromStr for SimTime {
    type Err = VspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(SimTime)
            .map_err(|_| VspError::Malformed(format!("invalid time value '{}'", s)))
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimTime({}ns)", self.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}s", self.as_secs_f64())
    }
}
