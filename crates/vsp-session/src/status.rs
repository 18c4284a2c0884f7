//! Control-plane state and status replies
//!
//! The peer reports execution status as three fields:
//! `running` or `stopped:<reason>`, simulated time in nanoseconds and the
//! delta cycle count.

use tracing::warn;

use vsp_core::{SimTime, VspError, VspResult};
use vsp_transport::Link;

pub const CMD_STATUS: &str = "status";
pub const CMD_VERSION: &str = "version";
pub const CMD_QUANTUM: &str = "getq";

const RUNNING: &str = "running";
const STOPPED_PREFIX: &str = "stopped:";

fn unexpected(command: &str, response: &[String]) -> VspError {
    VspError::UnexpectedResponse {
        command: command.to_string(),
        response: response.to_vec(),
    }
}

/// One status reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub running: bool,
    /// Empty while running
    pub reason: String,
    pub time: SimTime,
    pub cycle: u64,
}

impl Status {
    pub fn parse(fields: &[String]) -> VspResult<Self> {
        let [state, time, cycle] = fields else {
            return Err(unexpected(CMD_STATUS, fields));
        };

        let (running, reason) = if state == RUNNING {
            (true, String::new())
        } else if let Some(reason) = state.strip_prefix(STOPPED_PREFIX) {
            (false, reason.to_string())
        } else {
            return Err(unexpected(CMD_STATUS, fields));
        };

        let time = time.parse::<SimTime>().map_err(|_| unexpected(CMD_STATUS, fields))?;
        let cycle = cycle
            .trim()
            .parse::<u64>()
            .map_err(|_| unexpected(CMD_STATUS, fields))?;

        Ok(Status {
            running,
            reason,
            time,
            cycle,
        })
    }
}

/// Engine and protocol versions reported by the peer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Version {
    pub engine: String,
    pub protocol: String,
}

impl Version {
    pub fn parse(fields: &[String]) -> VspResult<Self> {
        match fields {
            [engine, protocol] => Ok(Version {
                engine: engine.clone(),
                protocol: protocol.clone(),
            }),
            _ => Err(unexpected(CMD_VERSION, fields)),
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version {
            engine: "unknown".to_string(),
            protocol: "unknown".to_string(),
        }
    }
}

/// Execution quantum from a `getq` reply
pub fn parse_quantum(fields: &[String]) -> VspResult<SimTime> {
    match fields {
        [q] => q.parse::<SimTime>().map_err(|_| unexpected(CMD_QUANTUM, fields)),
        _ => Err(unexpected(CMD_QUANTUM, fields)),
    }
}

/// Last observed control-plane state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlState {
    pub version: Version,
    pub quantum: SimTime,
    pub running: bool,
    pub reason: String,
    pub time: SimTime,
    pub cycle: u64,
}

impl ControlState {
    /// Fold a status reply into the state
    pub fn apply(&mut self, status: &Status) {
        if status.time < self.time {
            warn!(
                previous = %self.time,
                reported = %status.time,
                "simulation time went backwards"
            );
        }
        self.running = status.running;
        self.reason = status.reason.clone();
        self.time = status.time;
        self.cycle = status.cycle;
    }
}

/// Issue one `status` request
pub async fn query_status(link: &Link) -> VspResult<Status> {
    let fields = link.command(CMD_STATUS).await?;
    Status::parse(&fields)
}
