//! Session - control plane of one simulator connection
//!
//! States: disconnected, stopped and running. Foreground calls and the run
//! monitor share one `Link`, so their requests never interleave on the wire.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use vsp_core::{BreakpointId, SimTime, VspError, VspResult};
use vsp_transport::{Connection, Link, SIGNAL_INTERRUPT};
use vsp_wire::compose;

use crate::breakpoint::{parse_breakpoint_id, Breakpoint};
use crate::config::SessionConfig;
use crate::hierarchy::{Attribute, Command, Hierarchy, Module, PathSegments, Target};
use crate::monitor::RunMonitor;
use crate::status::{
    parse_quantum, query_status, ControlState, Status, Version, CMD_QUANTUM, CMD_VERSION,
};

const CMD_STOP: &str = "stop";
const CMD_RESUME: &str = "resume";
const CMD_STEP: &str = "step";
const CMD_LIST: &str = "list";
const LIST_XML: &str = "xml";
const CMD_MKBP: &str = "mkbp";
const CMD_RMBP: &str = "rmbp";
const CMD_QUIT: &str = "quit";

/// Attached simulator session
pub struct Session {
    config: SessionConfig,
    link: Link,
    peer: String,
    state: Arc<Mutex<ControlState>>,
    hierarchy: Hierarchy,
    breakpoints: BTreeMap<BreakpointId, Breakpoint>,
    monitor: Option<RunMonitor>,
    closed: bool,
}

impl Session {
    /// Attach with default settings
    pub async fn connect(address: &str) -> VspResult<Self> {
        Self::connect_with(address, SessionConfig::default()).await
    }

    /// Attach to `address` and halt the simulation.
    ///
    /// The peer is stopped first so every session starts from a known state,
    /// then version, quantum, status and hierarchy are fetched. Any failure
    /// here aborts construction.
    pub async fn connect_with(address: &str, config: SessionConfig) -> VspResult<Self> {
        let conn = Connection::open(address, config.transport.clone()).await?;
        let peer = conn.peer();
        let link = Link::new(conn);

        link.command(CMD_STOP).await?;
        let version = Version::parse(&link.command(CMD_VERSION).await?)?;
        let quantum = parse_quantum(&link.command(CMD_QUANTUM).await?)?;
        let status = query_status(&link).await?;

        let list = compose(&[CMD_LIST, LIST_XML]);
        let hierarchy = match link.command(&list).await?.as_slice() {
            [document] => Hierarchy::parse(document, &link)?,
            other => {
                return Err(VspError::UnexpectedResponse {
                    command: list,
                    response: other.to_vec(),
                })
            }
        };

        let mut state = ControlState {
            version,
            quantum,
            ..ControlState::default()
        };
        state.apply(&status);

        info!(
            %peer,
            engine = %state.version.engine,
            protocol = %state.version.protocol,
            quantum = %state.quantum,
            modules = hierarchy.modules().len(),
            targets = hierarchy.targets().len(),
            "connected"
        );

        Ok(Session {
            config,
            link,
            peer,
            state: Arc::new(Mutex::new(state)),
            hierarchy,
            breakpoints: BTreeMap::new(),
            monitor: None,
            closed: false,
        })
    }

    /// Tear down this session and attach anew, keeping the configuration
    pub async fn reconnect(&mut self, address: &str) -> VspResult<()> {
        self.disconnect().await;
        *self = Self::connect_with(address, self.config.clone()).await?;
        Ok(())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// `host:port` of the simulator
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn engine_version(&self) -> String {
        self.state.lock().version.engine.clone()
    }

    pub fn protocol_version(&self) -> String {
        self.state.lock().version.protocol.clone()
    }

    /// Simulated time advanced by one `step()`
    pub fn quantum(&self) -> SimTime {
        self.state.lock().quantum
    }

    /// Last observed state, no I/O
    pub fn snapshot(&self) -> ControlState {
        self.state.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        !self.closed
    }

    fn ensure_open(&self) -> VspResult<()> {
        if self.closed {
            return Err(VspError::Disconnected("session".to_string()));
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Send a resume-type request; the peer only counts as running once it
    /// has accepted it
    async fn resume(&self, request: &str) -> VspResult<()> {
        self.link.command(request).await?;
        self.state.lock().running = true;
        Ok(())
    }

    /// A failed poll leaves the peer's run state unknown. Clear the local
    /// flag so the next `run()` or `step()` resumes instead of trusting it.
    fn settle<T>(&self, result: VspResult<T>) -> VspResult<T> {
        if let Err(e) = &result {
            warn!(error = %e, "lost track of run state");
            self.state.lock().running = false;
        }
        result
    }

    async fn refresh(&self) -> VspResult<Status> {
        self.ensure_open()?;
        let status = query_status(&self.link).await?;
        self.state.lock().apply(&status);
        Ok(status)
    }

    // Status queries always go to the peer: it may have stopped on its own

    pub async fn running(&self) -> VspResult<bool> {
        Ok(self.refresh().await?.running)
    }

    pub async fn time(&self) -> VspResult<SimTime> {
        Ok(self.refresh().await?.time)
    }

    pub async fn cycle(&self) -> VspResult<u64> {
        Ok(self.refresh().await?.cycle)
    }

    /// Why the simulation last stopped
    pub async fn reason(&self) -> VspResult<String> {
        Ok(self.refresh().await?.reason)
    }

    /// Advance by one quantum and wait until the peer stops again
    pub async fn step(&mut self) -> VspResult<()> {
        self.ensure_open()?;
        if !self.is_running() {
            let quantum = self.state.lock().quantum;
            debug!(%quantum, "step");
            self.resume(&compose(&[CMD_RESUME, quantum.to_wire().as_str()]))
                .await?;
        }
        self.poll_until_stopped().await
    }

    /// Execute a single instruction on `target`
    pub async fn stepi(&mut self, target: &str) -> VspResult<()> {
        self.ensure_open()?;
        let target = self
            .hierarchy
            .find_target(target)
            .ok_or_else(|| VspError::NoSuchTarget(target.to_string()))?
            .name()
            .to_string();

        if !self.is_running() {
            debug!(%target, "stepi");
            self.resume(&compose(&[CMD_STEP, target.as_str()])).await?;
        }
        self.poll_until_stopped().await
    }

    async fn poll_until_stopped(&mut self) -> VspResult<()> {
        loop {
            let status = self.refresh().await;
            if !self.settle(status)?.running {
                break;
            }
        }
        if let Some(monitor) = self.monitor.take() {
            self.settle(monitor.join().await)?;
        }
        Ok(())
    }

    /// Resume free-running execution and return immediately
    pub async fn run(&mut self) -> VspResult<()> {
        self.ensure_open()?;
        if let Some(monitor) = self.monitor.take() {
            if monitor.is_finished() {
                self.settle(monitor.join().await)?;
            } else {
                self.monitor = Some(monitor);
            }
        }
        if self.is_running() {
            return Ok(());
        }

        self.resume(CMD_RESUME).await?;
        self.monitor = Some(RunMonitor::spawn(
            self.link.clone(),
            Arc::clone(&self.state),
            self.config.poll_interval,
        ));
        info!(peer = %self.peer, "simulation running");
        Ok(())
    }

    /// Halt the simulation; returns once the run monitor has exited
    pub async fn stop(&mut self) -> VspResult<()> {
        self.ensure_open()?;
        if !self.is_running() {
            if let Some(monitor) = self.monitor.take() {
                self.settle(monitor.join().await)?;
            }
            return Ok(());
        }

        self.link.command(CMD_STOP).await?;
        match self.monitor.take() {
            Some(monitor) => self.settle(monitor.cancel().await)?,
            None => {
                self.refresh().await?;
            }
        }
        info!(peer = %self.peer, time = %self.state.lock().time, "simulation stopped");
        Ok(())
    }

    /// Break into a free-running simulation with the out-of-band interrupt.
    ///
    /// The peer answers with a framed status snapshot, read under the same
    /// link lock as the interrupt byte.
    pub async fn interrupt(&mut self) -> VspResult<()> {
        self.ensure_open()?;
        if !self.is_running() {
            return Ok(());
        }

        let reply = self.link.signal_with_reply(SIGNAL_INTERRUPT).await?;
        let status = Status::parse(&reply)?;
        self.state.lock().apply(&status);
        if let Some(monitor) = self.monitor.take() {
            self.settle(monitor.cancel().await)?;
        }
        info!(reason = %self.state.lock().reason, "simulation interrupted");
        Ok(())
    }

    /// Wait for a free run to stop on its own, e.g. at a breakpoint
    pub async fn wait_stopped(&mut self) -> VspResult<()> {
        self.ensure_open()?;
        match self.monitor.take() {
            Some(monitor) => self.settle(monitor.join().await),
            None => Ok(()),
        }
    }

    /// Terminate the simulator and drop the session
    pub async fn kill(mut self) -> VspResult<()> {
        self.ensure_open()?;
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
        info!(peer = %self.peer, "terminating simulation");
        let result = self.link.post(CMD_QUIT).await;
        self.disconnect().await;
        result
    }

    /// Set a breakpoint; the peer assigns the id
    pub async fn create_breakpoint(&mut self, target: &str, address: &str) -> VspResult<BreakpointId> {
        self.ensure_open()?;
        let reply = self
            .link
            .command(&compose(&[CMD_MKBP, target, address]))
            .await?;
        let id = parse_breakpoint_id(&reply)?;
        if self.breakpoints.contains_key(&id) {
            warn!(%id, "peer reused breakpoint id");
        }
        self.breakpoints.insert(
            id,
            Breakpoint {
                id,
                target: target.to_string(),
                address: address.to_string(),
            },
        );
        debug!(%id, %target, %address, "breakpoint created");
        Ok(id)
    }

    /// Remove a breakpoint; unknown ids are left to the peer to reject
    pub async fn delete_breakpoint(&mut self, id: BreakpointId) -> VspResult<()> {
        self.ensure_open()?;
        self.link
            .command(&compose(&[CMD_RMBP, id.to_string().as_str()]))
            .await?;
        self.breakpoints.remove(&id);
        debug!(%id, "breakpoint deleted");
        Ok(())
    }

    /// Breakpoints created through this session, by id
    pub fn breakpoints(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values()
    }

    /// Detach without stopping the simulator; idempotent
    pub async fn disconnect(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
        self.hierarchy.disconnect();
        self.link.disconnect().await;
        info!(peer = %self.peer, "disconnected");
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn modules(&self) -> &[Arc<Module>] {
        self.hierarchy.modules()
    }

    pub fn targets(&self) -> &[Target] {
        self.hierarchy.targets()
    }

    pub fn find_module<P: PathSegments + ?Sized>(&self, path: &P) -> Option<Arc<Module>> {
        self.hierarchy.find_module(path)
    }

    pub fn find_attribute<P: PathSegments + ?Sized>(&self, path: &P) -> Option<Arc<Attribute>> {
        self.hierarchy.find_attribute(path)
    }

    pub fn find_command<P: PathSegments + ?Sized>(&self, path: &P) -> Option<Arc<Command>> {
        self.hierarchy.find_command(path)
    }

    pub fn find_target(&self, name: &str) -> Option<&Target> {
        self.hierarchy.find_target(name)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
        self.hierarchy.disconnect();
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.peer)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("state", &*self.state.lock())
            .field("breakpoints", &self.breakpoints.len())
            .field("closed", &self.closed)
            .finish()
    }
}
