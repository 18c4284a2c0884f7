//! Scripted simulator peer
//!
//! Speaks the real wire protocol on a loopback socket and answers the
//! session's command vocabulary from a small in-memory model:
//! - A clock that advances while "running"
//! - A fixed hierarchy document with canned attribute values
//! - Breakpoints with peer-assigned ids
//! - Out-of-band interrupt handling
//!
//! Every received command is logged so tests can assert on what went over
//! the wire.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use vsp_transport::SIGNAL_INTERRUPT;
use vsp_wire::{compose, decompose, encode_packet, Decoded, PacketDecoder, ACK, NAK};

use crate::faults::{corrupt_frame, FaultConfig};

/// Hierarchy served by default
pub const DEFAULT_HIERARCHY: &str = r#"<hierarchy>
  <object name="top" kind="system" version="1.0">
    <object name="cpu0" kind="processor" version="2.1">
      <attribute name="pc" type="u64" count="1"/>
      <attribute name="regs" type="u32" count="3"/>
      <attribute name="trace" type="void" count="0"/>
      <attribute name="broken" type="u32" count="2"/>
      <attribute name="ghost" type="u32" count="1"/>
      <command name="reset" argc="0" desc="reset the core"/>
      <command name="echo" argc="1" desc="echo arguments back"/>
      <command name="info" argc="0" desc="print core information"/>
    </object>
    <object name="uart0" kind="uart" version="1.0">
      <attribute name="baud" type="u32" count="1"/>
    </object>
    <attribute name="clock" type="u64" count="1"/>
  </object>
  <target>cpu0</target>
</hierarchy>"#;

/// Stop reason reported after a bounded resume
pub const REASON_STEP: &str = "step";
/// Stop reason after a `stop` command
pub const REASON_USER: &str = "user";
pub const REASON_BREAKPOINT: &str = "breakpoint";
pub const REASON_INTERRUPT: &str = "interrupted";

const STATUS_ERROR: &str = "E";

/// How the mock peer behaves
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Fields of the `version` reply
    pub version: Vec<String>,
    /// Quantum in nanoseconds
    pub quantum: u64,
    /// Status polls answered with `running` after a bounded resume
    pub step_polls: u32,
    /// Polls after which a free run hits a breakpoint, if any are set
    pub breakpoint_after: Option<u32>,
    /// Payload of the `list,xml` reply
    pub hierarchy: String,
    /// Values returned by `geta`, by attribute path
    pub attributes: HashMap<String, Vec<String>>,
    pub faults: FaultConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        let attributes = [
            ("top.cpu0.pc", vec!["0x1000"]),
            ("top.cpu0.regs", vec!["1", "2", "3"]),
            ("top.cpu0.broken", vec!["7"]),
            ("top.uart0.baud", vec!["115200"]),
            ("top.clock", vec!["100000000"]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
        .collect();

        SimConfig {
            version: vec!["2.3.0".to_string(), "1.4".to_string()],
            quantum: 100,
            step_polls: 2,
            breakpoint_after: None,
            hierarchy: DEFAULT_HIERARCHY.to_string(),
            attributes,
            faults: FaultConfig::clean(),
        }
    }
}

impl SimConfig {
    pub fn with_faults(mut self, faults: FaultConfig) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_step_polls(mut self, polls: u32) -> Self {
        self.step_polls = polls;
        self
    }

    pub fn with_breakpoint_after(mut self, polls: u32) -> Self {
        self.breakpoint_after = Some(polls);
        self
    }

    pub fn with_hierarchy(mut self, xml: impl Into<String>) -> Self {
        self.hierarchy = xml.into();
        self
    }

    pub fn with_version(mut self, fields: &[&str]) -> Self {
        self.version = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunKind {
    /// Bounded by one quantum
    Step,
    /// One instruction
    Instruction,
    /// Until stopped
    Free,
}

#[derive(Debug)]
struct Run {
    kind: RunKind,
    /// Remaining polls that report `running`; `None` runs until stopped
    budget: Option<u32>,
    reason: &'static str,
}

/// In-memory model of the simulation behind the socket
#[derive(Debug)]
pub struct SimState {
    config: SimConfig,
    run: Option<Run>,
    reason: String,
    time: u64,
    cycle: u64,
    breakpoints: BTreeMap<u64, (String, String)>,
    next_breakpoint: u64,
    log: Vec<String>,
    running_replies: usize,
    interrupts: usize,
    connections: usize,
    killed: bool,
}

impl SimState {
    fn new(config: SimConfig) -> Self {
        SimState {
            config,
            run: None,
            reason: REASON_USER.to_string(),
            time: 0,
            cycle: 0,
            breakpoints: BTreeMap::new(),
            next_breakpoint: 1,
            log: Vec::new(),
            running_replies: 0,
            interrupts: 0,
            connections: 0,
            killed: false,
        }
    }

    pub fn running(&self) -> bool {
        self.run.is_some()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn breakpoints(&self) -> Vec<u64> {
        self.breakpoints.keys().copied().collect()
    }

    pub fn faults_mut(&mut self) -> &mut FaultConfig {
        &mut self.config.faults
    }

    fn ok<S: AsRef<str>>(fields: &[S]) -> String {
        let mut all = vec![vsp_wire::STATUS_OK.to_string()];
        all.extend(fields.iter().map(|f| f.as_ref().to_string()));
        compose(&all)
    }

    fn error(message: &str) -> String {
        compose(&[STATUS_ERROR, message])
    }

    fn status_reply(&self) -> String {
        let state = match self.run {
            Some(_) => "running".to_string(),
            None => format!("stopped:{}", self.reason),
        };
        Self::ok(&[state, self.time.to_string(), self.cycle.to_string()])
    }

    fn halt(&mut self, reason: &str) {
        self.run = None;
        self.reason = reason.to_string();
    }

    fn start(&mut self, kind: RunKind, budget: Option<u32>, reason: &'static str) {
        self.run = Some(Run {
            kind,
            budget,
            reason,
        });
    }

    /// One status poll worth of simulated progress
    fn poll(&mut self) {
        let Some(mut run) = self.run.take() else {
            return;
        };
        if run.kind == RunKind::Free {
            self.time += self.config.quantum;
            self.cycle += 1;
        }
        match run.budget {
            Some(0) => {
                match run.kind {
                    RunKind::Step => self.time += self.config.quantum,
                    RunKind::Instruction => self.time += 1,
                    RunKind::Free => {}
                }
                if run.kind != RunKind::Free {
                    self.cycle += 1;
                }
                self.reason = run.reason.to_string();
            }
            Some(n) => {
                run.budget = Some(n - 1);
                self.run = Some(run);
            }
            None => self.run = Some(run),
        }
    }

    fn interrupt(&mut self) -> String {
        self.interrupts += 1;
        if self.running() {
            self.halt(REASON_INTERRUPT);
        }
        self.status_reply()
    }

    /// Answer one command; `None` means no reply frame
    fn handle(&mut self, cmd: &str) -> Option<String> {
        self.log.push(cmd.to_string());
        let fields = decompose(cmd);
        let Some((verb, args)) = fields.split_first() else {
            return Some(Self::error("empty command"));
        };

        let reply = match (verb.as_str(), args) {
            ("version", []) => Self::ok(&self.config.version),
            ("getq", []) => Self::ok(&[self.config.quantum.to_string()]),
            ("status", []) => {
                self.poll();
                if self.running() {
                    self.running_replies += 1;
                }
                self.status_reply()
            }
            ("stop", []) => {
                if self.running() {
                    self.halt(REASON_USER);
                }
                Self::ok::<&str>(&[])
            }
            ("resume", []) => {
                match (self.config.breakpoint_after, self.breakpoints.is_empty()) {
                    (Some(n), false) => self.start(RunKind::Free, Some(n), REASON_BREAKPOINT),
                    _ => self.start(RunKind::Free, None, REASON_USER),
                }
                Self::ok::<&str>(&[])
            }
            ("resume", [duration]) => match duration.strip_suffix("ns").map(str::parse::<u64>) {
                Some(Ok(_)) => {
                    self.start(RunKind::Step, Some(self.config.step_polls), REASON_STEP);
                    Self::ok::<&str>(&[])
                }
                _ => Self::error(&format!("invalid duration: {}", duration)),
            },
            ("step", [target]) => {
                if self.config.hierarchy.contains(&format!("<target>{}</target>", target)) {
                    self.start(RunKind::Instruction, Some(0), REASON_STEP);
                    Self::ok::<&str>(&[])
                } else {
                    Self::error(&format!("no such target: {}", target))
                }
            }
            ("list", [format]) if format == "xml" => Self::ok(&[self.config.hierarchy.as_str()]),
            ("geta", [path]) => match self.config.attributes.get(path) {
                Some(values) => Self::ok(values),
                None => Self::error(&format!("no such attribute: {}", path)),
            },
            ("e", [module, command, rest @ ..]) => {
                let mut out = vec![format!("{}.{}", module, command)];
                out.extend(rest.iter().cloned());
                Self::ok(&out)
            }
            ("mkbp", [target, address]) => {
                let id = self.next_breakpoint;
                self.next_breakpoint += 1;
                self.breakpoints.insert(id, (target.clone(), address.clone()));
                Self::ok(&[format!("breakpoint-id:{:08}", id)])
            }
            ("rmbp", [id]) => match id.parse::<u64>().ok().and_then(|id| self.breakpoints.remove(&id)) {
                Some(_) => Self::ok::<&str>(&[]),
                None => Self::error(&format!("no such breakpoint: {}", id)),
            },
            ("quit", []) => {
                self.killed = true;
                return None;
            }
            _ => Self::error(&format!("unknown command: {}", verb)),
        };
        Some(reply)
    }
}

/// A mock simulator listening on loopback
#[derive(Debug)]
pub struct MockSimulator {
    addr: SocketAddr,
    state: Arc<Mutex<SimState>>,
    accept: JoinHandle<()>,
}

impl MockSimulator {
    /// Start with the default model
    pub async fn start() -> io::Result<Self> {
        Self::with_config(SimConfig::default()).await
    }

    pub async fn with_config(config: SimConfig) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(SimState::new(config)));

        let shared = Arc::clone(&state);
        let accept = tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                shared.lock().connections += 1;
                debug!(%peer, "mock simulator accepted connection");
                let state = Arc::clone(&shared);
                tokio::spawn(async move {
                    if let Err(e) = serve(stream, state).await {
                        debug!(error = %e, "mock simulator connection ended");
                    }
                });
            }
        });

        Ok(MockSimulator {
            addr,
            state,
            accept,
        })
    }

    /// `host:port` to connect to
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Run `f` against the live model
    pub fn with_state<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Every command received so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    /// Number of received commands equal to `cmd`
    pub fn count(&self, cmd: &str) -> usize {
        self.state.lock().log.iter().filter(|c| *c == cmd).count()
    }

    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }

    /// Status replies that reported `running`
    pub fn running_replies(&self) -> usize {
        self.state.lock().running_replies
    }

    pub fn interrupts(&self) -> usize {
        self.state.lock().interrupts
    }

    pub fn connections(&self) -> usize {
        self.state.lock().connections
    }

    /// Whether a `quit` arrived
    pub fn killed(&self) -> bool {
        self.state.lock().killed
    }
}

impl Drop for MockSimulator {
    fn drop(&mut self) {
        self.accept.abort();
    }
}

async fn serve(stream: TcpStream, state: Arc<Mutex<SimState>>) -> io::Result<()> {
    stream.set_nodelay(true)?;
    let mut io = BufStream::new(stream);
    let mut decoder = PacketDecoder::new();

    loop {
        let byte = match io.read_u8().await {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };

        if !decoder.in_frame() && byte == SIGNAL_INTERRUPT {
            let reply = state.lock().interrupt();
            trace!("mock simulator interrupted");
            reply_with(&mut io, &state, &reply).await?;
            continue;
        }

        match decoder.feed(byte) {
            Ok(Decoded::Pending) => {}
            Ok(Decoded::Packet(payload)) => {
                let nak = state.lock().config.faults.take_nak();
                if nak {
                    write_flush(&mut io, &[NAK]).await?;
                    continue;
                }
                write_flush(&mut io, &[ACK]).await?;

                let cmd = String::from_utf8_lossy(&payload).into_owned();
                trace!(%cmd, "mock simulator received");
                let reply = state.lock().handle(&cmd);
                match reply {
                    Some(reply) => reply_with(&mut io, &state, &reply).await?,
                    None => return Ok(()),
                }
            }
            Ok(Decoded::Corrupt { .. }) => write_flush(&mut io, &[NAK]).await?,
            Err(_) => decoder.reset(),
        }
    }
}

async fn write_flush(io: &mut BufStream<TcpStream>, bytes: &[u8]) -> io::Result<()> {
    io.write_all(bytes).await?;
    io.flush().await
}

/// Send a reply frame until the client acknowledges it
async fn reply_with(
    io: &mut BufStream<TcpStream>,
    state: &Mutex<SimState>,
    reply: &str,
) -> io::Result<()> {
    let frame = encode_packet(reply.as_bytes());
    loop {
        let corrupt = state.lock().config.faults.take_corruption();
        if corrupt {
            write_flush(io, &corrupt_frame(&frame)).await?;
        } else {
            write_flush(io, &frame).await?;
        }

        match io.read_u8().await? {
            ACK => return Ok(()),
            NAK => continue,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("expected acknowledgement, got {:#04x}", other),
                ))
            }
        }
    }
}
