//! End-to-end Integration Test Suite
//!
//! Sessions driven against the mock simulator over real loopback sockets:
//! - Connect handshake and its failure modes
//! - Stepping, free runs, interrupts and breakpoints
//! - Attribute reads and command execution through the hierarchy
//! - Teardown: disconnect, drop, kill and reconnect
//! - Retry behavior under injected frame faults

use std::time::Duration;

use tokio::time::{sleep, Instant};

use vsp_core::VspResult;
use vsp_session::{Session, SessionConfig};
use vsp_transport::TransportConfig;

use crate::simulator::MockSimulator;

/// Session settings tuned for tests: fast polling, short timeouts
pub fn fast_config() -> SessionConfig {
    SessionConfig::default()
        .with_poll_interval(Duration::from_millis(10))
        .with_transport(
            TransportConfig::default()
                .with_connect_timeout(Duration::from_secs(2))
                .with_read_timeout(Duration::from_secs(2)),
        )
}

/// Attach a session to `sim`
pub async fn attach(sim: &MockSimulator) -> VspResult<Session> {
    Session::connect_with(&sim.address(), fast_config()).await
}

/// Poll `cond` until it holds or `limit` passes
pub async fn wait_until(mut cond: impl FnMut() -> bool, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    cond()
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use vsp_core::{BreakpointId, SimTime, VspError};
    use vsp_session::{logging, AttributeValue, Invocation, Scope, Verb};

    use crate::faults::FaultConfig;
    use crate::simulator::{SimConfig, REASON_BREAKPOINT, REASON_INTERRUPT, REASON_STEP, REASON_USER};

    async fn setup() -> (MockSimulator, Session) {
        let _ = logging::init("warn");
        let sim = MockSimulator::start().await.unwrap();
        let session = attach(&sim).await.unwrap();
        (sim, session)
    }

    // ------------------------------------------------------------------
    // Handshake
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_connect_handshake() {
        let (sim, session) = setup().await;

        assert_eq!(
            sim.commands(),
            vec!["stop", "version", "getq", "status", "list,xml"]
        );
        assert_eq!(session.peer(), sim.address());
        assert_eq!(session.engine_version(), "2.3.0");
        assert_eq!(session.protocol_version(), "1.4");
        assert_eq!(session.quantum(), SimTime::from_nanos(100));

        let state = session.snapshot();
        assert!(!state.running);
        assert_eq!(state.reason, REASON_USER);

        assert_eq!(session.modules().len(), 1);
        assert_eq!(session.targets().len(), 1);
        assert_eq!(session.targets()[0].name(), "cpu0");
        assert!(session.find_module("top.cpu0").is_some());
        assert!(session.find_module("top.cpu1").is_none());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = Session::connect_with(&format!("127.0.0.1:{}", port), fast_config())
            .await
            .unwrap_err();
        match err {
            VspError::Connect { host, port: p, .. } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(p, port);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handshake_rejects_bad_version() {
        let sim = MockSimulator::with_config(SimConfig::default().with_version(&["only"]))
            .await
            .unwrap();
        let err = attach(&sim).await.unwrap_err();
        assert!(matches!(err, VspError::UnexpectedResponse { ref command, .. } if command == "version"));
    }

    #[tokio::test]
    async fn test_handshake_rejects_bad_hierarchy() {
        let sim = MockSimulator::with_config(SimConfig::default().with_hierarchy("<objects/>"))
            .await
            .unwrap();
        let err = attach(&sim).await.unwrap_err();
        assert!(matches!(err, VspError::InvalidDocument(_)));

        let sim = MockSimulator::with_config(
            SimConfig::default().with_hierarchy("<hierarchy><module name=\"m\"/></hierarchy>"),
        )
        .await
        .unwrap();
        assert_eq!(
            attach(&sim).await.unwrap_err(),
            VspError::UnexpectedNode("module".into())
        );
    }

    // ------------------------------------------------------------------
    // Execution control
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_scenario_step() {
        let (sim, mut session) = setup().await;
        let before = session.snapshot();
        assert!(!before.running);

        session.step().await.unwrap();

        let after = session.snapshot();
        assert!(!after.running);
        assert_eq!(after.reason, REASON_STEP);
        assert_eq!(after.cycle, before.cycle + 1);
        assert_eq!(after.time, before.time + session.quantum());
        assert_eq!(sim.count("resume,100ns"), 1);
        // The peer reported running before it reported stopped
        assert_eq!(sim.running_replies(), 2);
    }

    #[tokio::test]
    async fn test_stepi() {
        let (sim, mut session) = setup().await;

        session.stepi("cpu0").await.unwrap();
        assert_eq!(sim.count("step,cpu0"), 1);
        assert_eq!(session.cycle().await.unwrap(), 1);

        let err = session.stepi("cpu9").await.unwrap_err();
        assert_eq!(err, VspError::NoSuchTarget("cpu9".into()));
        assert_eq!(sim.count("step,cpu9"), 0);
    }

    #[tokio::test]
    async fn test_status_queries_hit_peer() {
        let (sim, session) = setup().await;
        sim.clear_log();

        assert!(!session.running().await.unwrap());
        assert_eq!(session.time().await.unwrap(), SimTime::ZERO);
        assert_eq!(session.cycle().await.unwrap(), 0);
        assert_eq!(session.reason().await.unwrap(), REASON_USER);
        assert_eq!(sim.count("status"), 4);
    }

    #[tokio::test]
    async fn test_run_and_stop_joins_monitor() {
        let (sim, mut session) = setup().await;

        session.run().await.unwrap();
        assert!(session.snapshot().running);
        assert!(wait_until(|| sim.running_replies() >= 3, Duration::from_secs(2)).await);

        // Second run while running is a no-op
        session.run().await.unwrap();
        assert_eq!(sim.count("resume"), 1);

        session.stop().await.unwrap();
        let state = session.snapshot();
        assert!(!state.running);
        assert_eq!(state.reason, REASON_USER);
        assert!(state.time > SimTime::ZERO);

        // The monitor is gone: no more polling
        let polls = sim.count("status");
        sleep(Duration::from_millis(60)).await;
        assert_eq!(sim.count("status"), polls);

        // Stopping a stopped session sends nothing
        let stops = sim.count("stop");
        session.stop().await.unwrap();
        assert_eq!(sim.count("stop"), stops);
    }

    #[tokio::test]
    async fn test_run_until_breakpoint() {
        let _ = logging::init("warn");
        let sim = MockSimulator::with_config(SimConfig::default().with_breakpoint_after(3))
            .await
            .unwrap();
        let mut session = attach(&sim).await.unwrap();

        session.create_breakpoint("cpu0", "0x2000").await.unwrap();
        session.run().await.unwrap();
        session.wait_stopped().await.unwrap();

        let state = session.snapshot();
        assert!(!state.running);
        assert_eq!(state.reason, REASON_BREAKPOINT);
        assert!(state.cycle > 0);
        assert_eq!(state.cycle, sim.with_state(|s| s.cycle()));
        // Only the handshake stop went out
        assert_eq!(sim.count("stop"), 1);
    }

    #[tokio::test]
    async fn test_interrupt_free_run() {
        let (sim, mut session) = setup().await;

        session.run().await.unwrap();
        assert!(wait_until(|| sim.running_replies() >= 1, Duration::from_secs(2)).await);

        session.interrupt().await.unwrap();
        assert_eq!(sim.interrupts(), 1);
        let state = session.snapshot();
        assert!(!state.running);
        assert_eq!(state.reason, REASON_INTERRUPT);
        assert!(!sim.with_state(|s| s.running()));

        // Nothing to interrupt
        session.interrupt().await.unwrap();
        assert_eq!(sim.interrupts(), 1);

        // The link is still in sync
        assert_eq!(session.reason().await.unwrap(), REASON_INTERRUPT);
    }

    // ------------------------------------------------------------------
    // Breakpoints
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_scenario_breakpoints() {
        let (sim, mut session) = setup().await;

        let id = session.create_breakpoint("cpu0", "0x1000").await.unwrap();
        assert_eq!(id, BreakpointId(1));
        assert_eq!(sim.commands().last().unwrap(), "mkbp,cpu0,0x1000");

        let known: Vec<_> = session.breakpoints().collect();
        assert_eq!(known.len(), 1);
        assert_eq!(known[0].target, "cpu0");
        assert_eq!(known[0].address, "0x1000");

        let second = session.create_breakpoint("cpu0", "0x2000").await.unwrap();
        assert_eq!(second, BreakpointId(2));

        session.delete_breakpoint(id).await.unwrap();
        assert_eq!(sim.commands().last().unwrap(), "rmbp,1");
        assert_eq!(session.breakpoints().count(), 1);
        assert_eq!(sim.with_state(|s| s.breakpoints()), vec![2]);

        // The peer decides whether an id exists
        let err = session.delete_breakpoint(id).await.unwrap_err();
        assert_eq!(err, VspError::Peer("no such breakpoint: 1".into()));
    }

    // ------------------------------------------------------------------
    // Hierarchy access
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_scenario_attribute_shapes() {
        let (sim, session) = setup().await;
        sim.clear_log();

        let trace = session.find_attribute("top.cpu0.trace").unwrap();
        assert_eq!(trace.read().await.unwrap(), AttributeValue::Empty);
        assert!(sim.commands().is_empty());

        let pc = session.find_attribute("top.cpu0.pc").unwrap();
        assert_eq!(pc.read().await.unwrap(), AttributeValue::Scalar("0x1000".into()));

        let regs = session.find_attribute("top.cpu0.regs").unwrap();
        assert_eq!(
            regs.read().await.unwrap(),
            AttributeValue::List(vec!["1".into(), "2".into(), "3".into()])
        );

        let broken = session.find_attribute("top.cpu0.broken").unwrap();
        assert!(matches!(
            broken.read().await,
            Err(VspError::UnexpectedResponse { .. })
        ));

        let ghost = session.find_attribute("top.cpu0.ghost").unwrap();
        assert_eq!(
            ghost.read().await.unwrap_err(),
            VspError::Peer("no such attribute: top.cpu0.ghost".into())
        );

        assert_eq!(
            sim.commands(),
            vec![
                "geta,top.cpu0.pc",
                "geta,top.cpu0.regs",
                "geta,top.cpu0.broken",
                "geta,top.cpu0.ghost"
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_command() {
        let (sim, session) = setup().await;

        let reset = session.find_command("top.cpu0.reset").unwrap();
        assert_eq!(reset.execute::<&str>(&[]).await.unwrap(), vec!["top.cpu0.reset"]);

        let echo = session.find_command("top.cpu0.echo").unwrap();
        let reply = echo.execute(&["a,b", "c\\d", "$#}*"]).await.unwrap();
        assert_eq!(reply, vec!["top.cpu0.echo", "a,b", "c\\d", "$#}*"]);

        let err = echo.execute::<&str>(&[]).await.unwrap_err();
        assert!(matches!(err, VspError::MissingArguments { required: 1, given: 0, .. }));
        assert_eq!(sim.count("e,top.cpu0,echo"), 0);
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_disconnect_cascades() {
        let (_sim, mut session) = setup().await;
        let pc = session.find_attribute("top.cpu0.pc").unwrap();
        let reset = session.find_command("top.cpu0.reset").unwrap();
        let cpu = session.find_module("top.cpu0").unwrap();

        session.disconnect().await;
        assert!(!session.is_connected());

        assert_eq!(
            pc.read().await.unwrap_err(),
            VspError::Disconnected("top.cpu0.pc".into())
        );
        assert_eq!(
            reset.execute::<&str>(&[]).await.unwrap_err(),
            VspError::Disconnected("top.cpu0.reset".into())
        );
        assert!(cpu.parent().is_none());
        assert_eq!(
            session.running().await.unwrap_err(),
            VspError::Disconnected("session".into())
        );
        assert!(session.create_breakpoint("cpu0", "0x0").await.is_err());

        // Idempotent
        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_drop_tears_down_hierarchy() {
        let (_sim, session) = setup().await;
        let pc = session.find_attribute("top.cpu0.pc").unwrap();
        drop(session);
        assert!(!pc.is_connected());
        assert!(matches!(pc.read().await, Err(VspError::Disconnected(_))));
    }

    #[tokio::test]
    async fn test_kill() {
        let (sim, session) = setup().await;
        session.kill().await.unwrap();
        assert!(wait_until(|| sim.killed(), Duration::from_secs(2)).await);
        assert_eq!(sim.commands().last().unwrap(), "quit");
    }

    #[tokio::test]
    async fn test_reconnect() {
        let (sim, mut session) = setup().await;
        let old = session.find_attribute("top.clock").unwrap();

        session.reconnect(&sim.address()).await.unwrap();
        assert_eq!(sim.connections(), 2);
        assert!(session.is_connected());
        assert!(matches!(old.read().await, Err(VspError::Disconnected(_))));

        let clock = session.find_attribute("top.clock").unwrap();
        assert_eq!(clock.read().await.unwrap().as_scalar(), Some("100000000"));
        assert_eq!(sim.count("list,xml"), 2);
    }

    // ------------------------------------------------------------------
    // Faults
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_recovers_from_noisy_link() {
        let _ = logging::init("warn");
        let sim = MockSimulator::with_config(SimConfig::default().with_faults(FaultConfig::noisy()))
            .await
            .unwrap();
        let session = attach(&sim).await.unwrap();

        // Each NAKed command was retransmitted, but handled once
        assert_eq!(sim.count("stop"), 1);
        let pc = session.find_attribute("top.cpu0.pc").unwrap();
        assert_eq!(pc.read().await.unwrap().as_scalar(), Some("0x1000"));
    }

    #[tokio::test]
    async fn test_hostile_link_fails_handshake() {
        let _ = logging::init("warn");
        let sim = MockSimulator::with_config(SimConfig::default().with_faults(FaultConfig::hostile()))
            .await
            .unwrap();
        let err = attach(&sim).await.unwrap_err();
        assert_eq!(err, VspError::SendFailed { payload: "stop".into() });
        assert!(sim.commands().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_replies_recovered_mid_session() {
        let (sim, session) = setup().await;
        sim.with_state(|s| s.faults_mut().corrupt_replies = 4);

        // Four corrupt frames stay within the receive budget
        assert_eq!(session.cycle().await.unwrap(), 0);
        assert_eq!(sim.with_state(|s| s.faults_mut().corrupt_replies), 0);
    }

    #[tokio::test]
    async fn test_failed_resume_leaves_session_stopped() {
        let (sim, mut session) = setup().await;
        sim.with_state(|s| s.faults_mut().nak_commands = 5);

        let err = session.run().await.unwrap_err();
        assert_eq!(err, VspError::SendFailed { payload: "resume".into() });
        assert!(!session.snapshot().running);
        assert_eq!(sim.count("resume"), 0);

        // The next run really resumes and starts polling
        session.run().await.unwrap();
        assert_eq!(sim.count("resume"), 1);
        assert!(session.snapshot().running);
        assert!(sim.with_state(|s| s.running()));
        assert!(wait_until(|| sim.running_replies() >= 1, Duration::from_secs(2)).await);

        session.stop().await.unwrap();
        assert!(!session.snapshot().running);
    }

    #[tokio::test]
    async fn test_failed_step_is_retried() {
        let (sim, mut session) = setup().await;
        sim.with_state(|s| s.faults_mut().nak_commands = 5);

        let err = session.step().await.unwrap_err();
        assert_eq!(err, VspError::SendFailed { payload: "resume,100ns".into() });
        assert!(!session.snapshot().running);

        session.step().await.unwrap();
        assert_eq!(sim.count("resume,100ns"), 1);
        assert_eq!(session.snapshot().reason, REASON_STEP);
    }

    #[tokio::test]
    async fn test_monitor_failure_clears_run_state() {
        let (sim, mut session) = setup().await;

        session.run().await.unwrap();
        assert!(wait_until(|| sim.running_replies() >= 1, Duration::from_secs(2)).await);

        // Five corrupt frames exhaust the monitor's receive budget
        sim.with_state(|s| s.faults_mut().corrupt_replies = 5);
        let err = session.wait_stopped().await.unwrap_err();
        assert_eq!(err, VspError::ReceiveFailed);
        assert!(!session.snapshot().running);
    }

    #[tokio::test]
    async fn test_zero_poll_interval_does_not_panic_monitor() {
        let _ = logging::init("warn");
        let sim = MockSimulator::start().await.unwrap();
        let mut config = fast_config();
        config.poll_interval = Duration::ZERO;
        let mut session = Session::connect_with(&sim.address(), config).await.unwrap();

        session.run().await.unwrap();
        assert!(wait_until(|| sim.running_replies() >= 2, Duration::from_secs(2)).await);
        session.stop().await.unwrap();
        assert_eq!(session.snapshot().reason, REASON_USER);
    }

    // ------------------------------------------------------------------
    // Shell dispatch
    // ------------------------------------------------------------------

    fn exec_name(invocation: VspResult<Invocation>) -> String {
        match invocation {
            Ok(Invocation::Exec { command, .. }) => command.hierarchy_name(),
            other => panic!("expected exec, got {:?}", other),
        }
    }

    fn read_names(invocation: VspResult<Invocation>) -> Vec<String> {
        match invocation {
            Ok(Invocation::Read { attributes }) => attributes
                .iter()
                .map(|a| a.hierarchy_name().to_string())
                .collect(),
            other => panic!("expected read, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shell_dispatch_order() {
        let (_sim, session) = setup().await;
        let mut scope = Scope::new();
        let s = Some(&session);

        // At the root `info` is the built-in
        assert!(matches!(
            scope.dispatch(s, &["info"]),
            Ok(Invocation::Builtin { verb: Verb::Info, .. })
        ));
        assert_eq!(read_names(scope.dispatch(s, &["top.clock"])), vec!["top.clock"]);
        assert_eq!(
            scope.dispatch(s, &["clock"]).unwrap_err(),
            VspError::UnknownVerb("clock".into())
        );

        // Inside the core its own `info` command shadows the verb
        scope.enter(&session, "top.cpu0").unwrap();
        assert_eq!(scope.path(), "top.cpu0");
        assert_eq!(exec_name(scope.dispatch(s, &["info"])), "top.cpu0.info");
        assert_eq!(read_names(scope.dispatch(s, &["pc"])), vec!["top.cpu0.pc"]);
        assert_eq!(
            read_names(scope.dispatch(s, &["pc", "regs"])),
            vec!["top.cpu0.pc", "top.cpu0.regs"]
        );
        assert_eq!(read_names(scope.dispatch(s, &["r"])).len(), 5);
        assert_eq!(read_names(scope.dispatch(s, &["r", "top.clock"])), vec!["top.clock"]);

        match scope.dispatch(s, &["x", "echo", "hi"]) {
            Ok(Invocation::Exec { command, args }) => {
                assert_eq!(command.name(), "echo");
                assert_eq!(args, vec!["hi".to_string()]);
            }
            other => panic!("expected exec, got {:?}", other),
        }
        assert!(matches!(
            scope.dispatch(s, &["x"]),
            Err(VspError::MissingArguments { .. })
        ));
        assert_eq!(
            scope.dispatch(s, &["x", "nope"]).unwrap_err(),
            VspError::NotFound {
                kind: "command",
                path: "nope".into()
            }
        );
        assert!(matches!(
            scope.dispatch(s, &["r", "nope"]),
            Err(VspError::NotFound { kind: "attribute", .. })
        ));
        assert!(matches!(
            scope.dispatch(s, &["ls"]),
            Ok(Invocation::Builtin { verb: Verb::List, .. })
        ));
    }

    #[tokio::test]
    async fn test_shell_change_directory() {
        let (_sim, session) = setup().await;
        let mut scope = Scope::new();

        scope.change(&session, Some("top")).unwrap();
        assert_eq!(scope.path(), "top");

        // Relative to the working module first
        scope.change(&session, Some("uart0")).unwrap();
        assert_eq!(scope.path(), "top.uart0");

        // Falls back to the root
        scope.change(&session, Some("top.cpu0")).unwrap();
        assert_eq!(scope.path(), "top.cpu0");

        scope.change(&session, Some("..")).unwrap();
        assert_eq!(scope.path(), "top");
        scope.change(&session, Some("..")).unwrap();
        assert!(scope.current().is_none());

        scope.change(&session, Some("top.cpu0")).unwrap();
        scope.change(&session, None).unwrap();
        assert!(scope.current().is_none());

        assert_eq!(
            scope.change(&session, Some("nope")).unwrap_err(),
            VspError::NotFound {
                kind: "module",
                path: "nope".into()
            }
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_arguments_survive_peer(args in proptest::collection::vec("[ -~]{0,12}", 1..4)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let reply = rt.block_on(async {
                let sim = MockSimulator::start().await.unwrap();
                let session = attach(&sim).await.unwrap();
                let echo = session.find_command("top.cpu0.echo").unwrap();
                echo.execute(args.as_slice()).await
            }).unwrap();

            prop_assert_eq!(&reply[0], "top.cpu0.echo");
            prop_assert_eq!(&reply[1..], &args[..]);
        }
    }
}
