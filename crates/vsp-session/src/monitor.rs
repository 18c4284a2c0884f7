//! Background status polling during free-running execution
//!
//! `run()` hands control to a tokio task that polls `status` until the peer
//! reports stopped or the session cancels it. The task's `JoinHandle` is the
//! "stopped" future; cancelling goes through a oneshot so the task can do a
//! final refresh instead of being torn down mid-request.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use vsp_core::{VspError, VspResult};
use vsp_transport::Link;

use crate::config::MIN_POLL_INTERVAL;
use crate::status::{query_status, ControlState, Status};

/// Handle to a running monitor task
#[derive(Debug)]
pub struct RunMonitor {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<VspResult<()>>,
}

impl RunMonitor {
    /// Start polling on the current runtime
    pub fn spawn(link: Link, state: Arc<Mutex<ControlState>>, period: Duration) -> Self {
        let (cancel, cancelled) = oneshot::channel();
        let handle = tokio::spawn(watch(link, state, period, cancelled));
        RunMonitor {
            cancel: Some(cancel),
            handle,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Ask the task to stop after its current request, then wait for it
    pub async fn cancel(mut self) -> VspResult<()> {
        if let Some(cancel) = self.cancel.take() {
            // Already gone if the task exited on its own
            let _ = cancel.send(());
        }
        self.join().await
    }

    /// Wait for the task to observe a stop
    pub async fn join(self) -> VspResult<()> {
        self.handle
            .await
            .map_err(|e| VspError::Monitor(e.to_string()))?
    }

    /// Drop the task without waiting; an in-flight request is abandoned
    pub fn abort(self) {
        self.handle.abort();
    }
}

async fn refresh(link: &Link, state: &Mutex<ControlState>) -> VspResult<Status> {
    let status = query_status(link).await?;
    state.lock().apply(&status);
    Ok(status)
}

async fn watch(
    link: Link,
    state: Arc<Mutex<ControlState>>,
    period: Duration,
    mut cancelled: oneshot::Receiver<()>,
) -> VspResult<()> {
    // `interval` panics on a zero period
    let mut ticker = interval(period.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut cancelled => {
                let status = refresh(&link, &state).await?;
                debug!(running = status.running, "run monitor cancelled");
                return Ok(());
            }
            _ = ticker.tick() => {
                let status = refresh(&link, &state).await?;
                if !status.running {
                    info!(reason = %status.reason, time = %status.time, "simulation stopped");
                    return Ok(());
                }
            }
        }
    }
}
