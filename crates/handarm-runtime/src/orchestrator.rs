//! [`Orchestrator`] – one controller run from scan to shutdown.
//!
//! ```text
//! Idle → Discovering ─┬─ not found ────────────────────────────┐
//!                     └─ found → Connecting → Running          │
//!                                   │                          │
//!         capture ends │ operator stop │ link unhealthy         │
//!                                   ▼                          ▼
//!                              ShuttingDown ─────────────→ Terminated
//! ```
//!
//! While running, two tasks share the joint targets: the capture loop
//! (sole writer) and the dispatcher (reader).  The first of
//! *capture ended*, *dispatcher gave up* or *external stop* raises the
//! internal stop signal; both tasks are then joined and the session is
//! closed exactly once.  When no arm is found the capture devices are
//! released and nothing is ever connected or sent.

use std::sync::Arc;
use std::time::Duration;

use handarm_link::{CommandSink, Connector, Discovery, Scanner, Session, discover};
use handarm_perception::mapper::{MapperConfig, TargetMapper};
use handarm_types::{ArmError, ChannelIdFormat, JointTargets, PeripheralHandle};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::capture::{CaptureExit, CaptureIo, CaptureLoop, CaptureReport};
use crate::dispatcher::{DispatchExit, DispatchPolicy, DispatchReport, Dispatcher, FailurePolicy};
use crate::targets::target_channel;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Advertised name the arm is matched by.
    pub device_name: String,
    pub scan_timeout: Duration,
    pub channel_format: ChannelIdFormat,
    pub dispatch: DispatchPolicy,
    pub failure: FailurePolicy,
    pub mapper: MapperConfig,
    /// Targets sent until the first hand is seen.
    pub initial_targets: JointTargets,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            device_name: "mpy-uart".to_string(),
            scan_timeout: Duration::from_secs(5),
            channel_format: ChannelIdFormat::Name,
            dispatch: DispatchPolicy::default(),
            failure: FailurePolicy::tolerant(),
            mapper: MapperConfig::default(),
            initial_targets: JointTargets::REST_POSE,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcome types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Discovering,
    Connecting,
    Running,
    ShuttingDown,
    Terminated,
}

/// What ended a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownReason {
    /// The capture loop finished: camera closed or operator quit key.
    CaptureEnded,
    /// The external stop signal (e.g. Ctrl-C) was raised.
    OperatorStop,
    /// The dispatcher declared the link unhealthy.
    SessionFault,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub peripheral: PeripheralHandle,
    pub reason: ShutdownReason,
    pub capture: CaptureReport,
    pub dispatch: DispatchReport,
    pub final_targets: JointTargets,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Discovery finished without seeing the arm.
    NoArmFound,
    Completed(SessionSummary),
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

pub struct Orchestrator {
    config: OrchestratorConfig,
    scanner: Arc<dyn Scanner>,
    connector: Arc<dyn Connector>,
    phase: Phase,
}

/// Resolves once the external stop is raised.  A dropped sender means
/// nobody can ask us to stop, so it never resolves.
async fn external_stop(shutdown: &mut watch::Receiver<bool>) {
    let raised = shutdown.wait_for(|s| *s).await.is_ok();
    if !raised {
        std::future::pending::<()>().await;
    }
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, scanner: Arc<dyn Scanner>, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            scanner,
            connector,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn enter(&mut self, phase: Phase) {
        info!(from = ?self.phase, to = ?phase, "orchestrator phase");
        self.phase = phase;
    }

    /// Discover, connect, run both loops until one of the shutdown
    /// triggers fires, then tear down.
    ///
    /// # Errors
    ///
    /// Scanner failures ([`ArmError::Adapter`]) and connection failures
    /// ([`ArmError::Connect`]).  The capture devices are released in both
    /// cases.  Once connected, the run always completes with a summary.
    pub async fn run(&mut self, io: CaptureIo, mut shutdown: watch::Receiver<bool>) -> Result<RunOutcome, ArmError> {
        // ── discover ────────────────────────────────────────────────────────
        self.enter(Phase::Discovering);
        let found = discover(
            self.scanner.as_ref(),
            &self.config.device_name,
            self.config.scan_timeout,
        )
        .await;
        let handle = match found {
            Ok(Discovery::Found(handle)) => handle,
            Ok(Discovery::NotFound) => {
                io.release();
                self.enter(Phase::Terminated);
                return Ok(RunOutcome::NoArmFound);
            }
            Err(e) => {
                io.release();
                self.enter(Phase::Terminated);
                return Err(e);
            }
        };

        // ── connect ─────────────────────────────────────────────────────────
        self.enter(Phase::Connecting);
        let session = match Session::open(self.connector.as_ref(), handle.clone(), self.config.channel_format).await {
            Ok(session) => Arc::new(session),
            Err(e) => {
                error!(peripheral = %handle, error = %e, "connection failed");
                io.release();
                self.enter(Phase::Terminated);
                return Err(e);
            }
        };

        // ── run ─────────────────────────────────────────────────────────────
        self.enter(Phase::Running);
        let (writer, reader) = target_channel(self.config.initial_targets);
        let (stop_tx, stop_rx) = watch::channel(false);

        let dispatcher = Dispatcher::new(
            self.config.dispatch.clone(),
            self.config.failure,
            reader.clone(),
            Arc::clone(&session) as Arc<dyn CommandSink>,
        );
        let mut dispatch_task = tokio::spawn(dispatcher.run(stop_rx.clone()));
        let mut capture_task =
            tokio::spawn(CaptureLoop::new(TargetMapper::new(self.config.mapper), writer).run(io, stop_rx));

        let mut capture_done = None;
        let mut dispatch_done = None;
        let reason = tokio::select! {
            joined = &mut capture_task => {
                capture_done = Some(joined);
                ShutdownReason::CaptureEnded
            }
            joined = &mut dispatch_task => {
                dispatch_done = Some(joined);
                ShutdownReason::SessionFault
            }
            _ = external_stop(&mut shutdown) => ShutdownReason::OperatorStop,
        };

        // ── shut down ───────────────────────────────────────────────────────
        self.enter(Phase::ShuttingDown);
        info!(reason = ?reason, "stopping session");
        // Receivers live in both tasks until they are joined.
        let _ = stop_tx.send(true);

        let capture_joined = match capture_done {
            Some(joined) => joined,
            None => capture_task.await,
        };
        let capture = capture_joined.unwrap_or_else(|e| {
            error!(error = %e, "capture task failed");
            CaptureReport {
                exit: CaptureExit::CameraClosed(ArmError::Capture(format!("capture task failed: {e}"))),
                frames: 0,
                hands: 0,
            }
        });
        let dispatch_joined = match dispatch_done {
            Some(joined) => joined,
            None => dispatch_task.await,
        };
        let dispatch = dispatch_joined.unwrap_or_else(|e| {
            error!(error = %e, "dispatch task failed");
            DispatchReport {
                cycles: 0,
                sends: 0,
                failures: 0,
                skipped: 0,
                exit: DispatchExit::LinkUnhealthy,
            }
        });

        if !session.close().await {
            warn!(peripheral = %handle, "session was already closed");
        }
        self.enter(Phase::Terminated);

        Ok(RunOutcome::Completed(SessionSummary {
            peripheral: handle,
            reason,
            capture,
            dispatch,
            final_targets: reader.snapshot(),
        }))
    }
}
