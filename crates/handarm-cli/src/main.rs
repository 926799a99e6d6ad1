//! `handarm` – drive a robotic arm from hand tracking.
//!
//! This binary:
//!
//! 1. Loads `~/.handarm/config.toml` (writing defaults on first run) and
//!    applies `HANDARM_*` environment overrides.
//! 2. Picks the radio (`ble` or the in-process `sim` arm) and the landmark
//!    source (`synthetic` or JSON lines on `stdin`).
//! 3. Runs the orchestrator: scan, connect, capture + dispatch, shutdown.
//! 4. Intercepts **Ctrl-C** to stop the session cleanly.

mod config;
mod status;

use std::io::BufReader;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tokio::sync::watch;
use tracing::warn;

use handarm_hal::lines::LineCamera;
use handarm_hal::peripheral::SimPeripheral;
use handarm_hal::sim::SimCamera;
use handarm_link::{BleCentral, Connector, Scanner, SimCentral};
use handarm_perception::json::JsonLandmarkEstimator;
use handarm_perception::sampler::PoseSampler;
use handarm_perception::synthetic::SyntheticHandEstimator;
use handarm_runtime::capture::CaptureIo;
use handarm_runtime::orchestrator::{Orchestrator, RunOutcome, SessionSummary, ShutdownReason};
use handarm_types::{ArmError, JointChannel};

use config::{Config, Source, Transport};

/// Frame pacing of the synthetic source (~30 fps).
const SYNTHETIC_FRAME_INTERVAL: Duration = Duration::from_millis(33);
/// Status readout cadence, in frames.
const STATUS_EVERY: u64 = 30;

fn main() -> ExitCode {
    // Tracing first: the OTLP exporter must exist before any runtime.
    let _tracing = handarm_runtime::init_tracing("handarm");

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", config::config_path().display().to_string().bold());
            cfg
        }
        Ok(None) => {
            let cfg = Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("  {}: {}", "Could not write default config".yellow(), e),
            }
            cfg
        }
        Err(e) => {
            println!("  {}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);

    let orch_config = match cfg.orchestrator_config() {
        Ok(c) => c,
        Err(e) => {
            println!("  {}: {}", "Invalid configuration".red().bold(), e);
            return ExitCode::from(2);
        }
    };
    println!(
        "  Arm {}  transport {}  source {}  every {} ms",
        cfg.device_name.bold(),
        cfg.transport.to_string().cyan(),
        cfg.source.to_string().cyan(),
        cfg.dispatch_interval_ms
    );
    println!();

    // ── Ctrl-C → external stop ────────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the arm session …".yellow().bold());
        let _ = stop_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the session ends only when its input does");
    }

    // ── Runtime ───────────────────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            println!("  {}: {}", "Failed to start async runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(&cfg, orch_config, stop_rx));
    // A stdin read may still be blocked in the pool; don't wait on it.
    runtime.shutdown_timeout(Duration::from_millis(500));

    match result {
        Ok((RunOutcome::Completed(summary), sim)) => {
            print_summary(&summary, sim.as_ref());
            if summary.reason == ShutdownReason::SessionFault {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Ok((RunOutcome::NoArmFound, _)) => {
            println!(
                "  {} No device named {} answered within {} ms.",
                "✗".red().bold(),
                cfg.device_name.bold(),
                cfg.scan_timeout_ms
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            println!("  {}: {}", "Session failed".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    cfg: &Config,
    orch_config: handarm_runtime::OrchestratorConfig,
    stop: watch::Receiver<bool>,
) -> Result<(RunOutcome, Option<SimCentral>), ArmError> {
    let (scanner, connector, sim) = match cfg.transport {
        Transport::Ble => {
            let central = BleCentral::first_adapter().await?;
            (
                Arc::new(central.clone()) as Arc<dyn Scanner>,
                Arc::new(central) as Arc<dyn Connector>,
                None,
            )
        }
        Transport::Sim => {
            let central = SimCentral::new(SimPeripheral::new(cfg.device_name.clone(), cfg.pulse_profile()?));
            (
                Arc::new(central.clone()) as Arc<dyn Scanner>,
                Arc::new(central.clone()) as Arc<dyn Connector>,
                Some(central),
            )
        }
    };

    let io = match cfg.source {
        Source::Synthetic => CaptureIo {
            camera: Box::new(SimCamera::new("synthetic").with_frame_interval(SYNTHETIC_FRAME_INTERVAL)),
            sampler: PoseSampler::new(Box::new(SyntheticHandEstimator::new())),
            display: Box::new(status::StatusDisplay::new(STATUS_EVERY)),
        },
        Source::Stdin => CaptureIo {
            camera: Box::new(LineCamera::new("stdin", BufReader::new(std::io::stdin()))),
            sampler: PoseSampler::new(Box::new(JsonLandmarkEstimator::new())),
            display: Box::new(status::StatusDisplay::new(STATUS_EVERY)),
        },
    };

    let mut orchestrator = Orchestrator::new(orch_config, scanner, connector);
    let outcome = orchestrator.run(io, stop).await?;
    Ok((outcome, sim))
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_summary(summary: &SessionSummary, sim: Option<&SimCentral>) {
    let reason = match summary.reason {
        ShutdownReason::CaptureEnded => "capture ended".green(),
        ShutdownReason::OperatorStop => "operator stop".green(),
        ShutdownReason::SessionFault => "link unhealthy".red(),
    };
    println!();
    println!("  {} {}  ({})", "Session with".bold(), summary.peripheral.to_string().bold(), reason);
    println!(
        "    frames {}  hands {}",
        summary.capture.frames, summary.capture.hands
    );
    println!(
        "    cycles {}  sends {}  failures {}  skipped {}",
        summary.dispatch.cycles, summary.dispatch.sends, summary.dispatch.failures, summary.dispatch.skipped
    );
    println!("    final  {}", status::render_targets(&summary.final_targets).dimmed());

    if let Some(central) = sim {
        let duties = central.with_peripheral(|p| {
            JointChannel::ALL
                .iter()
                .map(|&ch| match p.duty(ch) {
                    Some(d) => format!("{ch}={d}"),
                    None => format!("{ch}=-"),
                })
                .collect::<Vec<_>>()
                .join(" ")
        });
        if let Ok(duties) = duties {
            println!("    duty   {}", duties.dimmed());
        }
    }
    println!();
}

fn print_banner() {
    println!();
    println!("{}", r#"   __                __                 "#.bold().cyan());
    println!("{}", r#"  / /  ___ ____  ___/ /__ ________ _    "#.bold().cyan());
    println!("{}", r#" / _ \/ _ `/ _ \/ _  / _ `/ __/  ' \   "#.bold().cyan());
    println!("{}", r#"/_//_/\_,_/_//_/\_,_/\_,_/_/ /_/_/_/   "#.bold().cyan());
    println!();
    println!("  {} {}",
        "handarm".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Hand-tracking robotic arm controller");
    println!();
}
