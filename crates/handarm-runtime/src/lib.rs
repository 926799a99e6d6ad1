//! `handarm-runtime` – the two loops and the thing that runs them.
//!
//! # Modules
//!
//! - [`targets`] – [`target_channel`][targets::target_channel]: the shared
//!   joint-target snapshot.  One writer, any number of lock-free readers,
//!   never a torn vector.
//! - [`capture`] – [`CaptureLoop`][capture::CaptureLoop]: camera → pose →
//!   targets → display, with every blocking step on the blocking pool.
//! - [`dispatcher`] – [`Dispatcher`][dispatcher::Dispatcher]: fixed-rate
//!   send loop with a configurable channel subset and failure policy.
//! - [`orchestrator`] – [`Orchestrator`][orchestrator::Orchestrator]:
//!   discovery, connection, both loops, and an exactly-once teardown.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.

pub mod capture;
pub mod dispatcher;
pub mod orchestrator;
pub mod targets;
pub mod telemetry;

pub use capture::{CaptureExit, CaptureIo, CaptureLoop, CaptureReport};
pub use dispatcher::{CycleReport, DispatchExit, DispatchPolicy, DispatchReport, Dispatcher, FailurePolicy};
pub use orchestrator::{Orchestrator, OrchestratorConfig, Phase, RunOutcome, SessionSummary, ShutdownReason};
pub use targets::{TargetReader, TargetWriter, target_channel};
pub use telemetry::{TracerProviderGuard, init_tracing};
