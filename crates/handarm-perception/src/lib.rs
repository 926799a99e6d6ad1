//! `handarm-perception` – from camera frames to joint targets.
//!
//! # Modules
//!
//! - [`sampler`] – [`PoseEstimator`][sampler::PoseEstimator] trait and
//!   [`PoseSampler`][sampler::PoseSampler], which runs inference on the
//!   blocking pool so frame capture never stalls.
//! - [`mapper`] – [`TargetMapper`][mapper::TargetMapper]: pure landmark →
//!   partial joint-target mapping.
//! - [`synthetic`] – deterministic simulated hand for headless runs.
//! - [`json`] – landmarks supplied as JSON by an external tracker.

pub mod json;
pub mod mapper;
pub mod sampler;
pub mod synthetic;

pub use mapper::{MapperConfig, TargetMapper};
pub use sampler::{PoseEstimator, PoseSampler, Sample};
