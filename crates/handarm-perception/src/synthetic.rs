//! [`SyntheticHandEstimator`] – a deterministic stand-in for a real hand
//! tracker.
//!
//! Derives a hand pose from the sequence number that
//! [`SimCamera`][handarm_hal::sim::SimCamera] stamps into each frame: the
//! wrist sweeps an ellipse, the pinch opens and closes periodically, and the
//! hand leaves the view for one phase of every cycle so the "no hand" path is
//! exercised too.

use handarm_hal::camera::CameraFrame;
use handarm_hal::sim::SimCamera;
use handarm_types::{ArmError, HandLandmark, HandLandmarks, Landmark};

use crate::sampler::PoseEstimator;

/// Frames per full sweep of the wrist ellipse.
const SWEEP_FRAMES: u64 = 240;
/// Frames per pinch open/close half-period.
const GRIP_FRAMES: u64 = 45;
/// Out of every `SWEEP_FRAMES`, the last `ABSENT_FRAMES` have no hand.
const ABSENT_FRAMES: u64 = 30;

const PALM_LENGTH: f32 = 0.15;

#[derive(Debug, Default)]
pub struct SyntheticHandEstimator;

impl SyntheticHandEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Hand pose at frame `sequence`, or `None` while the hand is out of view.
    pub fn hand_at(sequence: u64) -> Option<HandLandmarks> {
        let phase = sequence % SWEEP_FRAMES;
        if phase >= SWEEP_FRAMES - ABSENT_FRAMES {
            return None;
        }
        let t = phase as f32 / SWEEP_FRAMES as f32 * std::f32::consts::TAU;
        let wrist = Landmark::new(0.5 + 0.3 * t.cos(), 0.6 + 0.2 * t.sin(), 0.0);
        let mcp = Landmark::new(wrist.x, wrist.y - PALM_LENGTH, 0.0);
        let pinched = (sequence / GRIP_FRAMES) % 2 == 1;
        let gap = if pinched { 0.02 } else { 0.12 };
        let thumb = Landmark::new(wrist.x - gap / 2.0, mcp.y - 0.05, 0.0);
        let index = Landmark::new(wrist.x + gap / 2.0, mcp.y - 0.05, 0.0);

        Some(
            HandLandmarks::uniform(mcp)
                .with(HandLandmark::Wrist, wrist)
                .with(HandLandmark::MiddleMcp, mcp)
                .with(HandLandmark::ThumbTip, thumb)
                .with(HandLandmark::IndexTip, index),
        )
    }
}

impl PoseEstimator for SyntheticHandEstimator {
    fn estimate(&mut self, frame: &CameraFrame) -> Result<Vec<HandLandmarks>, ArmError> {
        let sequence = SimCamera::sequence_of(frame).unwrap_or(frame.sequence);
        Ok(Self::hand_at(sequence).into_iter().collect())
    }
}
