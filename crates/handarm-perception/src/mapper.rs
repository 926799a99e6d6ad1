//! Target Mapper – hand landmarks → joint targets.
//!
//! Pure and deterministic: the same landmarks always yield the same update.
//! The mapper only emits the channels it has data for; everything else is
//! left absent so the caller's last-known-good value survives.
//!
//! | Channel | Source | Formula |
//! |---|---|---|
//! | `base` | wrist x | `round((1 − x) · 65535)` (mirrored) or `round(x · 65535)` |
//! | `bottom` | wrist y | `round((1 − y) · 65535)` |
//! | `hand` | thumb tip ↔ index tip, scaled by wrist ↔ middle MCP | `0` when the pinch ratio is below the grip threshold, else `65535` |
//!
//! `middle` and `top` are not driven by hand pose.  Inputs are clamped to
//! `[0, 1]` before scaling; non-finite coordinates leave the channel absent.
//!
//! # Example
//!
//! ```rust
//! use handarm_perception::mapper::TargetMapper;
//! use handarm_types::{HandLandmark, HandLandmarks, JointChannel, Landmark};
//!
//! let hand = HandLandmarks::uniform(Landmark::new(0.5, 0.5, 0.0))
//!     .with(HandLandmark::Wrist, Landmark::new(0.25, 1.0, 0.0));
//! let update = TargetMapper::default().map(Some(&hand));
//! assert_eq!(update.get(JointChannel::Base), Some(49151));
//! assert_eq!(update.get(JointChannel::Bottom), Some(0));
//! assert_eq!(update.get(JointChannel::Top), None);
//! ```

use handarm_types::{HandLandmark, HandLandmarks, JointChannel, PartialTargets};
use serde::{Deserialize, Serialize};

/// Gripper output when the pinch is closed.
pub const GRIP_CLOSED: u16 = 0;
/// Gripper output when the hand is open.
pub const GRIP_OPEN: u16 = u16::MAX;

/// Tuning knobs for [`TargetMapper`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Mirror the X axis so the arm moves like the operator's reflection.
    pub mirror: bool,
    /// Pinch ratio below which the gripper closes.
    pub grip_threshold: f32,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            mirror: true,
            grip_threshold: 0.35,
        }
    }
}

/// Stateless landmark → target mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetMapper {
    config: MapperConfig,
}

impl TargetMapper {
    /// Channels this mapper can ever emit, in declaration order.
    pub const COVERED: [JointChannel; 3] = [JointChannel::Base, JointChannel::Bottom, JointChannel::Hand];

    pub fn new(config: MapperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> MapperConfig {
        self.config
    }

    /// Map one frame's hand (or its absence) to a partial update.
    ///
    /// `None` means no hand was detected and yields an empty update.
    pub fn map(&self, hand: Option<&HandLandmarks>) -> PartialTargets {
        let mut update = PartialTargets::empty();
        let Some(hand) = hand else {
            return update;
        };

        let wrist = hand.get(HandLandmark::Wrist);
        let x = if self.config.mirror { 1.0 - wrist.x } else { wrist.x };
        if let Some(base) = normalized_to_target(x) {
            update.set(JointChannel::Base, base);
        }
        if let Some(bottom) = normalized_to_target(1.0 - wrist.y) {
            update.set(JointChannel::Bottom, bottom);
        }
        if let Some(grip) = self.grip(hand) {
            update.set(JointChannel::Hand, grip);
        }
        update
    }

    fn grip(&self, hand: &HandLandmarks) -> Option<u16> {
        let palm = hand
            .get(HandLandmark::Wrist)
            .planar_distance(&hand.get(HandLandmark::MiddleMcp));
        let pinch = hand
            .get(HandLandmark::ThumbTip)
            .planar_distance(&hand.get(HandLandmark::IndexTip));
        // A collapsed palm gives no usable scale.
        if !palm.is_finite() || !pinch.is_finite() || palm <= f32::EPSILON {
            return None;
        }
        if pinch / palm < self.config.grip_threshold {
            Some(GRIP_CLOSED)
        } else {
            Some(GRIP_OPEN)
        }
    }
}

/// Scale a normalised coordinate to a 16-bit target.
///
/// Returns `None` for NaN or infinite input.
pub fn normalized_to_target(v: f32) -> Option<u16> {
    if !v.is_finite() {
        return None;
    }
    Some((v.clamp(0.0, 1.0) * f32::from(u16::MAX)).round() as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use handarm_types::Landmark;

    fn open_hand_at(x: f32, y: f32) -> HandLandmarks {
        HandLandmarks::uniform(Landmark::new(x, y - 0.1, 0.0))
            .with(HandLandmark::Wrist, Landmark::new(x, y, 0.0))
            .with(HandLandmark::MiddleMcp, Landmark::new(x, y - 0.2, 0.0))
            .with(HandLandmark::ThumbTip, Landmark::new(x - 0.1, y - 0.1, 0.0))
            .with(HandLandmark::IndexTip, Landmark::new(x + 0.05, y - 0.25, 0.0))
    }

    fn pinched_hand_at(x: f32, y: f32) -> HandLandmarks {
        open_hand_at(x, y)
            .with(HandLandmark::ThumbTip, Landmark::new(x, y - 0.15, 0.0))
            .with(HandLandmark::IndexTip, Landmark::new(x + 0.01, y - 0.15, 0.0))
    }

    #[test]
    fn no_hand_yields_empty_update() {
        assert!(TargetMapper::default().map(None).is_empty());
    }

    #[test]
    fn wrist_drives_base_and_bottom() {
        let update = TargetMapper::default().map(Some(&open_hand_at(0.25, 0.75)));
        assert_eq!(update.get(JointChannel::Base), Some(49151));
        assert_eq!(update.get(JointChannel::Bottom), Some(16384));
    }

    #[test]
    fn mirror_can_be_disabled() {
        let mapper = TargetMapper::new(MapperConfig {
            mirror: false,
            ..MapperConfig::default()
        });
        let update = mapper.map(Some(&open_hand_at(0.25, 0.75)));
        assert_eq!(update.get(JointChannel::Base), Some(16384));
    }

    #[test]
    fn out_of_frame_coordinates_are_clamped() {
        let hand = open_hand_at(0.5, 0.5).with(HandLandmark::Wrist, Landmark::new(-0.4, 1.3, 0.0));
        let update = TargetMapper::default().map(Some(&hand));
        assert_eq!(update.get(JointChannel::Base), Some(65535));
        assert_eq!(update.get(JointChannel::Bottom), Some(0));
    }

    #[test]
    fn open_and_pinched_hand_drive_gripper() {
        let mapper = TargetMapper::default();
        assert_eq!(
            mapper.map(Some(&open_hand_at(0.5, 0.5))).get(JointChannel::Hand),
            Some(GRIP_OPEN)
        );
        assert_eq!(
            mapper.map(Some(&pinched_hand_at(0.5, 0.5))).get(JointChannel::Hand),
            Some(GRIP_CLOSED)
        );
    }

    #[test]
    fn nan_wrist_leaves_wrist_channels_absent() {
        let hand = open_hand_at(0.5, 0.5).with(HandLandmark::Wrist, Landmark::new(f32::NAN, f32::NAN, 0.0));
        let update = TargetMapper::default().map(Some(&hand));
        assert_eq!(update.get(JointChannel::Base), None);
        assert_eq!(update.get(JointChannel::Bottom), None);
        // Palm scale is unusable too, so the gripper is left alone.
        assert_eq!(update.get(JointChannel::Hand), None);
    }

    #[test]
    fn collapsed_palm_leaves_gripper_absent() {
        let hand = HandLandmarks::uniform(Landmark::new(0.5, 0.5, 0.0));
        let update = TargetMapper::default().map(Some(&hand));
        assert_eq!(update.get(JointChannel::Hand), None);
        assert!(update.get(JointChannel::Base).is_some());
    }

    #[test]
    fn only_covered_channels_are_ever_emitted() {
        let update = TargetMapper::default().map(Some(&open_hand_at(0.3, 0.6)));
        for (channel, _) in update.iter() {
            assert!(TargetMapper::COVERED.contains(&channel), "{channel} is not covered");
        }
    }

    #[test]
    fn uncovered_landmarks_do_not_affect_output() {
        let a = open_hand_at(0.3, 0.6);
        let b = a
            .clone()
            .with(HandLandmark::RingTip, Landmark::new(0.9, 0.1, 0.4))
            .with(HandLandmark::PinkyMcp, Landmark::new(0.0, 0.0, -1.0));
        let mapper = TargetMapper::default();
        assert_eq!(mapper.map(Some(&a)), mapper.map(Some(&b)));
    }

    #[test]
    fn mapping_is_deterministic() {
        let hand = pinched_hand_at(0.41, 0.37);
        let mapper = TargetMapper::default();
        let first = mapper.map(Some(&hand));
        for _ in 0..10 {
            assert_eq!(mapper.map(Some(&hand)), first);
        }
    }

    #[test]
    fn normalized_to_target_rounds() {
        assert_eq!(normalized_to_target(0.0), Some(0));
        assert_eq!(normalized_to_target(1.0), Some(65535));
        assert_eq!(normalized_to_target(0.5), Some(32768));
        assert_eq!(normalized_to_target(f32::INFINITY), None);
    }
}
