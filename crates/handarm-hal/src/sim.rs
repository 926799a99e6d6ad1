//! In-process simulated camera and display for headless runs and CI.
//!
//! [`SimCamera`] produces blank frames at a fixed rate and stamps each with
//! its sequence number so a synthetic pose estimator can derive a
//! deterministic hand position from it.  [`HeadlessDisplay`] accepts frames
//! without drawing anything.
//!
//! # Example
//!
//! ```rust
//! use handarm_hal::camera::Camera;
//! use handarm_hal::sim::SimCamera;
//!
//! let mut cam = SimCamera::new("sim0").with_frame_limit(1);
//! assert!(cam.capture().unwrap().is_some());
//! assert!(cam.capture().is_err()); // limit reached: camera closed
//! ```

use std::time::Duration;

use handarm_types::ArmError;
use tracing::debug;

use crate::camera::{Camera, CameraFrame};
use crate::display::{DisplayAction, FrameDisplay, Overlay};

// ────────────────────────────────────────────────────────────────────────────
// Simulated camera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated camera returning blank 4×4 greyscale frames.
pub struct SimCamera {
    id: String,
    next_sequence: u64,
    frame_limit: Option<u64>,
    frame_interval: Option<Duration>,
    released: bool,
}

impl SimCamera {
    /// Create a free-running simulated camera with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            next_sequence: 0,
            frame_limit: None,
            frame_interval: None,
            released: false,
        }
    }

    /// Close the camera after `limit` frames.
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Block for `interval` on each capture to emulate a real frame rate.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    /// Read the sequence number stamped into a frame by [`SimCamera`].
    pub fn sequence_of(frame: &CameraFrame) -> Option<u64> {
        let bytes: [u8; 8] = frame.data.get(..8)?.try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<Option<CameraFrame>, ArmError> {
        if self.released {
            return Err(ArmError::Capture(format!("camera '{}' was released", self.id)));
        }
        if self.frame_limit.is_some_and(|limit| self.next_sequence >= limit) {
            return Err(ArmError::Capture(format!("camera '{}' closed", self.id)));
        }
        if let Some(interval) = self.frame_interval {
            std::thread::sleep(interval);
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let mut data = vec![0u8; 16];
        data[..8].copy_from_slice(&sequence.to_le_bytes());
        Ok(Some(CameraFrame {
            sequence,
            width: 4,
            height: 4,
            data,
        }))
    }

    fn release(&mut self) {
        self.released = true;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Headless display
// ────────────────────────────────────────────────────────────────────────────

/// A display that draws nothing.  Optionally requests quit after a number of
/// frames, standing in for an operator pressing the quit key.
#[derive(Default)]
pub struct HeadlessDisplay {
    shown: u64,
    quit_after: Option<u64>,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quit_after(frames: u64) -> Self {
        Self {
            shown: 0,
            quit_after: Some(frames),
        }
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl FrameDisplay for HeadlessDisplay {
    fn show(&mut self, frame: &CameraFrame, overlay: &Overlay) -> Result<DisplayAction, ArmError> {
        self.shown += 1;
        debug!(
            sequence = frame.sequence,
            hand = overlay.hand_detected(),
            targets = ?overlay.targets.values(),
            "frame"
        );
        match self.quit_after {
            Some(limit) if self.shown >= limit => Ok(DisplayAction::Quit),
            _ => Ok(DisplayAction::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handarm_types::JointTargets;

    #[test]
    fn sim_camera_stamps_sequence_numbers() {
        let mut cam = SimCamera::new("sim0");
        for expected in 0..3 {
            let frame = cam.capture().unwrap().unwrap();
            assert_eq!(frame.sequence, expected);
            assert_eq!(SimCamera::sequence_of(&frame), Some(expected));
        }
    }

    #[test]
    fn sim_camera_closes_after_limit() {
        let mut cam = SimCamera::new("sim0").with_frame_limit(2);
        assert!(cam.capture().unwrap().is_some());
        assert!(cam.capture().unwrap().is_some());
        assert!(matches!(cam.capture(), Err(ArmError::Capture(_))));
    }

    #[test]
    fn released_camera_refuses_capture() {
        let mut cam = SimCamera::new("sim0");
        cam.release();
        assert!(cam.capture().is_err());
    }

    #[test]
    fn sequence_of_short_frame_is_none() {
        let frame = CameraFrame {
            sequence: 0,
            width: 1,
            height: 1,
            data: vec![0u8; 3],
        };
        assert_eq!(SimCamera::sequence_of(&frame), None);
    }

    #[test]
    fn headless_display_quits_after_limit() {
        let mut cam = SimCamera::new("sim0");
        let frame = cam.capture().unwrap().unwrap();
        let overlay = Overlay {
            targets: JointTargets::default(),
            hand: None,
        };
        let mut display = HeadlessDisplay::quit_after(2);
        assert_eq!(display.show(&frame, &overlay).unwrap(), DisplayAction::Continue);
        assert_eq!(display.show(&frame, &overlay).unwrap(), DisplayAction::Quit);
        assert_eq!(display.shown(), 2);
    }

    #[test]
    fn headless_display_never_quits_by_default() {
        let mut cam = SimCamera::new("sim0");
        let frame = cam.capture().unwrap().unwrap();
        let overlay = Overlay {
            targets: JointTargets::default(),
            hand: None,
        };
        let mut display = HeadlessDisplay::new();
        for _ in 0..10 {
            assert_eq!(display.show(&frame, &overlay).unwrap(), DisplayAction::Continue);
        }
    }
}
