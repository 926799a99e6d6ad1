//! Debug display for annotated frames.
//!
//! The display is the operator's window onto the control loop: it shows the
//! frame together with an [`Overlay`] of the current joint targets, and it is
//! also where the quit key is read.

use handarm_types::{ArmError, HandLandmarks, JointTargets};

use crate::camera::CameraFrame;

/// Annotations drawn on top of a frame.
#[derive(Debug, Clone)]
pub struct Overlay {
    /// Target snapshot after this frame's update was merged.
    pub targets: JointTargets,
    /// The hand the targets were derived from, if one was detected.
    pub hand: Option<HandLandmarks>,
}

impl Overlay {
    pub fn hand_detected(&self) -> bool {
        self.hand.is_some()
    }
}

/// What the operator asked for while the frame was on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayAction {
    Continue,
    Quit,
}

/// A (possibly blocking) frame sink.
pub trait FrameDisplay: Send {
    /// Present `frame` with `overlay` and poll for operator input.
    ///
    /// # Errors
    ///
    /// Returns an error when the window can no longer be drawn; the caller
    /// treats this like a quit request.
    fn show(&mut self, frame: &CameraFrame, overlay: &Overlay) -> Result<DisplayAction, ArmError>;

    /// Tear down any window resources.
    fn close(&mut self) {}
}
