//! Console stand-in for the annotated camera window.
//!
//! Prints a line when the hand enters or leaves the view, and a target
//! readout every `every` frames.

use colored::Colorize;
use handarm_hal::camera::CameraFrame;
use handarm_hal::display::{DisplayAction, FrameDisplay, Overlay};
use handarm_types::{ArmError, JointTargets};

pub struct StatusDisplay {
    every: u64,
    shown: u64,
    hand_visible: Option<bool>,
}

impl StatusDisplay {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            shown: 0,
            hand_visible: None,
        }
    }

    /// Returns the lines to print for this frame.
    fn lines(&mut self, frame: &CameraFrame, overlay: &Overlay) -> Vec<String> {
        let mut out = Vec::new();
        let visible = overlay.hand_detected();
        if self.hand_visible != Some(visible) {
            let msg = if visible {
                "hand detected".green().to_string()
            } else {
                "no hand in view".yellow().to_string()
            };
            out.push(format!("  [frame {:>6}] {msg}", frame.sequence));
            self.hand_visible = Some(visible);
        }
        if self.shown % self.every == 0 {
            out.push(format!("  [frame {:>6}] {}", frame.sequence, render_targets(&overlay.targets).dimmed()));
        }
        self.shown += 1;
        out
    }
}

pub fn render_targets(targets: &JointTargets) -> String {
    targets
        .iter()
        .map(|(ch, v)| format!("{ch}={v:<5}"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl FrameDisplay for StatusDisplay {
    fn show(&mut self, frame: &CameraFrame, overlay: &Overlay) -> Result<DisplayAction, ArmError> {
        for line in self.lines(frame, overlay) {
            println!("{line}");
        }
        Ok(DisplayAction::Continue)
    }
}
