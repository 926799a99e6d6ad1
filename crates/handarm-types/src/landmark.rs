//! Hand landmarks as produced by a pose estimator.
//!
//! Coordinates are normalised to the frame: `x` and `y` lie in `[0, 1]`
//! (origin top-left), `z` is relative depth with the wrist as reference.

use serde::{Deserialize, Serialize};

/// Number of landmarks in one hand skeleton.
pub const LANDMARK_COUNT: usize = 21;

/// Anatomical label of a hand landmark, in skeleton order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandLandmark {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A single normalised landmark position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Planar distance to `other` (depth is ignored; it is too noisy for
    /// gesture thresholds).
    pub fn planar_distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// `true` when every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// The full skeleton of one detected hand, valid for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandLandmarks {
    points: [Landmark; LANDMARK_COUNT],
}

impl HandLandmarks {
    pub fn new(points: [Landmark; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// A skeleton with every landmark at `point`.  Handy as a starting point
    /// before placing the few landmarks a caller cares about.
    pub fn uniform(point: Landmark) -> Self {
        Self {
            points: [point; LANDMARK_COUNT],
        }
    }

    pub fn get(&self, label: HandLandmark) -> Landmark {
        self.points[label.index()]
    }

    /// Copy of `self` with `label` moved to `point`.
    pub fn with(mut self, label: HandLandmark, point: Landmark) -> Self {
        self.points[label.index()] = point;
        self
    }

    pub fn points(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.points
    }
}
