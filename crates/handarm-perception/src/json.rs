//! [`JsonLandmarkEstimator`] – accepts landmarks computed by an external
//! process.
//!
//! Each frame payload is one JSON document:
//!
//! ```json
//! {"hands": [{"points": [{"x": 0.51, "y": 0.62, "z": 0.0}, …21 entries…]}]}
//! ```
//!
//! An empty `hands` array means no hand was detected in that frame.

use handarm_hal::camera::CameraFrame;
use handarm_types::{ArmError, HandLandmarks};
use serde::{Deserialize, Serialize};

use crate::sampler::PoseEstimator;

/// Wire shape of one frame's landmark document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkDocument {
    #[serde(default)]
    pub hands: Vec<HandLandmarks>,
}

#[derive(Debug, Default)]
pub struct JsonLandmarkEstimator;

impl JsonLandmarkEstimator {
    pub fn new() -> Self {
        Self
    }
}

impl PoseEstimator for JsonLandmarkEstimator {
    fn estimate(&mut self, frame: &CameraFrame) -> Result<Vec<HandLandmarks>, ArmError> {
        let doc: LandmarkDocument = serde_json::from_slice(&frame.data).map_err(|e| {
            ArmError::Inference(format!("frame {} is not a landmark document: {e}", frame.sequence))
        })?;
        Ok(doc.hands)
    }
}
