//! Pose Sampler – runs the pose estimator off the async executor.
//!
//! Inference is CPU-bound.  [`PoseSampler::sample`] moves the frame onto
//! Tokio's blocking pool, runs the estimator there, and hands the frame back
//! together with the result, so the capture task stays responsive while a
//! slow inference is in progress.  At most one inference is in flight per
//! sampler: the caller awaits the result before reading the next frame.

use std::sync::{Arc, Mutex, PoisonError};

use handarm_hal::camera::CameraFrame;
use handarm_types::{ArmError, HandLandmarks};

/// External pose-estimation capability.
///
/// Implementations may block for as long as inference takes.
pub trait PoseEstimator: Send {
    /// Detect zero or more hands in `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Inference`] when the frame cannot be processed.
    fn estimate(&mut self, frame: &CameraFrame) -> Result<Vec<HandLandmarks>, ArmError>;
}

/// A frame together with what the estimator found in it.
#[derive(Debug)]
pub struct Sample {
    pub frame: CameraFrame,
    pub hands: Result<Vec<HandLandmarks>, ArmError>,
}

impl Sample {
    /// The hand used for control: the first detection, if any.
    pub fn primary_hand(&self) -> Option<&HandLandmarks> {
        self.hands.as_ref().ok().and_then(|hands| hands.first())
    }
}

/// Offloads a [`PoseEstimator`] to the blocking thread pool.
pub struct PoseSampler {
    estimator: Arc<Mutex<Box<dyn PoseEstimator>>>,
}

impl PoseSampler {
    pub fn new(estimator: Box<dyn PoseEstimator>) -> Self {
        Self {
            estimator: Arc::new(Mutex::new(estimator)),
        }
    }

    /// Run inference on `frame` without blocking the calling task.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Inference`] only when the worker itself failed
    /// (panicked or was cancelled); the frame is lost in that case.  Ordinary
    /// estimator errors are reported inside [`Sample::hands`].
    pub async fn sample(&self, frame: CameraFrame) -> Result<Sample, ArmError> {
        let estimator = Arc::clone(&self.estimator);
        tokio::task::spawn_blocking(move || {
            // A panic in an earlier inference poisons the lock; the estimator
            // itself is still usable.
            let hands = estimator
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .estimate(&frame);
            Sample { frame, hands }
        })
        .await
        .map_err(|e| ArmError::Inference(format!("inference worker failed: {e}")))
    }
}
