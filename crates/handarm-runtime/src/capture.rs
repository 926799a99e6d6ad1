//! Capture Loop – camera → pose → joint targets → display.
//!
//! One frame at a time:
//!
//! 1. read a frame on the blocking pool (an empty read is retried after
//!    10 ms);
//! 2. run pose estimation through the [`PoseSampler`];
//! 3. map the primary hand to a [`PartialTargets`] and merge it into the
//!    shared targets;
//! 4. show the frame with its overlay and watch for the operator's quit key;
//! 5. yield, so the dispatcher is never starved.
//!
//! The loop ends when the camera closes, the operator quits, or the stop
//! signal is raised.  A stop that lands during a blocking read or display
//! call waits up to [`STOP_GRACE`] for the call to return, so the camera is
//! released and the display closed before [`CaptureLoop::run`] returns.  A
//! call that outlives the grace period releases its device in the
//! background once it returns.

use std::time::Duration;

use handarm_hal::camera::{Camera, CameraFrame};
use handarm_hal::display::{DisplayAction, FrameDisplay, Overlay};
use handarm_perception::mapper::TargetMapper;
use handarm_perception::sampler::PoseSampler;
use handarm_types::{ArmError, PartialTargets};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::targets::TargetWriter;

/// Delay before retrying an empty camera read.
pub const EMPTY_FRAME_RETRY: Duration = Duration::from_millis(10);

/// How long a stop waits for an in-flight camera read or display call to
/// hand its device back before the device is left to a background release.
pub const STOP_GRACE: Duration = Duration::from_secs(1);

/// The devices the capture loop owns for its lifetime.
pub struct CaptureIo {
    pub camera: Box<dyn Camera>,
    pub sampler: PoseSampler,
    pub display: Box<dyn FrameDisplay>,
}

impl CaptureIo {
    /// Release the camera and close the display without running the loop.
    pub fn release(mut self) {
        self.camera.release();
        self.display.close();
        debug!(camera = self.camera.id(), "capture devices released");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureExit {
    /// The operator pressed the quit key.
    Quit,
    /// The camera returned an error or stopped producing frames.
    CameraClosed(ArmError),
    /// The stop signal was raised.
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReport {
    pub exit: CaptureExit,
    /// Frames read from the camera.
    pub frames: u64,
    /// Frames in which a hand was detected.
    pub hands: u64,
}

pub struct CaptureLoop {
    mapper: TargetMapper,
    targets: TargetWriter,
}

/// Result of racing a blocking call against the stop signal.
enum Raced<T> {
    Done(T),
    /// Stop was raised and the call returned within [`STOP_GRACE`].
    Stopped(T),
    /// Stop was raised and the call is still running.
    Abandoned(JoinHandle<T>),
    Failed(String),
}

async fn blocking_or_stop<T, F>(stop: &mut watch::Receiver<bool>, f: F) -> Raced<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let mut worker = tokio::task::spawn_blocking(f);
    let finished = tokio::select! {
        joined = &mut worker => Some(joined),
        _ = stopped(stop) => None,
    };
    match finished {
        Some(Ok(value)) => Raced::Done(value),
        Some(Err(e)) => Raced::Failed(e.to_string()),
        None => match tokio::time::timeout(STOP_GRACE, &mut worker).await {
            Ok(Ok(value)) => Raced::Stopped(value),
            Ok(Err(e)) => Raced::Failed(e.to_string()),
            Err(_) => Raced::Abandoned(worker),
        },
    }
}

/// Resolves once `stop` is `true`.  A dropped sender never resolves.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let raised = stop.wait_for(|s| *s).await.is_ok();
    if !raised {
        std::future::pending::<()>().await;
    }
}

impl CaptureLoop {
    pub fn new(mapper: TargetMapper, targets: TargetWriter) -> Self {
        Self { mapper, targets }
    }

    #[instrument(name = "capture", skip_all, fields(camera = io.camera.id()))]
    pub async fn run(self, io: CaptureIo, mut stop: watch::Receiver<bool>) -> CaptureReport {
        let CaptureIo {
            mut camera,
            sampler,
            mut display,
        } = io;
        let camera_id = camera.id().to_string();
        info!(camera = %camera_id, "capture loop started");

        let mut frames = 0u64;
        let mut hands = 0u64;

        let exit = loop {
            if *stop.borrow() {
                break CaptureExit::Stopped;
            }

            // ── read ────────────────────────────────────────────────────────
            let read = blocking_or_stop(&mut stop, move || {
                let result = camera.capture();
                (camera, result)
            })
            .await;
            let frame: CameraFrame = match read {
                Raced::Done((cam, result)) => {
                    camera = cam;
                    match result {
                        Ok(Some(frame)) => frame,
                        Ok(None) => {
                            debug!(camera = %camera_id, "empty frame; retrying");
                            tokio::select! {
                                _ = tokio::time::sleep(EMPTY_FRAME_RETRY) => {}
                                _ = stopped(&mut stop) => {}
                            }
                            continue;
                        }
                        Err(e) => {
                            info!(camera = %camera_id, reason = %e, "camera closed");
                            camera.release();
                            display.close();
                            break CaptureExit::CameraClosed(e);
                        }
                    }
                }
                Raced::Stopped((cam, _)) => {
                    camera = cam;
                    break CaptureExit::Stopped;
                }
                Raced::Abandoned(worker) => {
                    warn!(camera = %camera_id, "camera read still blocked; releasing in the background");
                    display.close();
                    tokio::spawn(async move {
                        if let Ok((mut camera, _)) = worker.await {
                            camera.release();
                        }
                    });
                    return CaptureReport {
                        exit: CaptureExit::Stopped,
                        frames,
                        hands,
                    };
                }
                Raced::Failed(details) => {
                    display.close();
                    return CaptureReport {
                        exit: CaptureExit::CameraClosed(ArmError::Capture(format!(
                            "camera worker failed: {details}"
                        ))),
                        frames,
                        hands,
                    };
                }
            };
            frames += 1;

            // ── infer ───────────────────────────────────────────────────────
            let sample = match sampler.sample(frame).await {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(error = %e, "frame dropped");
                    continue;
                }
            };
            if let Err(e) = &sample.hands {
                warn!(frame = sample.frame.sequence, error = %e, "pose estimation failed");
            }
            let hand = sample.primary_hand().cloned();

            // ── map + merge ─────────────────────────────────────────────────
            let update: PartialTargets = self.mapper.map(hand.as_ref());
            if hand.is_some() {
                hands += 1;
            }
            let targets = self.targets.merge(&update);

            // ── display ─────────────────────────────────────────────────────
            let overlay = Overlay { targets, hand };
            let frame = sample.frame;
            let shown = blocking_or_stop(&mut stop, move || {
                let action = display.show(&frame, &overlay);
                (display, action)
            })
            .await;
            match shown {
                Raced::Done((disp, action)) => {
                    display = disp;
                    match action {
                        Ok(DisplayAction::Continue) => {}
                        Ok(DisplayAction::Quit) => {
                            info!("quit requested by operator");
                            camera.release();
                            display.close();
                            break CaptureExit::Quit;
                        }
                        Err(e) => warn!(error = %e, "display failed"),
                    }
                }
                Raced::Stopped((disp, _)) => {
                    display = disp;
                    break CaptureExit::Stopped;
                }
                Raced::Abandoned(worker) => {
                    warn!("display call still blocked; closing in the background");
                    camera.release();
                    tokio::spawn(async move {
                        if let Ok((mut display, _)) = worker.await {
                            display.close();
                        }
                    });
                    return CaptureReport {
                        exit: CaptureExit::Stopped,
                        frames,
                        hands,
                    };
                }
                Raced::Failed(details) => {
                    warn!(details = %details, "display worker failed");
                    camera.release();
                    return CaptureReport {
                        exit: CaptureExit::Stopped,
                        frames,
                        hands,
                    };
                }
            }

            tokio::task::yield_now().await;
        };

        if exit == CaptureExit::Stopped {
            camera.release();
            display.close();
        }
        info!(camera = %camera_id, frames, hands, exit = ?exit, "capture loop stopped");
        CaptureReport { exit, frames, hands }
    }
}
