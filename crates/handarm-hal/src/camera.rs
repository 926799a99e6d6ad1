//! Generic `Camera` trait and supporting types for image-capture hardware.
//!
//! Camera reads are blocking calls.  Callers in async code run them on the
//! blocking pool so a slow read never stalls other tasks.

use handarm_types::ArmError;

/// A raw image frame returned by a camera driver.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Monotonic frame counter assigned by the driver.
    pub sequence: u64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel data (e.g. RGB24), or an encoded payload for sources that
    /// carry pre-computed data instead of pixels.
    pub data: Vec<u8>,
}

/// A camera or image-capture device.
pub trait Camera: Send {
    /// Stable identifier for this camera, e.g. `"webcam0"`.
    fn id(&self) -> &str;

    /// Block until the next frame is available.
    ///
    /// Returns `Ok(None)` when the device is still open but produced no frame
    /// this time (the caller should retry shortly).
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Capture`] when the device has closed or failed;
    /// no further frames will follow.
    fn capture(&mut self) -> Result<Option<CameraFrame>, ArmError>;

    /// Release the device.  Called once when capture ends; further
    /// `capture` calls are not expected.
    fn release(&mut self) {}
}
