//! `handarm-hal` – hardware boundary of the arm controller.
//!
//! # Modules
//!
//! - [`camera`] – [`Camera`][camera::Camera] trait and
//!   [`CameraFrame`][camera::CameraFrame].
//! - [`display`] – [`FrameDisplay`][display::FrameDisplay] trait for the
//!   annotated debug view and the operator's quit key.
//! - [`duty`] – target → PWM duty mapping performed by the arm firmware.
//! - [`peripheral`] – [`SimPeripheral`][peripheral::SimPeripheral]: a
//!   host-side model of the arm's microcontroller.
//! - [`sim`] – simulated camera and headless display.
//! - [`lines`] – [`LineCamera`][lines::LineCamera]: frames read line by line
//!   from an external process.

pub mod camera;
pub mod display;
pub mod duty;
pub mod lines;
pub mod peripheral;
pub mod sim;

pub use camera::{Camera, CameraFrame};
pub use display::{DisplayAction, FrameDisplay, Overlay};
pub use duty::{PulseProfile, analog_to_duty, analog_to_pulse_us};
pub use peripheral::{ServoUpdate, SimPeripheral};
