//! Joint target → servo PWM duty mapping.
//!
//! This is the peripheral-side contract.  The firmware maps a 16-bit target
//! linearly onto a pulse-width window and expresses that pulse as a 16-bit
//! duty fraction of the PWM period:
//!
//! ```text
//! period_us = 1_000_000 / pwm_frequency_hz
//! pulse_us  = pulse_min + (value / 65535) * (pulse_max - pulse_min)
//! duty      = trunc((pulse_us / period_us) * 65535)
//! ```
//!
//! Any host-side simulator must reproduce this exactly, including the final
//! truncation toward zero.
//!
//! # Example
//!
//! ```rust
//! use handarm_hal::duty::analog_to_duty;
//!
//! // 0 maps to the minimum pulse (500 µs of a 20 ms period).
//! assert_eq!(analog_to_duty(0, 500, 2500, 50), 1638);
//! // Full scale maps to the maximum pulse (2500 µs).
//! assert_eq!(analog_to_duty(65535, 500, 2500, 50), 8191);
//! ```

use handarm_types::ArmError;
use serde::{Deserialize, Serialize};

const FULL_SCALE: f64 = 65535.0;

/// Pulse window and PWM frequency of one servo output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseProfile {
    pub pulse_min_us: u32,
    pub pulse_max_us: u32,
    pub pwm_frequency_hz: u32,
}

impl PulseProfile {
    /// Validated constructor.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Config`] for a zero frequency, an empty pulse
    /// window, or a pulse longer than the PWM period.
    pub fn new(pulse_min_us: u32, pulse_max_us: u32, pwm_frequency_hz: u32) -> Result<Self, ArmError> {
        if pwm_frequency_hz == 0 {
            return Err(ArmError::Config("PWM frequency must be non-zero".to_string()));
        }
        if pulse_min_us >= pulse_max_us {
            return Err(ArmError::Config(format!(
                "pulse window {pulse_min_us}..{pulse_max_us} µs is empty"
            )));
        }
        let profile = Self {
            pulse_min_us,
            pulse_max_us,
            pwm_frequency_hz,
        };
        if f64::from(pulse_max_us) > profile.period_us() {
            return Err(ArmError::Config(format!(
                "pulse_max {pulse_max_us} µs exceeds the {:.0} µs PWM period",
                profile.period_us()
            )));
        }
        Ok(profile)
    }

    pub fn period_us(&self) -> f64 {
        1_000_000.0 / f64::from(self.pwm_frequency_hz)
    }

    pub fn pulse_us(&self, value: u16) -> f64 {
        analog_to_pulse_us(value, self.pulse_min_us, self.pulse_max_us)
    }

    pub fn duty(&self, value: u16) -> u16 {
        analog_to_duty(value, self.pulse_min_us, self.pulse_max_us, self.pwm_frequency_hz)
    }
}

impl Default for PulseProfile {
    /// Standard hobby servo: 500–2500 µs at 50 Hz.
    fn default() -> Self {
        Self {
            pulse_min_us: 500,
            pulse_max_us: 2500,
            pwm_frequency_hz: 50,
        }
    }
}

/// Pulse width in microseconds for a 16-bit target.
pub fn analog_to_pulse_us(value: u16, pulse_min_us: u32, pulse_max_us: u32) -> f64 {
    let min = f64::from(pulse_min_us);
    let max = f64::from(pulse_max_us);
    min + (f64::from(value) / FULL_SCALE) * (max - min)
}

/// 16-bit PWM duty for a 16-bit target.
///
/// A zero `pwm_frequency_hz` yields `0` (output off) rather than dividing by
/// zero.  Results above full scale saturate at `u16::MAX`.
pub fn analog_to_duty(value: u16, pulse_min_us: u32, pulse_max_us: u32, pwm_frequency_hz: u32) -> u16 {
    if pwm_frequency_hz == 0 {
        return 0;
    }
    let period_us = 1_000_000.0 / f64::from(pwm_frequency_hz);
    let pulse_us = analog_to_pulse_us(value, pulse_min_us, pulse_max_us);
    let duty = (pulse_us / period_us) * FULL_SCALE;
    // `as` truncates toward zero and saturates, matching the firmware's int().
    duty as u16
}
