//! [`SimPeripheral`] – host-side model of the arm's microcontroller.
//!
//! Receives wire tokens exactly as the firmware would, decodes them, and
//! computes the PWM duty each servo output would be driven with.  Used by
//! the simulated transport and by compatibility tests.

use handarm_types::{ArmError, CHANNEL_COUNT, JointChannel, WireCommand};
use tracing::{debug, warn};

use crate::duty::PulseProfile;

/// Result of applying one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoUpdate {
    pub channel: JointChannel,
    pub value: u16,
    pub duty: u16,
}

/// Simulated servo controller with one PWM output per joint channel.
#[derive(Debug, Clone)]
pub struct SimPeripheral {
    name: String,
    profiles: [PulseProfile; CHANNEL_COUNT],
    duties: [Option<u16>; CHANNEL_COUNT],
    received: u64,
    rejected: u64,
}

impl SimPeripheral {
    /// A peripheral advertising `name` with `profile` on every output.
    pub fn new(name: impl Into<String>, profile: PulseProfile) -> Self {
        Self {
            name: name.into(),
            profiles: [profile; CHANNEL_COUNT],
            duties: [None; CHANNEL_COUNT],
            received: 0,
            rejected: 0,
        }
    }

    /// Override the pulse window of a single output (e.g. the gripper,
    /// whose travel is narrower than the other joints).
    pub fn with_profile(mut self, channel: JointChannel, profile: PulseProfile) -> Self {
        self.profiles[channel.index()] = profile;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decode and apply one write.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Protocol`] for non-UTF-8 payloads and for tokens
    /// that fail channel or range validation.  The outputs are left as they
    /// were.
    pub fn receive(&mut self, payload: &[u8]) -> Result<ServoUpdate, ArmError> {
        let decoded = std::str::from_utf8(payload)
            .map_err(|e| ArmError::Protocol(format!("payload is not UTF-8: {e}")))
            .and_then(WireCommand::decode);
        let command = match decoded {
            Ok(cmd) => cmd,
            Err(e) => {
                self.rejected += 1;
                warn!(peripheral = %self.name, error = %e, "rejected token");
                return Err(e);
            }
        };

        let duty = self.profiles[command.channel.index()].duty(command.value);
        self.duties[command.channel.index()] = Some(duty);
        self.received += 1;
        debug!(peripheral = %self.name, channel = %command.channel, value = command.value, duty, "RX");
        Ok(ServoUpdate {
            channel: command.channel,
            value: command.value,
            duty,
        })
    }

    /// Duty currently driven on `channel`, or `None` if it was never set.
    pub fn duty(&self, channel: JointChannel) -> Option<u16> {
        self.duties[channel.index()]
    }

    /// Number of tokens applied successfully.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Number of tokens rejected by validation.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
