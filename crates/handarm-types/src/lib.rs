//! `handarm-types` – shared vocabulary of the hand-tracking arm controller.
//!
//! Every other crate in the workspace speaks in these types: joint channels
//! and target vectors, hand landmarks, wire commands, peripheral handles, and
//! the single [`ArmError`] enum.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod joint;
pub mod landmark;
pub mod wire;

pub use joint::{CHANNEL_COUNT, JointChannel, JointTargets, PartialTargets};
pub use landmark::{HandLandmark, HandLandmarks, LANDMARK_COUNT, Landmark};
pub use wire::{ChannelIdFormat, WireCommand};

/// Identifies a discovered peripheral.  Immutable once obtained.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeripheralHandle {
    /// Advertised local name, e.g. `"mpy-uart"`.
    pub name: String,
    /// Backend-specific address or identifier used to reconnect.
    pub address: String,
}

impl fmt::Display for PeripheralHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.address)
    }
}

/// Lifecycle of one connection.
///
/// `Disconnected → Connecting → Connected → Disconnected`.  `Disconnected` is
/// terminal: a dropped link is never revived inside the same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// Global error type spanning radio, link, camera, and inference failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArmError {
    #[error("Radio adapter error: {0}")]
    Adapter(String),

    #[error("Connect to {peripheral} failed: {details}")]
    Connect { peripheral: String, details: String },

    #[error("Send on channel {channel} failed: {details}")]
    Send { channel: JointChannel, details: String },

    #[error("Session is closed")]
    SessionClosed,

    #[error("Camera capture failed: {0}")]
    Capture(String),

    #[error("Pose inference failed: {0}")]
    Inference(String),

    #[error("Wire protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_error_display() {
        let err = ArmError::Send {
            channel: JointChannel::Base,
            details: "gatt write timed out".to_string(),
        };
        assert!(err.to_string().contains("base"));
        assert!(err.to_string().contains("timed out"));

        let err = ArmError::Connect {
            peripheral: "mpy-uart".to_string(),
            details: "rejected".to_string(),
        };
        assert!(err.to_string().contains("mpy-uart"));
    }

    #[test]
    fn arm_error_serialization_roundtrip() {
        let err = ArmError::Capture("device unplugged".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: ArmError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }

    #[test]
    fn only_disconnected_is_terminal() {
        assert!(ConnectionState::Disconnected.is_terminal());
        assert!(!ConnectionState::Connecting.is_terminal());
        assert!(!ConnectionState::Connected.is_terminal());
    }

    #[test]
    fn connection_state_has_no_idle_variant() {
        assert!(serde_json::from_str::<ConnectionState>("\"Idle\"").is_err());
        let connecting: ConnectionState = serde_json::from_str("\"Connecting\"").unwrap();
        assert_eq!(connecting, ConnectionState::Connecting);
    }

    #[test]
    fn peripheral_handle_display() {
        let handle = PeripheralHandle {
            name: "mpy-uart".to_string(),
            address: "28:CD:C1:00:00:01".to_string(),
        };
        assert_eq!(handle.to_string(), "mpy-uart [28:CD:C1:00:00:01]");
    }
}
