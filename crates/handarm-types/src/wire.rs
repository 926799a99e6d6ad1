//! Host → peripheral wire tokens.
//!
//! One write carries exactly one UTF-8 token `"<channel-id>:<value>"` with no
//! terminator.  `channel-id` is either the channel's symbolic name or its
//! decimal index, fixed for the life of a session by [`ChannelIdFormat`].
//! `value` is a decimal `u16`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ArmError;
use crate::joint::JointChannel;

/// How a channel is identified inside a wire token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelIdFormat {
    /// `"base:1200"`
    #[default]
    Name,
    /// `"0:1200"`
    Index,
}

impl fmt::Display for ChannelIdFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelIdFormat::Name => write!(f, "name"),
            ChannelIdFormat::Index => write!(f, "index"),
        }
    }
}

/// A single fire-and-forget actuator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireCommand {
    pub channel: JointChannel,
    pub value: u16,
}

impl WireCommand {
    pub fn new(channel: JointChannel, value: u16) -> Self {
        Self { channel, value }
    }

    /// Build a command from loosely typed input, validating the channel
    /// identifier and the value range before anything reaches the wire.
    pub fn checked(channel: &str, value: i64) -> Result<Self, ArmError> {
        let channel = parse_channel_id(channel)?;
        let value = u16::try_from(value).map_err(|_| {
            ArmError::Protocol(format!(
                "value {value} for channel '{channel}' is outside 0..=65535"
            ))
        })?;
        Ok(Self { channel, value })
    }

    /// Render the token for `format`.
    pub fn encode(&self, format: ChannelIdFormat) -> String {
        match format {
            ChannelIdFormat::Name => format!("{}:{}", self.channel.name(), self.value),
            ChannelIdFormat::Index => format!("{}:{}", self.channel.index(), self.value),
        }
    }

    /// Parse a token in either channel-id format.
    pub fn decode(token: &str) -> Result<Self, ArmError> {
        let (id, value) = token
            .split_once(':')
            .ok_or_else(|| ArmError::Protocol(format!("token '{token}' has no ':' separator")))?;
        let value: i64 = value
            .trim()
            .parse()
            .map_err(|e| ArmError::Protocol(format!("token '{token}' has a bad value: {e}")))?;
        Self::checked(id.trim(), value)
    }
}

/// Accept either a symbolic name or a decimal index.
fn parse_channel_id(id: &str) -> Result<JointChannel, ArmError> {
    if let Ok(index) = id.parse::<usize>() {
        return JointChannel::from_index(index)
            .ok_or_else(|| ArmError::Protocol(format!("channel index {index} is out of range")));
    }
    id.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_by_name() {
        let cmd = WireCommand::new(JointChannel::Base, 36463);
        assert_eq!(cmd.encode(ChannelIdFormat::Name), "base:36463");
    }

    #[test]
    fn encode_by_index() {
        let cmd = WireCommand::new(JointChannel::Hand, 65535);
        assert_eq!(cmd.encode(ChannelIdFormat::Index), "4:65535");
    }

    #[test]
    fn decode_accepts_both_formats() {
        assert_eq!(
            WireCommand::decode("top:52230").unwrap(),
            WireCommand::new(JointChannel::Top, 52230)
        );
        assert_eq!(
            WireCommand::decode("1:0").unwrap(),
            WireCommand::new(JointChannel::Bottom, 0)
        );
    }

    #[test]
    fn decode_rejects_out_of_range_value() {
        assert!(matches!(
            WireCommand::decode("base:65536"),
            Err(ArmError::Protocol(_))
        ));
        assert!(matches!(
            WireCommand::decode("base:-1"),
            Err(ArmError::Protocol(_))
        ));
    }

    #[test]
    fn decode_rejects_unknown_channel() {
        assert!(WireCommand::decode("elbow:10").is_err());
        assert!(WireCommand::decode("9:10").is_err());
    }

    #[test]
    fn decode_rejects_missing_separator() {
        assert!(matches!(
            WireCommand::decode("base"),
            Err(ArmError::Protocol(msg)) if msg.contains("separator")
        ));
    }

    #[test]
    fn checked_validates_before_encoding() {
        assert!(WireCommand::checked("middle", 70_000).is_err());
        let cmd = WireCommand::checked("middle", 500).unwrap();
        assert_eq!(cmd.encode(ChannelIdFormat::Name), "middle:500");
    }
}
