//! Joint channels and the joint-target vector.
//!
//! The arm has a closed set of [`JointChannel`]s.  [`JointTargets`] holds one
//! `u16` per channel and is never empty: it starts at the rest pose and every
//! later value comes from merging a [`PartialTargets`] update on top of it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ArmError;

/// Number of actuated channels on the arm.
pub const CHANNEL_COUNT: usize = 5;

/// One actuated degree of freedom of the arm, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointChannel {
    /// Rotating base (yaw).
    Base,
    /// Shoulder lift.
    Bottom,
    /// Elbow.
    Middle,
    /// Wrist.
    Top,
    /// Gripper.
    Hand,
}

impl JointChannel {
    /// Every channel in declaration order.
    pub const ALL: [JointChannel; CHANNEL_COUNT] = [
        JointChannel::Base,
        JointChannel::Bottom,
        JointChannel::Middle,
        JointChannel::Top,
        JointChannel::Hand,
    ];

    /// Zero-based position of this channel in [`JointChannel::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short symbolic name used on the wire (`"base"`, `"hand"`, …).
    pub fn name(self) -> &'static str {
        match self {
            JointChannel::Base => "base",
            JointChannel::Bottom => "bottom",
            JointChannel::Middle => "middle",
            JointChannel::Top => "top",
            JointChannel::Hand => "hand",
        }
    }

    /// Look up a channel by its index, returning `None` when out of range.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for JointChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JointChannel {
    type Err = ArmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|ch| ch.name() == s)
            .ok_or_else(|| ArmError::Protocol(format!("unknown joint channel '{s}'")))
    }
}

/// Last-known-good target for every channel.
///
/// Immutable value type: updates produce a new vector via
/// [`JointTargets::merge`] or [`JointTargets::with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointTargets {
    values: [u16; CHANNEL_COUNT],
}

impl JointTargets {
    /// Pose the arm holds before the first hand observation.
    pub const REST_POSE: JointTargets = JointTargets {
        values: [36463, 44593, 500, 52230, 0],
    };

    /// Build a vector from explicit per-channel values (declaration order).
    pub const fn from_values(values: [u16; CHANNEL_COUNT]) -> Self {
        Self { values }
    }

    /// Current target of `channel`.
    pub fn get(&self, channel: JointChannel) -> u16 {
        self.values[channel.index()]
    }

    /// Copy of `self` with `channel` set to `value`.
    pub fn with(mut self, channel: JointChannel, value: u16) -> Self {
        self.values[channel.index()] = value;
        self
    }

    /// Overlay `update` on `self`: channels present in the update take the
    /// new value, absent channels keep their previous value.
    pub fn merge(&self, update: &PartialTargets) -> Self {
        let mut next = *self;
        for (channel, value) in update.iter() {
            next.values[channel.index()] = value;
        }
        next
    }

    /// Iterate `(channel, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (JointChannel, u16)> + '_ {
        JointChannel::ALL.iter().map(|&ch| (ch, self.get(ch)))
    }

    /// Raw values in declaration order.
    pub fn values(&self) -> [u16; CHANNEL_COUNT] {
        self.values
    }
}

impl Default for JointTargets {
    fn default() -> Self {
        Self::REST_POSE
    }
}

/// Sparse update produced by the target mapper for a single frame.
///
/// A channel is `None` when the frame carried no information for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartialTargets {
    values: [Option<u16>; CHANNEL_COUNT],
}

impl PartialTargets {
    /// An update that touches no channel.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set `channel` to `value` in this update.
    pub fn set(&mut self, channel: JointChannel, value: u16) {
        self.values[channel.index()] = Some(value);
    }

    /// Builder-style variant of [`PartialTargets::set`].
    pub fn with(mut self, channel: JointChannel, value: u16) -> Self {
        self.set(channel, value);
        self
    }

    /// Value carried for `channel`, if any.
    pub fn get(&self, channel: JointChannel) -> Option<u16> {
        self.values[channel.index()]
    }

    /// `true` when no channel is present.
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Iterate the present `(channel, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (JointChannel, u16)> + '_ {
        JointChannel::ALL
            .iter()
            .filter_map(|&ch| self.get(ch).map(|v| (ch, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_indices_follow_declaration_order() {
        for (i, ch) in JointChannel::ALL.iter().enumerate() {
            assert_eq!(ch.index(), i);
            assert_eq!(JointChannel::from_index(i), Some(*ch));
        }
        assert_eq!(JointChannel::from_index(CHANNEL_COUNT), None);
    }

    #[test]
    fn channel_parses_from_wire_name() {
        assert_eq!("bottom".parse::<JointChannel>().unwrap(), JointChannel::Bottom);
        assert!(matches!(
            "elbow".parse::<JointChannel>(),
            Err(ArmError::Protocol(_))
        ));
    }

    #[test]
    fn channel_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&JointChannel::Hand).unwrap();
        assert_eq!(json, "\"hand\"");
    }

    #[test]
    fn default_targets_are_the_rest_pose() {
        let t = JointTargets::default();
        assert_eq!(t.get(JointChannel::Base), 36463);
        assert_eq!(t.get(JointChannel::Bottom), 44593);
        assert_eq!(t.get(JointChannel::Middle), 500);
        assert_eq!(t.get(JointChannel::Top), 52230);
        assert_eq!(t.get(JointChannel::Hand), 0);
    }

    #[test]
    fn merge_keeps_absent_channels() {
        let base = JointTargets::REST_POSE;
        let update = PartialTargets::empty().with(JointChannel::Base, 7);
        let merged = base.merge(&update);
        assert_eq!(merged.get(JointChannel::Base), 7);
        assert_eq!(merged.get(JointChannel::Top), 52230);
        // The original snapshot is untouched.
        assert_eq!(base.get(JointChannel::Base), 36463);
    }

    #[test]
    fn merge_sequence_yields_last_value_per_channel() {
        let updates = [
            PartialTargets::empty().with(JointChannel::Base, 1),
            PartialTargets::empty(),
            PartialTargets::empty()
                .with(JointChannel::Bottom, 2)
                .with(JointChannel::Base, 3),
            PartialTargets::empty().with(JointChannel::Hand, 65535),
            PartialTargets::empty(),
        ];
        let merged = updates
            .iter()
            .fold(JointTargets::REST_POSE, |acc, u| acc.merge(u));

        for ch in JointChannel::ALL {
            let expected = updates
                .iter()
                .rev()
                .find_map(|u| u.get(ch))
                .unwrap_or(JointTargets::REST_POSE.get(ch));
            assert_eq!(merged.get(ch), expected, "channel {ch}");
        }
    }

    #[test]
    fn partial_iter_skips_absent_channels() {
        let update = PartialTargets::empty()
            .with(JointChannel::Hand, 9)
            .with(JointChannel::Base, 4);
        let pairs: Vec<_> = update.iter().collect();
        assert_eq!(pairs, vec![(JointChannel::Base, 4), (JointChannel::Hand, 9)]);
        assert!(!update.is_empty());
        assert!(PartialTargets::empty().is_empty());
    }
}
