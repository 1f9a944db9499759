//! Input/output channel negotiation.
//!
//! A unit declares the `(in, out)` pairs it supports. Negative counts are
//! wildcards: `-1` means "any count, equal to the other side", any other
//! negative value means "any count". Both are resolved to stereo before
//! matching, since the host has no better information about what it needs.

use serde::{Deserialize, Serialize};

/// One declared `(in, out)` pair, as reported by the unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub inputs: i16,
    pub outputs: i16,
}

impl ChannelInfo {
    pub const fn new(inputs: i16, outputs: i16) -> Self {
        Self { inputs, outputs }
    }

    /// Concrete pair with wildcards resolved to stereo.
    pub fn resolve(self) -> (u32, u32) {
        let (ic, oc) = match (self.inputs < 0, self.outputs < 0) {
            (true, false) => (2, self.outputs),
            (false, true) => (self.inputs, 2),
            (true, true) => (2, 2),
            (false, false) => (self.inputs, self.outputs),
        };
        (ic as u32, oc as u32)
    }
}

/// Concrete channel counts chosen for an instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub inputs: u32,
    pub outputs: u32,
}

impl ChannelConfig {
    pub const fn new(inputs: u32, outputs: u32) -> Self {
        Self { inputs, outputs }
    }

    pub const fn stereo() -> Self {
        Self::new(2, 2)
    }

    pub const fn mono() -> Self {
        Self::new(1, 1)
    }

    pub fn effect_type(&self) -> EffectType {
        match (self.inputs, self.outputs) {
            (0, 0) => EffectType::None,
            (0, _) => EffectType::Generate,
            (_, 0) => EffectType::Analyze,
            _ => EffectType::Process,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::stereo()
    }
}

/// What kind of effect a channel layout implies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectType {
    None,
    Generate,
    Analyze,
    Process,
}

/// Fixed preference order; the first pattern the unit supports wins.
const PREFERENCE: [(u32, u32); 8] = [
    (2, 2), // stereo -> stereo
    (1, 1), // mono -> mono
    (1, 2), // mono -> stereo
    (2, 1), // stereo -> mono
    (0, 1), // generator, mono
    (0, 2), // generator, stereo
    (2, 0), // analyzer, stereo
    (1, 0), // analyzer, mono
];

/// Choose concrete channel counts from a unit's declared pairs.
///
/// `None` (the unit publishes no table) and tables matching none of the
/// preferred patterns both fall back to stereo/stereo.
pub fn negotiate(supported: Option<&[ChannelInfo]>) -> ChannelConfig {
    let Some(supported) = supported else {
        return ChannelConfig::stereo();
    };

    let resolved: Vec<(u32, u32)> = supported.iter().map(|info| info.resolve()).collect();

    PREFERENCE
        .iter()
        .find(|pattern| resolved.contains(pattern))
        .map(|&(inputs, outputs)| ChannelConfig::new(inputs, outputs))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pairs(list: &[(i16, i16)]) -> Vec<ChannelInfo> {
        list.iter().map(|&(i, o)| ChannelInfo::new(i, o)).collect()
    }

    #[test]
    fn test_no_table_is_stereo() {
        assert_eq!(negotiate(None), ChannelConfig::stereo());
        assert_eq!(negotiate(Some(&[])), ChannelConfig::stereo());
    }

    #[test]
    fn test_exact_stereo() {
        assert_eq!(negotiate(Some(&pairs(&[(2, 2)]))), ChannelConfig::new(2, 2));
    }

    #[test]
    fn test_priority_order() {
        // stereo beats mono even when listed later
        let table = pairs(&[(1, 1), (2, 2)]);
        assert_eq!(negotiate(Some(&table)), ChannelConfig::new(2, 2));

        let table = pairs(&[(1, 2), (1, 1)]);
        assert_eq!(negotiate(Some(&table)), ChannelConfig::new(1, 1));

        let table = pairs(&[(2, 1), (1, 2)]);
        assert_eq!(negotiate(Some(&table)), ChannelConfig::new(1, 2));

        let table = pairs(&[(0, 2), (0, 1)]);
        assert_eq!(negotiate(Some(&table)), ChannelConfig::new(0, 1));

        let table = pairs(&[(1, 0), (2, 0)]);
        assert_eq!(negotiate(Some(&table)), ChannelConfig::new(2, 0));
    }

    #[test]
    fn test_wildcards_resolve_to_stereo() {
        assert_eq!(negotiate(Some(&pairs(&[(-1, -1)]))), ChannelConfig::new(2, 2));
        assert_eq!(negotiate(Some(&pairs(&[(-2, 1)]))), ChannelConfig::new(2, 1));
        assert_eq!(negotiate(Some(&pairs(&[(1, -1)]))), ChannelConfig::new(1, 2));
        assert_eq!(negotiate(Some(&pairs(&[(0, -2)]))), ChannelConfig::new(0, 2));
    }

    #[test]
    fn test_unmatched_table_defaults_to_stereo() {
        let table = pairs(&[(4, 4), (6, 8)]);
        assert_eq!(negotiate(Some(&table)), ChannelConfig::stereo());
    }

    #[test]
    fn test_effect_type() {
        assert_eq!(ChannelConfig::new(0, 0).effect_type(), EffectType::None);
        assert_eq!(ChannelConfig::new(0, 2).effect_type(), EffectType::Generate);
        assert_eq!(ChannelConfig::new(2, 0).effect_type(), EffectType::Analyze);
        assert_eq!(ChannelConfig::new(1, 2).effect_type(), EffectType::Process);
    }

    proptest! {
        #[test]
        fn prop_negotiation_is_deterministic(
            table in prop::collection::vec((-2i16..9, -2i16..9), 0..12)
        ) {
            let table = pairs(&table);
            let first = negotiate(Some(&table));
            prop_assert_eq!(first, negotiate(Some(&table)));
            prop_assert!(first.inputs <= 2 && first.outputs <= 2);
        }
    }
}
