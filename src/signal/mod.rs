//! Tagged notifications
//!
//! Interrupt context hands work to the main loop as one 32-bit word. With
//! the reserved tag bit set, the low bits are channel trigger flags;
//! without it, the word is an opaque application signal. The word form is
//! what travels through the protocol stack's external-signal event, so it
//! is kept as the wire format while [`Notification`] is what code matches on.

pub mod decoder;
pub mod queue;

pub use decoder::{decode, dispatch, Decoded, InputBank, PinSampler, SignalHooks};
pub use queue::{Backlog, SignalQueue};

use crate::config::{CHANNEL_FLAG_MASK, HARDWARE_SIGNAL_TAG};
use crate::types::ChannelId;

/// Set of channel trigger flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelMask(u32);

impl ChannelMask {
    pub const EMPTY: Self = Self(0);

    /// Build a mask, dropping bits outside the channel range
    pub const fn new(bits: u32) -> Self {
        Self(bits & CHANNEL_FLAG_MASK)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, channel: ChannelId) -> bool {
        self.0 & channel.mask() != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Set channels in ascending index order
    pub fn iter(self) -> ChannelIter {
        ChannelIter(self.0)
    }
}

impl FromIterator<ChannelId> for ChannelMask {
    fn from_iter<I: IntoIterator<Item = ChannelId>>(iter: I) -> Self {
        Self::new(iter.into_iter().fold(0, |bits, ch| bits | ch.mask()))
    }
}

/// Ascending iterator over the channels of a [`ChannelMask`]
pub struct ChannelIter(u32);

impl Iterator for ChannelIter {
    type Item = ChannelId;

    fn next(&mut self) -> Option<ChannelId> {
        if self.0 == 0 {
            return None;
        }
        let index = self.0.trailing_zeros();
        self.0 &= self.0 - 1;
        ChannelId::new(index as u8)
    }
}

/// One unit of work posted towards the main loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    /// Channel trigger flags from an interrupt handler
    Hardware(ChannelMask),
    /// Opaque application signal, never has the tag bit set
    Application(u32),
}

impl Notification {
    /// Interpret a raw signal word
    pub const fn from_word(word: u32) -> Self {
        if word & HARDWARE_SIGNAL_TAG != 0 {
            Notification::Hardware(ChannelMask::new(word))
        } else {
            Notification::Application(word)
        }
    }

    /// Pack into a raw signal word
    ///
    /// Application values carrying the tag bit would be misread as
    /// hardware flags, so the bit is stripped.
    pub const fn into_word(self) -> u32 {
        match self {
            Notification::Hardware(mask) => mask.bits() | HARDWARE_SIGNAL_TAG,
            Notification::Application(raw) => raw & !HARDWARE_SIGNAL_TAG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn tagged_word_is_hardware() {
        let n = Notification::from_word(HARDWARE_SIGNAL_TAG | 0b10_1010);
        assert_eq!(n, Notification::Hardware(ChannelMask::new(0b10_1010)));
        assert_eq!(n.into_word(), HARDWARE_SIGNAL_TAG | 0b10_1010);
    }

    #[test]
    fn untagged_word_passes_through() {
        let n = Notification::from_word(0x1234_0042);
        assert_eq!(n, Notification::Application(0x1234_0042));
        assert_eq!(n.into_word(), 0x1234_0042);
    }

    #[test]
    fn tag_never_overlaps_channel_flags() {
        let mask = ChannelMask::new(u32::MAX);
        assert_eq!(mask.bits() & HARDWARE_SIGNAL_TAG, 0);
        assert_eq!(mask.iter().count(), crate::config::CHANNEL_COUNT);
    }

    #[test]
    fn mask_iterates_in_ascending_order() {
        let mask = ChannelMask::new((1 << 5) | (1 << 1) | (1 << 3));
        let seen: Vec<usize> = mask.iter().map(ChannelId::index).collect();
        assert_eq!(seen, [1, 3, 5]);
    }
}
