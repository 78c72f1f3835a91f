//! Channel table
//!
//! Fixed array of interrupt lines, each free, owned by one (port, pin), or
//! draining. Only the main loop touches the table; interrupt context works
//! on hardware flags alone.
//!
//! A draining line was released while notifications carrying its flag may
//! still be queued. It resolves to no owner and is not handed out again
//! until the queue has delivered everything posted before the release, so
//! a late flag can never be read as an edge of the next owner.

use super::Error;
use crate::config::{CHANNELS_PER_GROUP, CHANNEL_COUNT};
use crate::types::{ChannelId, Pin, Port};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Free,
    Owned(Port, Pin),
    /// Released; reusable once the queue's delivery count reaches `until`
    Draining { until: u32 },
}

/// Line ownership for `N` lines split into groups of `G`
///
/// Pins `g*G .. g*G+G` can only use lines `g*G .. g*G+G`. With `G = 1`
/// this degenerates to hardware where line `i` serves pin `i`.
#[derive(Debug, Clone)]
pub struct ChannelTable<const N: usize = CHANNEL_COUNT, const G: usize = CHANNELS_PER_GROUP> {
    slots: [Slot; N],
}

impl<const N: usize, const G: usize> ChannelTable<N, G> {
    const LAYOUT_OK: () = assert!(G > 0 && N % G == 0 && N < 32);

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::LAYOUT_OK;
        Self {
            slots: [Slot::Free; N],
        }
    }

    /// Number of lines in the table
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Group serving `pin`
    pub fn group_of(pin: Pin) -> Result<usize, Error> {
        let group = pin as usize / G;
        if group < N / G {
            Ok(group)
        } else {
            Err(Error::PinOutOfRange { pin })
        }
    }

    fn group_range(group: usize) -> core::ops::Range<usize> {
        group * G..group * G + G
    }

    /// Line currently owned by (port, pin)
    pub fn find(&self, port: Port, pin: Pin) -> Option<ChannelId> {
        let group = Self::group_of(pin).ok()?;
        Self::group_range(group)
            .find(|&i| self.slots[i] == Slot::Owned(port, pin))
            .and_then(|i| ChannelId::new(i as u8))
    }

    /// Claim a line for (port, pin)
    ///
    /// Returns the line already owned by (port, pin) without touching the
    /// table, otherwise the lowest free line of the pin's group. Draining
    /// lines count as taken.
    pub fn acquire(&mut self, port: Port, pin: Pin) -> Result<ChannelId, Error> {
        let group = Self::group_of(pin)?;
        if let Some(channel) = self.find(port, pin) {
            return Ok(channel);
        }

        let free = Self::group_range(group)
            .find(|&i| self.slots[i] == Slot::Free)
            .ok_or(Error::GroupExhausted { group: group as u8 })?;

        self.slots[free] = Slot::Owned(port, pin);
        ChannelId::new(free as u8).ok_or(Error::PinOutOfRange { pin })
    }

    /// Free the line owned by (port, pin), returning it
    pub fn release(&mut self, port: Port, pin: Pin) -> Option<ChannelId> {
        let channel = self.find(port, pin)?;
        self.slots[channel.index()] = Slot::Free;
        Some(channel)
    }

    /// Release the line owned by (port, pin) into the draining state
    ///
    /// `until` is the queue's post count taken after the line was disabled.
    pub fn retire(&mut self, port: Port, pin: Pin, until: u32) -> Option<ChannelId> {
        let channel = self.find(port, pin)?;
        self.slots[channel.index()] = Slot::Draining { until };
        Some(channel)
    }

    /// Free every draining line whose notifications have all been delivered
    pub fn settle(&mut self, delivered: u32) {
        for slot in self.slots.iter_mut() {
            if let Slot::Draining { until } = *slot {
                // Wrapping counters: reached when `delivered - until` is not negative
                if (delivered.wrapping_sub(until) as i32) >= 0 {
                    *slot = Slot::Free;
                }
            }
        }
    }

    /// Whether a line is waiting for its queued notifications to drain
    pub fn is_draining(&self, channel: ChannelId) -> bool {
        matches!(self.slots.get(channel.index()), Some(Slot::Draining { .. }))
    }

    /// Owner of a line, `None` if the line is free, draining or out of range
    pub fn lookup(&self, channel: ChannelId) -> Option<(Port, Pin)> {
        match self.slots.get(channel.index()) {
            Some(&Slot::Owned(port, pin)) => Some((port, pin)),
            _ => None,
        }
    }

    /// Lines in use across the whole table
    pub fn in_use(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Owned(..)))
            .count()
    }

    /// Lines in use within one group
    pub fn group_in_use(&self, group: usize) -> usize {
        if group >= N / G {
            return 0;
        }
        self.slots[Self::group_range(group)]
            .iter()
            .filter(|slot| matches!(slot, Slot::Owned(..)))
            .count()
    }

    /// Iterate over `(line, port, pin)` for every line in use
    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, Port, Pin)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match *slot {
            Slot::Owned(port, pin) => Some((ChannelId::new(i as u8)?, port, pin)),
            _ => None,
        })
    }
}

impl<const N: usize, const G: usize> Default for ChannelTable<N, G> {
    fn default() -> Self {
        Self::new()
    }
}
