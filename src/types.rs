//! Common types shared by the interrupt and signal modules
//!
//! Ports, pin numbers, channel identities and edge sensitivity.

use core::fmt;

/// Pin number within a port
pub type Pin = u8;

/// GPIO port a pin belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    /// User bank (GPIO0..GPIO29 on RP2040)
    Bank0,
    /// QSPI bank (flash interface pins)
    Qspi,
}

/// Identity of one hardware interrupt line
///
/// Always a valid index below the channel count of the table that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(u8);

impl ChannelId {
    /// Create a channel id, `None` if it does not fit a 32-bit flag word
    pub const fn new(index: u8) -> Option<Self> {
        if index < 31 {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Flag bit of this channel in pending/enable registers
    pub const fn mask(self) -> u32 {
        1 << self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line{}", self.0)
    }
}

/// Edge sensitivity of an interrupt line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EdgeConfig {
    pub rising: bool,
    pub falling: bool,
}

impl EdgeConfig {
    pub const NONE: Self = Self::new(false, false);
    pub const RISING: Self = Self::new(true, false);
    pub const FALLING: Self = Self::new(false, true);
    pub const BOTH: Self = Self::new(true, true);

    pub const fn new(rising: bool, falling: bool) -> Self {
        Self { rising, falling }
    }
}

/// A resolved pin event handed to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinEdge {
    pub port: Port,
    pub pin: Pin,
    /// Live level sampled at decode time, `true` = high
    pub level: bool,
}
