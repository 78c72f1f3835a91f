//! Interrupt line management
//!
//! Multiplexes any number of input pins onto a small, fixed pool of
//! hardware interrupt lines. Lines are organised in groups of
//! `CHANNELS_PER_GROUP`; a pin can only be served by a line of the group
//! covering its pin number.
//!
//! - [`table`]: which (port, pin) owns which line
//! - [`allocator`]: acquire/release plus the register programming sequence
//! - [`isr`]: interrupt-context handlers posting notifications
//! - [`soft`]: atomic register model of a line block

pub mod allocator;
pub mod isr;
pub mod soft;
pub mod table;

pub use allocator::LineAllocator;
pub use isr::Vector;
pub use soft::SoftExti;
pub use table::ChannelTable;

use core::fmt;

use crate::types::{ChannelId, EdgeConfig, Pin, Port};

/// Register-level access to an external interrupt line block
///
/// Methods take `&self`: the registers are shared between the main loop
/// (configuration) and interrupt context (`pending`, `enabled`,
/// `clear_pending`), so implementations must make each call a single
/// atomic register access.
pub trait ExtiController {
    /// Latched trigger flags, one bit per line
    fn pending(&self) -> u32;

    /// Enabled trigger flags, one bit per line
    fn enabled(&self) -> u32;

    /// Clear the latched flags in `mask`
    fn clear_pending(&self, mask: u32);

    /// Enable or disable the trigger of one line
    fn set_enabled(&self, channel: ChannelId, enabled: bool);

    /// Route a line to (port, pin) with the given edge sensitivity
    ///
    /// Some parts falsely latch the line's pending flag when this is
    /// written, so callers disable the line first.
    fn route(&self, channel: ChannelId, port: Port, pin: Pin, edges: EdgeConfig);
}

impl<T: ExtiController + ?Sized> ExtiController for &T {
    fn pending(&self) -> u32 {
        (**self).pending()
    }

    fn enabled(&self) -> u32 {
        (**self).enabled()
    }

    fn clear_pending(&self, mask: u32) {
        (**self).clear_pending(mask)
    }

    fn set_enabled(&self, channel: ChannelId, enabled: bool) {
        (**self).set_enabled(channel, enabled)
    }

    fn route(&self, channel: ChannelId, port: Port, pin: Pin, edges: EdgeConfig) {
        (**self).route(channel, port, pin, edges)
    }
}

/// Interrupt line allocation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Every line of the pin's group is taken; release one and retry
    GroupExhausted { group: u8 },
    /// Pin number beyond the ranges covered by the line groups
    PinOutOfRange { pin: Pin },
    /// No line is currently mapped to this pin
    NotMapped { port: Port, pin: Pin },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::GroupExhausted { group } => {
                write!(f, "all interrupt lines of group {} are in use", group)
            }
            Error::PinOutOfRange { pin } => {
                write!(f, "pin {} is not covered by any interrupt line group", pin)
            }
            Error::NotMapped { port, pin } => {
                write!(f, "no interrupt line mapped to {:?} pin {}", port, pin)
            }
        }
    }
}
