//! Interrupt-context bridge
//!
//! The line block raises two vectors: one for even lines, one for odd
//! lines. Each handler reads only the flags that are both pending and
//! enabled within its half, clears exactly those before anything else, and
//! posts them as one hardware notification. Nothing else is shared with
//! the main loop: the channel table is never touched from here.
//!
//! Flags of disabled lines stay latched; enabling a line clears them first
//! (see [`super::LineAllocator::set_enabled`]).

use super::ExtiController;
use crate::config::{EVEN_VECTOR_MASK, ODD_VECTOR_MASK};
use crate::signal::{ChannelMask, Notification, SignalQueue};
use crate::types::ChannelId;

/// One of the two line interrupt vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Vector {
    Even,
    Odd,
}

impl Vector {
    /// Vector serving a line
    pub const fn of(channel: ChannelId) -> Self {
        if channel.index() % 2 == 0 {
            Vector::Even
        } else {
            Vector::Odd
        }
    }

    /// Line flags owned by this vector
    pub const fn mask(self) -> u32 {
        match self {
            Vector::Even => EVEN_VECTOR_MASK,
            Vector::Odd => ODD_VECTOR_MASK,
        }
    }
}

/// Service one vector
///
/// Returns the notification that was handed to the queue, `None` when no
/// enabled flag was pending (a spurious entry). Never blocks.
pub fn service<H, const DEPTH: usize>(
    hw: &H,
    vector: Vector,
    queue: &SignalQueue<DEPTH>,
) -> Option<Notification>
where
    H: ExtiController + ?Sized,
{
    let flags = hw.pending() & hw.enabled() & vector.mask();
    if flags == 0 {
        return None;
    }
    hw.clear_pending(flags);

    let notification = Notification::Hardware(ChannelMask::new(flags));
    // A full queue merges hardware flags, so posting cannot lose them
    let _ = queue.post(notification);
    Some(notification)
}

/// Even-line vector entry
pub fn on_even<H, const DEPTH: usize>(hw: &H, queue: &SignalQueue<DEPTH>) -> Option<Notification>
where
    H: ExtiController + ?Sized,
{
    service(hw, Vector::Even, queue)
}

/// Odd-line vector entry
pub fn on_odd<H, const DEPTH: usize>(hw: &H, queue: &SignalQueue<DEPTH>) -> Option<Notification>
where
    H: ExtiController + ?Sized,
{
    service(hw, Vector::Odd, queue)
}
