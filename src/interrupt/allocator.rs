//! Interrupt line allocator
//!
//! Owns the channel table and programs the line registers. Every change
//! of routing or edge selection follows the same order: disable the line,
//! write the configuration, clear whatever got latched, then enable. Some
//! parts latch a false trigger when the selection registers are written,
//! and that flag must be gone before the line can fire.
//!
//! With a notification queue attached, a released line drains before it
//! can serve another pin: flags for it that were already posted must reach
//! the decoder while the line still resolves to no owner.

use super::{ChannelTable, Error, ExtiController};
use crate::config::{CHANNELS_PER_GROUP, CHANNEL_COUNT};
use crate::signal::Backlog;
use crate::types::{ChannelId, EdgeConfig, Pin, Port};

/// Main-loop side owner of the interrupt lines
///
/// `Q` is the queue the line vectors post to; `()` when there is none.
pub struct LineAllocator<
    H,
    Q = (),
    const N: usize = CHANNEL_COUNT,
    const G: usize = CHANNELS_PER_GROUP,
> {
    table: ChannelTable<N, G>,
    hw: H,
    backlog: Q,
}

impl<H: ExtiController, const N: usize, const G: usize> LineAllocator<H, (), N, G> {
    pub fn new(hw: H) -> Self {
        Self::with_backlog(hw, ())
    }
}

impl<H: ExtiController, Q: Backlog, const N: usize, const G: usize> LineAllocator<H, Q, N, G> {
    /// Allocator whose lines post into `backlog`
    pub fn with_backlog(hw: H, backlog: Q) -> Self {
        Self {
            table: ChannelTable::new(),
            hw,
            backlog,
        }
    }

    /// Claim a line for (port, pin) and program its edge sensitivity
    ///
    /// Calling this again for the same pin reprograms the line it already
    /// owns. Fails with [`Error::GroupExhausted`] when the pin's group is
    /// full; release another pin of that group and retry.
    pub fn configure(
        &mut self,
        port: Port,
        pin: Pin,
        edges: EdgeConfig,
        enable: bool,
    ) -> Result<ChannelId, Error> {
        self.table.settle(self.backlog.delivered());
        let channel = match self.table.acquire(port, pin) {
            Ok(channel) => channel,
            Err(e) => {
                warn!("No interrupt line for {:?} pin {}: {:?}", port, pin, e);
                return Err(e);
            }
        };

        self.hw.set_enabled(channel, false);
        self.hw.route(channel, port, pin, edges);
        if enable {
            self.hw.clear_pending(channel.mask());
            self.hw.set_enabled(channel, true);
        }

        debug!(
            "Line {} -> {:?} pin {} (rising={}, falling={}, enabled={})",
            channel.index(),
            port,
            pin,
            edges.rising,
            edges.falling,
            enable
        );
        Ok(channel)
    }

    /// Enable or disable the line mapped to (port, pin)
    ///
    /// Enabling clears any flag latched while the line was disabled.
    pub fn set_enabled(&mut self, port: Port, pin: Pin, enabled: bool) -> Result<ChannelId, Error> {
        let channel = self
            .table
            .find(port, pin)
            .ok_or(Error::NotMapped { port, pin })?;

        if enabled {
            self.hw.clear_pending(channel.mask());
            self.hw.set_enabled(channel, true);
        } else {
            self.hw.set_enabled(channel, false);
        }
        Ok(channel)
    }

    /// Drop a latched trigger of the line mapped to (port, pin)
    pub fn clear_pending(&mut self, port: Port, pin: Pin) {
        if let Some(channel) = self.table.find(port, pin) {
            self.hw.clear_pending(channel.mask());
        }
    }

    /// Free the line mapped to (port, pin)
    ///
    /// The line is disabled and its flag cleared first. Notifications
    /// already posted for it are dropped by the decoder, and the line is
    /// not reused until the queue has delivered them.
    pub fn release(&mut self, port: Port, pin: Pin) {
        let Some(channel) = self.table.find(port, pin) else {
            return;
        };

        self.hw.set_enabled(channel, false);
        self.hw.clear_pending(channel.mask());

        // Read after disabling: later posts cannot carry this line
        let posted = self.backlog.posted();
        if self.backlog.delivered() == posted {
            self.table.release(port, pin);
        } else {
            self.table.retire(port, pin, posted);
        }
        debug!("Line {} released from {:?} pin {}", channel.index(), port, pin);
    }

    /// Owner of a line
    pub fn lookup(&self, channel: ChannelId) -> Option<(Port, Pin)> {
        self.table.lookup(channel)
    }

    /// Whether the line mapped to (port, pin) currently has its trigger enabled
    pub fn is_enabled(&self, port: Port, pin: Pin) -> Result<bool, Error> {
        let channel = self
            .table
            .find(port, pin)
            .ok_or(Error::NotMapped { port, pin })?;
        Ok(self.hw.enabled() & channel.mask() != 0)
    }

    /// Whether a released line is still waiting for its notifications
    pub fn is_draining(&self, channel: ChannelId) -> bool {
        self.table.is_draining(channel)
    }

    pub fn table(&self) -> &ChannelTable<N, G> {
        &self.table
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::{isr, SoftExti, Vector};
    use crate::signal::{decode, SignalQueue};
    use crate::types::PinEdge;
    use core::cell::RefCell;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Disable(u8),
        Enable(u8),
        Route(u8),
        Clear(u32),
    }

    /// Records register writes in order
    #[derive(Default)]
    struct Recorder {
        ops: RefCell<Vec<Op>>,
    }

    impl ExtiController for Recorder {
        fn pending(&self) -> u32 {
            0
        }

        fn enabled(&self) -> u32 {
            0
        }

        fn clear_pending(&self, mask: u32) {
            self.ops.borrow_mut().push(Op::Clear(mask));
        }

        fn set_enabled(&self, channel: ChannelId, enabled: bool) {
            let i = channel.index() as u8;
            self.ops
                .borrow_mut()
                .push(if enabled { Op::Enable(i) } else { Op::Disable(i) });
        }

        fn route(&self, channel: ChannelId, _port: Port, _pin: Pin, _edges: EdgeConfig) {
            self.ops.borrow_mut().push(Op::Route(channel.index() as u8));
        }
    }

    #[test]
    fn configure_disables_routes_clears_then_enables() {
        let mut lines = LineAllocator::<_, (), 16, 4>::new(Recorder::default());
        let channel = lines
            .configure(Port::Bank0, 6, EdgeConfig::FALLING, true)
            .unwrap();
        assert_eq!(channel.index(), 4);
        assert_eq!(
            &lines.hardware().ops.borrow()[..],
            &[Op::Disable(4), Op::Route(4), Op::Clear(1 << 4), Op::Enable(4)]
        );
    }

    #[test]
    fn configure_without_enable_leaves_line_off() {
        let mut lines = LineAllocator::<_, (), 16, 4>::new(Recorder::default());
        lines
            .configure(Port::Bank0, 0, EdgeConfig::RISING, false)
            .unwrap();
        assert_eq!(
            &lines.hardware().ops.borrow()[..],
            &[Op::Disable(0), Op::Route(0)]
        );
    }

    #[test]
    fn reconfigure_glitch_never_reaches_enabled_flags() {
        let exti = SoftExti::<16>::new();
        exti.set_route_glitch(true);
        let mut lines = LineAllocator::<_, (), 16, 4>::new(&exti);

        let channel = lines
            .configure(Port::Bank0, 9, EdgeConfig::FALLING, true)
            .unwrap();
        assert_eq!(exti.pending() & exti.enabled(), 0);

        // Switching sensitivity on a live line
        lines
            .configure(Port::Bank0, 9, EdgeConfig::RISING, true)
            .unwrap();
        assert_eq!(exti.pending() & exti.enabled(), 0);
        assert_eq!(exti.enabled(), channel.mask());
    }

    #[test]
    fn set_enabled_requires_mapping() {
        let exti = SoftExti::<16>::new();
        let mut lines = LineAllocator::<_, (), 16, 4>::new(&exti);
        assert_eq!(
            lines.set_enabled(Port::Bank0, 1, true),
            Err(Error::NotMapped {
                port: Port::Bank0,
                pin: 1
            })
        );
    }

    #[test]
    fn enabling_discards_flags_latched_while_disabled() {
        let exti = SoftExti::<16>::new();
        let mut lines = LineAllocator::<_, (), 16, 4>::new(&exti);
        let channel = lines
            .configure(Port::Bank0, 1, EdgeConfig::BOTH, true)
            .unwrap();

        lines.set_enabled(Port::Bank0, 1, false).unwrap();
        assert_eq!(lines.is_enabled(Port::Bank0, 1), Ok(false));
        exti.pin_edge(Port::Bank0, 1, true);
        assert_eq!(exti.pending(), channel.mask());

        lines.set_enabled(Port::Bank0, 1, true).unwrap();
        assert_eq!(exti.pending(), 0);
        assert_eq!(lines.is_enabled(Port::Bank0, 1), Ok(true));
    }

    #[test]
    fn clear_pending_targets_mapped_line() {
        let exti = SoftExti::<16>::new();
        let mut lines = LineAllocator::<_, (), 16, 4>::new(&exti);
        lines
            .configure(Port::Bank0, 2, EdgeConfig::RISING, true)
            .unwrap();
        exti.pin_edge(Port::Bank0, 2, true);

        lines.clear_pending(Port::Qspi, 2);
        assert_ne!(exti.pending(), 0);
        lines.clear_pending(Port::Bank0, 2);
        assert_eq!(exti.pending(), 0);
    }

    #[test]
    fn release_quiesces_and_frees_line() {
        let exti = SoftExti::<16>::new();
        let mut lines = LineAllocator::<_, (), 16, 4>::new(&exti);
        for pin in 12..16 {
            lines
                .configure(Port::Bank0, pin, EdgeConfig::FALLING, true)
                .unwrap();
        }
        assert_eq!(
            lines.configure(Port::Qspi, 12, EdgeConfig::FALLING, true),
            Err(Error::GroupExhausted { group: 3 })
        );

        exti.pin_edge(Port::Bank0, 14, false);
        lines.release(Port::Bank0, 14);
        assert_eq!(exti.enabled() & (1 << 14), 0);
        assert_eq!(exti.pending(), 0);

        let reused = lines
            .configure(Port::Qspi, 12, EdgeConfig::FALLING, true)
            .unwrap();
        assert_eq!(reused.index(), 14);
        assert_eq!(lines.lookup(reused), Some((Port::Qspi, 12)));
    }

    #[test]
    fn released_line_drains_before_serving_another_pin() {
        let exti = SoftExti::<16>::new();
        let queue = SignalQueue::<4>::new();
        let mut lines = LineAllocator::<_, _, 16, 4>::with_backlog(&exti, &queue);
        let old = lines
            .configure(Port::Bank0, 5, EdgeConfig::BOTH, true)
            .unwrap();

        exti.pin_edge(Port::Bank0, 5, true);
        isr::service(&exti, Vector::of(old), &queue).unwrap();
        lines.release(Port::Bank0, 5);
        assert!(lines.is_draining(old));

        // Pin 6 shares the group and must not inherit the queued flag
        let new = lines
            .configure(Port::Bank0, 6, EdgeConfig::BOTH, true)
            .unwrap();
        assert_ne!(new, old);

        let mut edges: Vec<PinEdge> = Vec::new();
        while let Some(notification) = queue.try_receive() {
            let mut sampler = |_: Port, _: Pin| true;
            if let crate::signal::Decoded::Pins(pins) =
                decode(notification.into_word(), lines.table(), &mut sampler)
            {
                edges.extend(pins);
            }
        }
        assert!(edges.is_empty(), "stale flag decoded as {:?}", edges);

        // Delivered: the line is free again on the next claim
        let reused = lines
            .configure(Port::Qspi, 7, EdgeConfig::BOTH, true)
            .unwrap();
        assert_eq!(reused, old);
    }

    #[test]
    fn full_group_waits_for_draining_line() {
        let exti = SoftExti::<16>::new();
        let queue = SignalQueue::<4>::new();
        let mut lines = LineAllocator::<_, _, 16, 4>::with_backlog(&exti, &queue);
        for pin in 0..4 {
            lines
                .configure(Port::Bank0, pin, EdgeConfig::FALLING, true)
                .unwrap();
        }

        exti.pin_edge(Port::Bank0, 2, false);
        isr::on_even(&exti, &queue).unwrap();
        lines.release(Port::Bank0, 2);
        assert_eq!(
            lines.configure(Port::Qspi, 0, EdgeConfig::FALLING, true),
            Err(Error::GroupExhausted { group: 0 })
        );

        queue.try_receive().unwrap();
        assert_eq!(
            lines
                .configure(Port::Qspi, 0, EdgeConfig::FALLING, true)
                .map(|ch| ch.index()),
            Ok(2)
        );
    }

    #[test]
    fn release_with_idle_queue_frees_at_once() {
        let exti = SoftExti::<16>::new();
        let queue = SignalQueue::<4>::new();
        let mut lines = LineAllocator::<_, _, 16, 4>::with_backlog(&exti, &queue);
        let channel = lines
            .configure(Port::Bank0, 9, EdgeConfig::RISING, true)
            .unwrap();
        lines.release(Port::Bank0, 9);
        assert!(!lines.is_draining(channel));
        assert_eq!(lines.table().in_use(), 0);
    }
}
