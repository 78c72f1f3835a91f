//! Atomic model of an external interrupt line block
//!
//! Holds the same registers as a hardware EXTI block: pending flags,
//! enable flags, rising/falling edge selects and a per-line pin route.
//! Edges are fed in with [`SoftExti::pin_edge`], either by board glue
//! watching real pins or by tests.
//!
//! Like hardware, an edge latches the pending flag of every line routed
//! to the pin whose edge select matches, whether or not the line is
//! enabled. `set_route_glitch(true)` reproduces parts that falsely latch
//! a line when its route/edge selection is written.

use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use super::ExtiController;
use crate::config::CHANNEL_COUNT;
use crate::types::{ChannelId, EdgeConfig, Pin, Port};

const ROUTE_VALID: u8 = 0x80;
const ROUTE_QSPI: u8 = 0x40;
const ROUTE_PIN_MASK: u8 = 0x3f;

fn encode_route(port: Port, pin: Pin) -> u8 {
    let port_bit = match port {
        Port::Bank0 => 0,
        Port::Qspi => ROUTE_QSPI,
    };
    ROUTE_VALID | port_bit | (pin & ROUTE_PIN_MASK)
}

fn decode_route(raw: u8) -> Option<(Port, Pin)> {
    if raw & ROUTE_VALID == 0 {
        return None;
    }
    let port = if raw & ROUTE_QSPI != 0 {
        Port::Qspi
    } else {
        Port::Bank0
    };
    Some((port, raw & ROUTE_PIN_MASK))
}

/// Register block for `N` interrupt lines
pub struct SoftExti<const N: usize = CHANNEL_COUNT> {
    pending: AtomicU32,
    enabled: AtomicU32,
    rising: AtomicU32,
    falling: AtomicU32,
    routes: [AtomicU8; N],
    route_glitch: AtomicBool,
}

impl<const N: usize> SoftExti<N> {
    const WIDTH_OK: () = assert!(N > 0 && N < 32);

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::WIDTH_OK;
        Self {
            pending: AtomicU32::new(0),
            enabled: AtomicU32::new(0),
            rising: AtomicU32::new(0),
            falling: AtomicU32::new(0),
            routes: [const { AtomicU8::new(0) }; N],
            route_glitch: AtomicBool::new(false),
        }
    }

    /// Latch a spurious pending flag whenever a route is written
    pub fn set_route_glitch(&self, glitch: bool) {
        self.route_glitch.store(glitch, Ordering::Relaxed);
    }

    /// Report a level transition on a pin
    ///
    /// `level` is the level after the edge. Returns the flags that were
    /// latched by this edge.
    pub fn pin_edge(&self, port: Port, pin: Pin, level: bool) -> u32 {
        let edge_select = if level {
            self.rising.load(Ordering::Relaxed)
        } else {
            self.falling.load(Ordering::Relaxed)
        };
        let target = encode_route(port, pin);

        let latched = self
            .routes
            .iter()
            .enumerate()
            .filter(|(i, route)| {
                edge_select & (1 << i) != 0 && route.load(Ordering::Relaxed) == target
            })
            .fold(0u32, |mask, (i, _)| mask | (1 << i));

        if latched != 0 {
            self.pending.fetch_or(latched, Ordering::AcqRel);
        }
        latched
    }

    /// Current route and edge selection of a line
    pub fn routing(&self, channel: ChannelId) -> Option<(Port, Pin, EdgeConfig)> {
        let route = self.routes.get(channel.index())?;
        let (port, pin) = decode_route(route.load(Ordering::Relaxed))?;
        let mask = channel.mask();
        let edges = EdgeConfig::new(
            self.rising.load(Ordering::Relaxed) & mask != 0,
            self.falling.load(Ordering::Relaxed) & mask != 0,
        );
        Some((port, pin, edges))
    }

    fn line_mask() -> u32 {
        ((1u64 << N) - 1) as u32
    }
}

impl<const N: usize> Default for SoftExti<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ExtiController for SoftExti<N> {
    fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    fn enabled(&self) -> u32 {
        self.enabled.load(Ordering::Acquire)
    }

    fn clear_pending(&self, mask: u32) {
        self.pending.fetch_and(!mask, Ordering::AcqRel);
    }

    fn set_enabled(&self, channel: ChannelId, enabled: bool) {
        let mask = channel.mask() & Self::line_mask();
        if enabled {
            self.enabled.fetch_or(mask, Ordering::AcqRel);
        } else {
            self.enabled.fetch_and(!mask, Ordering::AcqRel);
        }
    }

    fn route(&self, channel: ChannelId, port: Port, pin: Pin, edges: EdgeConfig) {
        let Some(route) = self.routes.get(channel.index()) else {
            return;
        };
        let mask = channel.mask();

        route.store(encode_route(port, pin), Ordering::Relaxed);
        if edges.rising {
            self.rising.fetch_or(mask, Ordering::Relaxed);
        } else {
            self.rising.fetch_and(!mask, Ordering::Relaxed);
        }
        if edges.falling {
            self.falling.fetch_or(mask, Ordering::Relaxed);
        } else {
            self.falling.fetch_and(!mask, Ordering::Relaxed);
        }

        if self.route_glitch.load(Ordering::Relaxed) {
            self.pending.fetch_or(mask, Ordering::AcqRel);
        }
    }
}
