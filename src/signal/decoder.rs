//! Signal decoder
//!
//! Turns a notification word back into pin events. Each set flag is
//! resolved through the channel table; flags whose line has been released
//! since the interrupt fired resolve to nothing and are skipped. Levels are
//! sampled live, at decode time.
//!
//! Decoding borrows the table only while resolving. Callbacks run
//! afterwards with the application context, so they may reconfigure lines.

use heapless::Vec;

use super::Notification;
use crate::config::{CHANNELS_PER_GROUP, CHANNEL_COUNT};
use crate::interrupt::ChannelTable;
use crate::types::{Pin, PinEdge, Port};

/// Reads the live level of an input pin
pub trait PinSampler {
    fn is_high(&mut self, port: Port, pin: Pin) -> bool;
}

impl<F: FnMut(Port, Pin) -> bool> PinSampler for F {
    fn is_high(&mut self, port: Port, pin: Pin) -> bool {
        self(port, pin)
    }
}

/// Sampler over a fixed set of `embedded-hal` input pins
///
/// Pins that are not in the bank, or whose read fails, sample low.
pub struct InputBank<P, const K: usize> {
    pins: Vec<(Port, Pin, P), K>,
}

impl<P: embedded_hal::digital::InputPin, const K: usize> InputBank<P, K> {
    pub const fn new() -> Self {
        Self { pins: Vec::new() }
    }

    /// Add a pin, handing it back if the bank is full
    pub fn add(&mut self, port: Port, pin: Pin, input: P) -> Result<(), P> {
        self.pins
            .push((port, pin, input))
            .map_err(|(_, _, input)| input)
    }
}

impl<P: embedded_hal::digital::InputPin, const K: usize> Default for InputBank<P, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: embedded_hal::digital::InputPin, const K: usize> PinSampler for InputBank<P, K> {
    fn is_high(&mut self, port: Port, pin: Pin) -> bool {
        self.pins
            .iter_mut()
            .find(|(p, n, _)| *p == port && *n == pin)
            .map(|(_, _, input)| input.is_high().unwrap_or(false))
            .unwrap_or(false)
    }
}

/// Application callbacks for decoded signals; unset hooks do nothing
pub struct SignalHooks<C> {
    /// A monitored pin triggered
    pub pin_edge: Option<fn(&mut C, PinEdge)>,
    /// A word without the hardware tag arrived
    pub app_signal: Option<fn(&mut C, u32)>,
}

impl<C> SignalHooks<C> {
    pub const fn new() -> Self {
        Self {
            pin_edge: None,
            app_signal: None,
        }
    }
}

impl<C> Default for SignalHooks<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for SignalHooks<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for SignalHooks<C> {}

/// Result of decoding one notification word
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<const N: usize = CHANNEL_COUNT> {
    /// Resolved pin events in ascending line order
    Pins(Vec<PinEdge, N>),
    /// Untagged word, forwarded verbatim
    Application(u32),
}

impl<const N: usize> Decoded<N> {
    /// Run the matching hooks
    pub fn deliver<C>(self, ctx: &mut C, hooks: &SignalHooks<C>) {
        match self {
            Decoded::Pins(edges) => {
                if let Some(hook) = hooks.pin_edge {
                    for edge in edges {
                        hook(ctx, edge);
                    }
                }
            }
            Decoded::Application(raw) => {
                if let Some(hook) = hooks.app_signal {
                    hook(ctx, raw);
                }
            }
        }
    }
}

/// Decode a notification word against the current channel table
pub fn decode<S: PinSampler, const N: usize, const G: usize>(
    word: u32,
    table: &ChannelTable<N, G>,
    sampler: &mut S,
) -> Decoded<N> {
    let mask = match Notification::from_word(word) {
        Notification::Application(raw) => return Decoded::Application(raw),
        Notification::Hardware(mask) => mask,
    };

    let mut edges = Vec::new();
    for channel in mask.iter() {
        let Some((port, pin)) = table.lookup(channel) else {
            trace!("Line {} released before decode", channel.index());
            continue;
        };
        let level = sampler.is_high(port, pin);
        // One entry per line and the mask never exceeds the table
        let _ = edges.push(PinEdge { port, pin, level });
    }
    Decoded::Pins(edges)
}

/// Decode with the default table layout and deliver straight away
pub fn dispatch<C, S: PinSampler>(
    ctx: &mut C,
    word: u32,
    table: &ChannelTable<CHANNEL_COUNT, CHANNELS_PER_GROUP>,
    sampler: &mut S,
    hooks: &SignalHooks<C>,
) {
    decode(word, table, sampler).deliver(ctx, hooks);
}
