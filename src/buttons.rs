//! Button panel application
//!
//! Four buttons with an LED each. Button presses arrive as interrupt
//! notifications through the stack's external-signal event. Pressing a
//! button toggles its partner (0 <-> 1, 2 <-> 3): a lit partner has its
//! interrupt line disabled, so it stays dark to presses until toggled back.

use embedded_hal::digital::OutputPin;

use crate::config::BoardConfig;
use crate::interrupt::{Error, ExtiController, LineAllocator};
use crate::protocol::{BdAddr, EventHandlers};
use crate::signal::{decode, Backlog, PinSampler, SignalHooks};
use crate::types::{Pin, PinEdge, Port};

pub const BUTTON_COUNT: usize = 4;

/// Button panel; `Q` is the notification queue the button lines post to
pub struct ButtonPanel<L, H, S, Q = ()> {
    lines: LineAllocator<H, Q>,
    leds: [L; BUTTON_COUNT],
    lit: [bool; BUTTON_COUNT],
    sampler: S,
    config: BoardConfig,
    connections: u8,
}

impl<L, H, S, Q> ButtonPanel<L, H, S, Q>
where
    L: OutputPin,
    H: ExtiController,
    S: PinSampler,
    Q: Backlog,
{
    const SIGNAL_HOOKS: SignalHooks<Self> = SignalHooks {
        pin_edge: Some(Self::on_pin_edge),
        app_signal: Some(Self::on_app_signal),
    };

    pub fn new(
        hw: H,
        queue: Q,
        leds: [L; BUTTON_COUNT],
        sampler: S,
        config: BoardConfig,
    ) -> Self {
        Self {
            lines: LineAllocator::with_backlog(hw, queue),
            leds,
            lit: [false; BUTTON_COUNT],
            sampler,
            config,
            connections: 0,
        }
    }

    /// Claim and enable an interrupt line for every button
    ///
    /// Buttons that cannot get a line are skipped; the first error is
    /// returned after the rest have been configured.
    pub fn configure(&mut self) -> Result<(), Error> {
        let mut result = Ok(());
        for (led, &pin) in self.leds.iter_mut().zip(&self.config.button_pins) {
            let _ = led.set_low();
            match self
                .lines
                .configure(Port::Bank0, pin, self.config.button_edges, true)
            {
                Ok(channel) => info!("Button on pin {} uses line {}", pin, channel.index()),
                Err(e) => {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }

    /// Stack event handlers of this application
    pub fn handlers() -> EventHandlers<Self> {
        EventHandlers {
            system_boot: Some(Self::on_system_boot),
            system_external_signal: Some(Self::on_external_signal),
            le_connection_opened: Some(Self::on_connection_opened),
            le_connection_closed: Some(Self::on_connection_closed),
            ..EventHandlers::new()
        }
    }

    pub fn lines(&self) -> &LineAllocator<H, Q> {
        &self.lines
    }

    /// Whether button `index` is toggled on (LED lit, interrupt off)
    pub fn is_lit(&self, index: usize) -> bool {
        self.lit.get(index).copied().unwrap_or(false)
    }

    pub fn connections(&self) -> u8 {
        self.connections
    }

    fn button_index(&self, port: Port, pin: Pin) -> Option<usize> {
        if port != Port::Bank0 {
            return None;
        }
        self.config.button_pins.iter().position(|&p| p == pin)
    }

    fn toggle(&mut self, index: usize) {
        match self.try_toggle(index) {
            Ok(lit) => debug!("Button {} toggled (lit={})", index, lit),
            Err(e) => warn!("Button {} not toggled: {:?}", index, e),
        }
    }

    /// LED and line only change when the button owns a line
    fn try_toggle(&mut self, index: usize) -> Result<bool, Error> {
        let pin = self.config.button_pins[index];
        let lit = !self.lit[index];

        // Line goes off before the LED comes on and back on after it is off
        if lit {
            self.lines.set_enabled(Port::Bank0, pin, false)?;
            let _ = self.leds[index].set_high();
        } else {
            self.lines.is_enabled(Port::Bank0, pin)?;
            let _ = self.leds[index].set_low();
            self.lines.set_enabled(Port::Bank0, pin, true)?;
        }
        self.lit[index] = lit;
        Ok(lit)
    }

    fn on_pin_edge(&mut self, edge: PinEdge) {
        let Some(index) = self.button_index(edge.port, edge.pin) else {
            return;
        };
        debug!("Button {} edge (level={})", index, edge.level);
        self.toggle(index ^ 1);
    }

    fn on_app_signal(&mut self, raw: u32) {
        debug!("Application signal {:#x}", raw);
    }

    fn on_external_signal(&mut self, extsignals: u32) {
        let decoded = decode(extsignals, self.lines.table(), &mut self.sampler);
        decoded.deliver(self, &Self::SIGNAL_HOOKS);
    }

    fn on_system_boot(
        &mut self,
        major: u16,
        minor: u16,
        patch: u16,
        build: u16,
        _bootloader: u32,
        hw: u16,
    ) {
        info!(
            "Stack v{}.{}.{}-{} booted (hw {:#x})",
            major, minor, patch, build, hw
        );
    }

    fn on_connection_opened(
        &mut self,
        address: BdAddr,
        _address_type: u8,
        _master: u8,
        connection: u8,
        _bonding: u8,
    ) {
        self.connections = self.connections.saturating_add(1);
        info!("Connection {} opened to {}", connection, address);
    }

    fn on_connection_closed(&mut self, reason: u16, connection: u8) {
        self.connections = self.connections.saturating_sub(1);
        info!("Connection {} closed (reason {:#x})", connection, reason);
    }
}
