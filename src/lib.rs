//! ExtSignal - interrupt line multiplexing and stack event dispatch
//!
//! Firmware core sitting between raw hardware signals / raw stack event
//! bytes and typed application callbacks.
//!
//! ## Architecture
//! - **Interrupt lines**: 16 lines in groups of 4 shared by any number of pins
//! - **ISR bridge**: even/odd vectors post tagged notifications, never block
//! - **Signal decoder**: notification word back to (port, pin, level) callbacks
//! - **Event demultiplexer**: stack records to independently optional handlers
//!
//! The core is `no_std`, allocation free and target independent. RP2040
//! board support lives behind the `rp2040` feature.

#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod buttons;
pub mod channels;
pub mod config;
pub mod interrupt;
pub mod protocol;
pub mod signal;
pub mod types;

#[cfg(feature = "rp2040")]
pub mod hardware;
#[cfg(feature = "rp2040")]
pub mod supervisor;

#[cfg(feature = "rp2040")]
embassy_rp::bind_interrupts!(pub struct Irqs {
    UART0_IRQ => embassy_rp::uart::InterruptHandler<embassy_rp::peripherals::UART0>;
});
