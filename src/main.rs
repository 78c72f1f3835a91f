//! ExtSignal - RP2040 firmware entry point
//!
//! Hardware: Raspberry Pi Pico (RP2040)
//! Stack link: UART0 (RX on GPIO1) from the radio module
//! Buttons: 4 tactile switches on GPIO2/3/6/7, LEDs on GPIO10..13
//!
//! Thread mode runs the event loop and supervisor; edge watchers run on an
//! interrupt executor so they preempt stack event handlers.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use {defmt_rtt as _, panic_halt as _};

use extsignal::channels::{SIGNAL_QUEUE, STACK_EVENT_CHANNEL};
use extsignal::hardware::{self, BoardPanel};
use extsignal::protocol::EventLoop;
use extsignal::supervisor::{supervisor_task, AppSupervisor};

// ===================================================================
// Interrupt Executor
// ===================================================================

static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    unsafe { EXECUTOR_HIGH.on_interrupt() }
}

// ===================================================================
// Main Application Entry Point
// ===================================================================

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    let supervisor = AppSupervisor::new();
    supervisor.print_startup_banner();

    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let spawner_high = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);

    let mut panel = match hardware::init_hardware_tasks(&spawner, spawner_high, p) {
        Ok(panel) => panel,
        Err(e) => {
            error!("Failed to spawn hardware tasks: {:?}", e);
            core::panic!("Hardware initialization failed");
        }
    };

    supervisor.print_init_success();
    unwrap!(spawner.spawn(supervisor_task(supervisor)));

    let event_loop = EventLoop::new(
        STACK_EVENT_CHANNEL.receiver(),
        &SIGNAL_QUEUE,
        BoardPanel::handlers(),
    );
    event_loop.run(&mut panel).await
}
