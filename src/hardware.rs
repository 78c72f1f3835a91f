//! RP2040 board support
//!
//! embassy-rp owns the GPIO bank interrupt, so line edges are watched by
//! tasks on a high-priority interrupt executor. Each watcher feeds edges
//! into the line register block and services the vector of every line the
//! edge latched, exactly as a hardware EXTI vector would run.
//!
//! Stack records arrive over UART0 and are framed into the event channel.

use embassy_executor::{SendSpawner, SpawnError, Spawner};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::uart::{self, Async, UartRx};
use embassy_rp::{pac, Peripherals};
use embassy_time::{Duration, Timer};

use crate::buttons::ButtonPanel;
use crate::channels::{LINE_BLOCK, SIGNAL_QUEUE, STACK_EVENT_CHANNEL};
use crate::config::{self, BoardConfig};
use crate::interrupt::{isr, SoftExti, Vector};
use crate::protocol::RecordAssembler;
use crate::signal::{PinSampler, SignalQueue};
use crate::types::{Pin, Port};

/// Button panel wired to the board
pub type BoardPanel =
    ButtonPanel<Output<'static>, &'static SoftExti, SioSampler, &'static SignalQueue>;

/// Live pin levels straight from the SIO input registers
pub struct SioSampler;

impl PinSampler for SioSampler {
    fn is_high(&mut self, port: Port, pin: Pin) -> bool {
        let bank = match port {
            Port::Bank0 => 0,
            Port::Qspi => 1,
        };
        pac::SIO.gpio_in(bank).read() & (1 << (pin & 31)) != 0
    }
}

/// Initialize the board and spawn all hardware tasks
///
/// Edge watchers go to `irq_spawner`, everything else to `spawner`.
/// Returns the configured button panel for the event loop.
pub fn init_hardware_tasks(
    spawner: &Spawner,
    irq_spawner: SendSpawner,
    p: Peripherals,
) -> Result<BoardPanel, SpawnError> {
    let board = BoardConfig::new();

    info!(
        "Buttons on pins {:?}, LEDs on pins {:?}",
        board.button_pins, board.led_pins
    );

    // Must match config::BUTTON_LED_PINS
    let leds = [
        Output::new(p.PIN_10, Level::Low),
        Output::new(p.PIN_11, Level::Low),
        Output::new(p.PIN_12, Level::Low),
        Output::new(p.PIN_13, Level::Low),
    ];

    let mut panel = ButtonPanel::new(&LINE_BLOCK, &SIGNAL_QUEUE, leds, SioSampler, board);
    if let Err(e) = panel.configure() {
        // Recoverable: the remaining buttons still work
        warn!("Button setup incomplete: {}", e);
    }

    // Must match config::BUTTON_PINS
    let buttons = [
        Input::new(p.PIN_2, Pull::Up),
        Input::new(p.PIN_3, Pull::Up),
        Input::new(p.PIN_6, Pull::Up),
        Input::new(p.PIN_7, Pull::Up),
    ];
    for (input, &pin) in buttons.into_iter().zip(&config::BUTTON_PINS) {
        irq_spawner.spawn(edge_watch_task(input, pin))?;
    }

    let mut uart_config = uart::Config::default();
    uart_config.baudrate = config::STACK_UART_BAUDRATE;
    let stack_rx = UartRx::new(p.UART0, p.PIN_1, crate::Irqs, p.DMA_CH0, uart_config);
    spawner.spawn(stack_transport_task(stack_rx))?;

    spawner.spawn(status_task(Output::new(p.PIN_25, Level::Low)))?;

    Ok(panel)
}

/// Edge watcher for one button pin, runs at interrupt priority
#[embassy_executor::task(pool_size = 4)]
async fn edge_watch_task(mut input: Input<'static>, pin: Pin) -> ! {
    loop {
        input.wait_for_any_edge().await;
        let latched = LINE_BLOCK.pin_edge(Port::Bank0, pin, input.is_high());
        for vector in [Vector::Even, Vector::Odd] {
            if latched & vector.mask() != 0 {
                isr::service(&LINE_BLOCK, vector, &SIGNAL_QUEUE);
            }
        }
    }
}

/// Frames stack records from the UART byte stream
#[embassy_executor::task]
async fn stack_transport_task(mut rx: UartRx<'static, Async>) -> ! {
    info!("Stack transport task started");

    let mut assembler = RecordAssembler::new();
    let sender = STACK_EVENT_CHANNEL.sender();
    let mut byte = [0u8; 1];

    loop {
        if let Err(e) = rx.read(&mut byte).await {
            warn!("Stack UART error: {:?}", e);
            assembler.reset();
            continue;
        }
        match assembler.push(byte[0]) {
            Some(Ok(record)) => sender.send(record).await,
            Some(Err(e)) => warn!("Dropping stack record: {:?}", e),
            None => {}
        }
    }
}

/// Status LED task: heartbeat blink, double blink after lost notifications
#[embassy_executor::task]
async fn status_task(mut status_led: Output<'static>) -> ! {
    info!("Status LED task started");

    let mut dropped = SIGNAL_QUEUE.dropped();
    loop {
        let now = SIGNAL_QUEUE.dropped();
        let blinks = if now != dropped { 2 } else { 1 };
        dropped = now;

        for _ in 0..blinks {
            status_led.set_high();
            Timer::after(Duration::from_millis(100)).await;
            status_led.set_low();
            Timer::after(Duration::from_millis(150)).await;
        }
        Timer::after(Duration::from_millis(1000 - 250 * blinks)).await;
    }
}
