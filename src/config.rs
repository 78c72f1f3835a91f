//! Hardware and firmware configuration for ExtSignal
//! RP2040-based host for an external protocol-stack module

// ===================================================================
// Interrupt Line Configuration
// ===================================================================

pub const CHANNEL_COUNT: usize = 16; // Hardware interrupt lines
pub const CHANNELS_PER_GROUP: usize = 4; // Lines sharing one pin-number range
pub const GROUP_COUNT: usize = CHANNEL_COUNT / CHANNELS_PER_GROUP;

/// Reserved bit marking a notification word as hardware-sourced
pub const HARDWARE_SIGNAL_TAG: u32 = 0x8000_0000;

/// Lines served by the even vector (0, 2, 4, ...)
pub const EVEN_VECTOR_MASK: u32 = 0x0000_5555;
/// Lines served by the odd vector (1, 3, 5, ...)
pub const ODD_VECTOR_MASK: u32 = 0x0000_AAAA;

/// Mask covering every valid channel flag
pub const CHANNEL_FLAG_MASK: u32 = (1 << CHANNEL_COUNT) - 1;

const _: () = assert!(CHANNEL_COUNT < 32, "channel flags must fit below the tag bit");
const _: () = assert!(CHANNEL_FLAG_MASK & HARDWARE_SIGNAL_TAG == 0);
const _: () = assert!(CHANNEL_COUNT % CHANNELS_PER_GROUP == 0);
const _: () = assert!(EVEN_VECTOR_MASK | ODD_VECTOR_MASK == CHANNEL_FLAG_MASK);
const _: () = assert!(EVEN_VECTOR_MASK & ODD_VECTOR_MASK == 0);

// ===================================================================
// Queue Configuration
// ===================================================================

pub const SIGNAL_QUEUE_DEPTH: usize = 8; // Notifications in flight from interrupt context
pub const STACK_EVENT_QUEUE_DEPTH: usize = 4; // Raw records waiting for dispatch

// ===================================================================
// Protocol Stack Record Configuration
// ===================================================================

pub const RECORD_HEADER_LEN: usize = 4;
pub const MAX_RECORD_PAYLOAD: usize = 256; // Larger records are dropped by the framer

pub const STACK_UART_BAUDRATE: u32 = 115_200;

// ===================================================================
// GPIO Pin Assignments - Raspberry Pi Pico
// ===================================================================

// Buttons (active low, internal pull-up) - one per interrupt group slot
pub const BUTTON_PINS: [u8; 4] = [2, 3, 6, 7];
// Button LEDs, same order as BUTTON_PINS
pub const BUTTON_LED_PINS: [u8; 4] = [10, 11, 12, 13];

// UART link to the protocol-stack module
pub const STACK_UART_TX_PIN: u8 = 0;
pub const STACK_UART_RX_PIN: u8 = 1;

// Status LEDs
pub const LED_STATUS_PIN: u8 = 25; // Built-in LED on Pico

// ===================================================================
// Supervisor Configuration
// ===================================================================

pub const HEARTBEAT_PERIOD_SECS: u64 = 10;
pub const STATUS_REPORT_SECS: u32 = 60;

// ===================================================================
// Board Configuration
// ===================================================================

use crate::types::EdgeConfig;

/// Runtime board configuration for the demo application
#[derive(Debug, Clone, Copy)]
pub struct BoardConfig {
    /// Input pins monitored through interrupt lines
    pub button_pins: [u8; 4],
    /// LED pins toggled by the buttons
    pub led_pins: [u8; 4],
    /// Edge sensitivity for the buttons
    pub button_edges: EdgeConfig,
}

impl BoardConfig {
    pub const fn new() -> Self {
        Self {
            button_pins: BUTTON_PINS,
            led_pins: BUTTON_LED_PINS,
            button_edges: EdgeConfig::FALLING,
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::new()
    }
}
