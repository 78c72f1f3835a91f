//! Shared queues and the line register block
//!
//! These statics are the only state shared between interrupt context and
//! the main loop.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::config::STACK_EVENT_QUEUE_DEPTH;
use crate::interrupt::SoftExti;
use crate::protocol::Record;
use crate::signal::SignalQueue;

/// Notifications from the line interrupt vectors to the event loop
/// Never blocks the producer; full queue merges hardware flags
pub static SIGNAL_QUEUE: SignalQueue = SignalQueue::new();

/// Complete stack records from the transport task to the event loop
/// Buffer size: STACK_EVENT_QUEUE_DEPTH (transport waits when full)
pub static STACK_EVENT_CHANNEL: Channel<CriticalSectionRawMutex, Record, STACK_EVENT_QUEUE_DEPTH> =
    Channel::new();

/// Interrupt line registers fed by the pin edge watchers
pub static LINE_BLOCK: SoftExti = SoftExti::new();
