//! Perpetual event loop
//!
//! Waits on two inputs at once: records from the protocol stack and
//! notifications from interrupt context. Either one is dispatched to
//! completion before the next wait, so handlers never run concurrently.
//! Notifications enter the handler table as `system_external_signal`
//! events, the same path the stack uses for signals it raises itself.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Channel, Receiver};

use super::{DecodeError, Event, EventHandlers, EventKind, Record};
use crate::config::SIGNAL_QUEUE_DEPTH;
use crate::signal::SignalQueue;

/// Supplier of complete stack records
#[allow(async_fn_in_trait)]
pub trait EventSource {
    /// Wait for the next record, with no timeout
    async fn next_record(&mut self) -> Record;
}

impl<M: RawMutex, const N: usize> EventSource for Receiver<'_, M, Record, N> {
    async fn next_record(&mut self) -> Record {
        self.receive().await
    }
}

impl<M: RawMutex, const N: usize> EventSource for &Channel<M, Record, N> {
    async fn next_record(&mut self) -> Record {
        self.receive().await
    }
}

/// What one loop iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// A stack record was decoded; `handled` if its handler was set
    Event { kind: EventKind, handled: bool },
    /// An interrupt notification went to the external-signal handler
    Signal { word: u32, handled: bool },
    /// Record with an identifier this firmware does not know
    Unknown { id: u32 },
    /// Record dropped because its payload did not decode
    Malformed { id: u32, error: DecodeError },
}

pub struct EventLoop<'q, C, S, const DEPTH: usize = SIGNAL_QUEUE_DEPTH> {
    source: S,
    signals: &'q SignalQueue<DEPTH>,
    handlers: EventHandlers<C>,
}

impl<'q, C, S: EventSource, const DEPTH: usize> EventLoop<'q, C, S, DEPTH> {
    pub fn new(source: S, signals: &'q SignalQueue<DEPTH>, handlers: EventHandlers<C>) -> Self {
        Self {
            source,
            signals,
            handlers,
        }
    }

    pub fn handlers(&self) -> &EventHandlers<C> {
        &self.handlers
    }

    pub fn handlers_mut(&mut self) -> &mut EventHandlers<C> {
        &mut self.handlers
    }

    /// Wait for one record or notification and dispatch it
    ///
    /// Notifications win when both are ready.
    pub async fn dispatch_next(&mut self, ctx: &mut C) -> Outcome {
        match select(self.signals.receive(), self.source.next_record()).await {
            Either::First(notification) => self.dispatch_signal(ctx, notification.into_word()),
            Either::Second(record) => self.dispatch_record(ctx, &record),
        }
    }

    /// Decode and dispatch one record
    pub fn dispatch_record(&self, ctx: &mut C, record: &Record) -> Outcome {
        let id = record.id();
        match Event::decode(record) {
            Ok(Some(event)) => {
                let kind = event.kind();
                let handled = self.handlers.dispatch(ctx, &event);
                debug!("Event {} (handled={})", kind.name(), handled);
                Outcome::Event { kind, handled }
            }
            Ok(None) => {
                trace!("Ignoring unknown event {:#x}", id);
                Outcome::Unknown { id }
            }
            Err(error) => {
                warn!("Dropping malformed event {:#x}: {:?}", id, error);
                Outcome::Malformed { id, error }
            }
        }
    }

    /// Dispatch a signal word as an external-signal event
    pub fn dispatch_signal(&self, ctx: &mut C, word: u32) -> Outcome {
        let event = Event::SystemExternalSignal { extsignals: word };
        let handled = self.handlers.dispatch(ctx, &event);
        debug!("Signal {:#x} (handled={})", word, handled);
        Outcome::Signal { word, handled }
    }

    /// Dispatch forever
    ///
    /// Progress depends entirely on records and notifications arriving;
    /// with neither, the task sleeps.
    pub async fn run(mut self, ctx: &mut C) -> ! {
        info!("Event loop running");
        loop {
            self.dispatch_next(ctx).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HARDWARE_SIGNAL_TAG;
    use crate::signal::{ChannelMask, Notification};
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use std::collections::VecDeque;
    use std::vec::Vec;

    /// Replays queued records, then waits forever
    struct Script(VecDeque<Record>);

    impl EventSource for Script {
        async fn next_record(&mut self) -> Record {
            match self.0.pop_front() {
                Some(record) => record,
                None => core::future::pending().await,
            }
        }
    }

    #[derive(Default)]
    struct App {
        signals: Vec<u32>,
        timers: Vec<u8>,
    }

    fn on_signal(app: &mut App, extsignals: u32) {
        app.signals.push(extsignals);
    }

    fn on_timer(app: &mut App, handle: u8) {
        app.timers.push(handle);
    }

    fn handlers() -> EventHandlers<App> {
        EventHandlers {
            system_external_signal: Some(on_signal),
            hardware_soft_timer: Some(on_timer),
            ..EventHandlers::new()
        }
    }

    fn timer(handle: u8) -> Record {
        Record::from_parts(0x0c, 0x00, &[handle]).unwrap()
    }

    #[test]
    fn records_dispatch_in_arrival_order() {
        let queue = SignalQueue::<4>::new();
        let script = Script([timer(1), timer(2)].into_iter().collect());
        let mut event_loop = EventLoop::new(script, &queue, handlers());
        let mut app = App::default();

        for _ in 0..2 {
            let outcome = block_on(event_loop.dispatch_next(&mut app));
            assert_eq!(
                outcome,
                Outcome::Event {
                    kind: EventKind::HardwareSoftTimer,
                    handled: true
                }
            );
        }
        assert_eq!(app.timers, [1, 2]);
    }

    #[test]
    fn notifications_arrive_as_external_signal_events() {
        let queue = SignalQueue::<4>::new();
        let script = Script([timer(9)].into_iter().collect());
        let mut event_loop = EventLoop::new(script, &queue, handlers());
        let mut app = App::default();

        queue
            .post(Notification::Hardware(ChannelMask::new(0b100)))
            .unwrap();
        let first = block_on(event_loop.dispatch_next(&mut app));
        assert_eq!(
            first,
            Outcome::Signal {
                word: HARDWARE_SIGNAL_TAG | 0b100,
                handled: true
            }
        );

        block_on(event_loop.dispatch_next(&mut app));
        assert_eq!(app.signals, [HARDWARE_SIGNAL_TAG | 0b100]);
        assert_eq!(app.timers, [9]);
    }

    #[test]
    fn unknown_and_malformed_records_are_dropped() {
        let queue = SignalQueue::<4>::new();
        let unknown = Record::from_parts(0x42, 0x00, &[]).unwrap();
        let short = Record::from_parts(0x0c, 0x00, &[]).unwrap();
        let script = Script([unknown, short, timer(3)].into_iter().collect());
        let mut event_loop = EventLoop::new(script, &queue, handlers());
        let mut app = App::default();

        assert_eq!(
            block_on(event_loop.dispatch_next(&mut app)),
            Outcome::Unknown {
                id: crate::protocol::record::event_id(0x42, 0x00)
            }
        );
        assert!(matches!(
            block_on(event_loop.dispatch_next(&mut app)),
            Outcome::Malformed {
                error: DecodeError::Truncated { .. },
                ..
            }
        ));
        block_on(event_loop.dispatch_next(&mut app));
        assert_eq!(app.timers, [3]);
    }

    #[test]
    fn channel_receiver_is_a_source() {
        let channel = Channel::<CriticalSectionRawMutex, Record, 2>::new();
        let queue = SignalQueue::<4>::new();
        channel.try_send(timer(5)).unwrap();

        let mut event_loop = EventLoop::new(channel.receiver(), &queue, EventHandlers::new());
        let mut app = App::default();
        assert_eq!(
            block_on(event_loop.dispatch_next(&mut app)),
            Outcome::Event {
                kind: EventKind::HardwareSoftTimer,
                handled: false
            }
        );
    }

    #[test]
    fn handlers_can_be_swapped_between_iterations() {
        let queue = SignalQueue::<4>::new();
        let script = Script([timer(1), timer(2)].into_iter().collect());
        let mut event_loop = EventLoop::new(script, &queue, EventHandlers::new());
        let mut app = App::default();

        block_on(event_loop.dispatch_next(&mut app));
        event_loop.handlers_mut().hardware_soft_timer = Some(on_timer);
        block_on(event_loop.dispatch_next(&mut app));
        assert_eq!(app.timers, [2]);
    }
}
