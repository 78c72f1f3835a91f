//! Event handler table
//!
//! Applications register a plain function per event they care about and
//! leave everything else unset. The table is generated from the same
//! event list as [`Event`], so every event has exactly one entry and
//! every handler signature matches its event's fields.
//!
//! ```ignore
//! let handlers = EventHandlers {
//!     le_connection_closed: Some(on_closed),
//!     ..EventHandlers::new()
//! };
//! ```

use super::events::{BdAddr, Event, EventKind, LongArray};

macro_rules! define_handlers {
    (
        $lt:lifetime;
        $(
            $(#[$doc:meta])*
            $variant:ident => $handler:ident ($class:literal, $method:literal) {
                $($field:ident: $ty:ty),* $(,)?
            }
        )*
    ) => {
        /// One independently optional handler per stack event
        ///
        /// Unset entries are no-ops. Handlers receive the application
        /// context followed by the event fields in wire order.
        pub struct EventHandlers<C> {
            $(pub $handler: Option<for<$lt> fn(&mut C, $($ty),*)>,)*
        }

        impl<C> EventHandlers<C> {
            /// Table with every entry unset
            pub const fn new() -> Self {
                Self {
                    $($handler: None,)*
                }
            }

            /// Run the handler registered for `event`
            ///
            /// Returns whether a handler was set.
            pub fn dispatch(&self, ctx: &mut C, event: &Event<'_>) -> bool {
                match *event {
                    $(Event::$variant { $($field),* } => match self.$handler {
                        Some(handler) => {
                            handler(ctx, $($field),*);
                            true
                        }
                        None => false,
                    },)*
                }
            }

            /// Whether a handler is set for `kind`
            pub fn is_set(&self, kind: EventKind) -> bool {
                match kind {
                    $(EventKind::$variant => self.$handler.is_some(),)*
                }
            }
        }
    };
}


stack_events!(define_handlers);

impl<C> Default for EventHandlers<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for EventHandlers<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for EventHandlers<C> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Record;
    use std::vec::Vec;

    #[derive(Default)]
    struct App {
        calls: Vec<(&'static str, u32)>,
        payload: Vec<u8>,
    }

    fn on_closed(app: &mut App, reason: u16, connection: u8) {
        app.calls.push(("closed", (reason as u32) << 8 | connection as u32));
    }

    fn on_opened(
        app: &mut App,
        _address: BdAddr,
        _address_type: u8,
        _master: u8,
        connection: u8,
        _bonding: u8,
    ) {
        app.calls.push(("opened", connection as u32));
    }

    fn on_message(app: &mut App, data: &[u8]) {
        app.payload.extend_from_slice(data);
    }

    fn on_hcidump(app: &mut App, time: u32, _direction: u8, _packet_type: u8, data: LongArray<'_>) {
        app.calls.push(("hcidump", time));
        app.payload.extend_from_slice(&data);
    }

    fn table() -> EventHandlers<App> {
        EventHandlers {
            le_connection_closed: Some(on_closed),
            le_connection_opened: Some(on_opened),
            user_message_to_host: Some(on_message),
            test_hcidump: Some(on_hcidump),
            ..EventHandlers::new()
        }
    }

    #[test]
    fn runs_only_the_matching_handler() {
        let mut app = App::default();
        let event = Event::LeConnectionClosed {
            reason: 0x0213,
            connection: 1,
        };
        assert!(table().dispatch(&mut app, &event));
        assert_eq!(app.calls, [("closed", 0x0213_01)]);
        assert!(app.payload.is_empty());
    }

    #[test]
    fn unset_entry_is_a_noop() {
        let mut app = App::default();
        let handled = table().dispatch(&mut app, &Event::SystemAwake {});
        assert!(!handled);
        assert!(app.calls.is_empty());
    }

    #[test]
    fn empty_table_handles_nothing() {
        let handlers = EventHandlers::<App>::new();
        assert!(EventKind::ALL.iter().all(|&kind| !handlers.is_set(kind)));
    }

    #[test]
    fn borrowed_fields_reach_handler() {
        let record = Record::from_parts(0xff, 0x00, &[3, b'h', b'e', b'y']).unwrap();
        let event = Event::decode(&record).unwrap().unwrap();

        let mut app = App::default();
        assert!(table().dispatch(&mut app, &event));
        assert_eq!(app.payload, b"hey");
    }

    #[test]
    fn long_array_reaches_handler() {
        let event = Event::TestHcidump {
            time: 7,
            direction: 0,
            packet_type: 2,
            data: LongArray(&[1, 2]),
        };
        let mut app = App::default();
        table().dispatch(&mut app, &event);
        assert_eq!(app.calls, [("hcidump", 7)]);
        assert_eq!(app.payload, [1, 2]);
    }

    #[test]
    fn registered_entries_are_reported() {
        let handlers = table();
        assert!(handlers.is_set(EventKind::LeConnectionOpened));
        assert!(!handlers.is_set(EventKind::SystemBoot));
    }
}
