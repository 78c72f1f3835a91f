//! Typed stack events
//!
//! Every event the stack can emit is listed once in the `stack_events!`
//! table, with its class/method pair and its fields in wire order. The
//! table expands into:
//!
//! - [`EventKind`], the fieldless list of events and their identifiers
//! - [`Event`], one variant per event carrying the decoded fields
//! - [`EventHandlers`](super::EventHandlers), one optional handler per event
//!
//! Fields are read positionally: integers little-endian, `BdAddr` as six
//! bytes, byte arrays prefixed by a one-byte length and [`LongArray`]
//! prefixed by a two-byte length. Decoded events borrow array fields from
//! the record they came from.

use core::fmt;
use core::ops::Deref;

use super::record::{event_id, Record};
use super::DecodeError;

/// Bluetooth device address, least significant byte first as on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BdAddr(pub [u8; 6]);

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            g, e, d, c, b, a
        )
    }
}

/// Byte array with a 16-bit length prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LongArray<'a>(pub &'a [u8]);

impl<'a> LongArray<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }
}

impl Deref for LongArray<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.0
    }
}

/// Read position within a record payload
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Take the next `n` bytes
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos + n;
        let bytes = self.bytes.get(self.pos..end).ok_or(DecodeError::Truncated {
            needed: end,
            available: self.bytes.len(),
        })?;
        self.pos = end;
        Ok(bytes)
    }

    fn array<const K: usize>(&mut self) -> Result<[u8; K], DecodeError> {
        let mut out = [0; K];
        out.copy_from_slice(self.take(K)?);
        Ok(out)
    }

    /// Bytes not consumed yet
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

/// A value that can be read from a record payload
pub trait Field<'a>: Sized {
    fn read(cursor: &mut Cursor<'a>) -> Result<Self, DecodeError>;
}

macro_rules! le_field {
    ($($ty:ty),*) => {$(
        impl<'a> Field<'a> for $ty {
            fn read(cursor: &mut Cursor<'a>) -> Result<Self, DecodeError> {
                cursor.array().map(<$ty>::from_le_bytes)
            }
        }
    )*};
}

le_field!(u8, i8, u16, u32);

impl<'a> Field<'a> for BdAddr {
    fn read(cursor: &mut Cursor<'a>) -> Result<Self, DecodeError> {
        cursor.array().map(BdAddr)
    }
}

impl<'a> Field<'a> for &'a [u8] {
    fn read(cursor: &mut Cursor<'a>) -> Result<Self, DecodeError> {
        let len = u8::read(cursor)?;
        cursor.take(len as usize)
    }
}

impl<'a> Field<'a> for LongArray<'a> {
    fn read(cursor: &mut Cursor<'a>) -> Result<Self, DecodeError> {
        let len = u16::read(cursor)?;
        cursor.take(len as usize).map(LongArray)
    }
}

/// Every stack event: class/method pair, handler name and fields in wire order
///
/// Expands `$define!` over the whole table.
macro_rules! stack_events {
    ($define:ident) => {
        $define! {
            'a;

            // dfu
            DfuBoot => dfu_boot (0x00, 0x00) { version: u32 }
            DfuBootFailure => dfu_boot_failure (0x00, 0x01) { reason: u16 }

            // system
            SystemBoot => system_boot (0x01, 0x00) {
                major: u16,
                minor: u16,
                patch: u16,
                build: u16,
                bootloader: u32,
                hw: u16,
            }
            /// Tagged signal word: hardware channel flags or an application value
            SystemExternalSignal => system_external_signal (0x01, 0x03) { extsignals: u32 }
            SystemAwake => system_awake (0x01, 0x04) {}
            SystemHardwareError => system_hardware_error (0x01, 0x05) { status: u16 }

            // le_gap
            LeGapScanResponse => le_gap_scan_response (0x03, 0x00) {
                rssi: i8,
                packet_type: u8,
                address: BdAddr,
                address_type: u8,
                bonding: u8,
                data: &'a [u8],
            }
            LeGapAdvTimeout => le_gap_adv_timeout (0x03, 0x01) {}
            LeGapScanRequest => le_gap_scan_request (0x03, 0x02) {
                handle: u8,
                address: BdAddr,
                address_type: u8,
                bonding: u8,
            }

            // le_connection
            LeConnectionOpened => le_connection_opened (0x08, 0x00) {
                address: BdAddr,
                address_type: u8,
                master: u8,
                connection: u8,
                bonding: u8,
            }
            LeConnectionClosed => le_connection_closed (0x08, 0x01) { reason: u16, connection: u8 }
            LeConnectionParameters => le_connection_parameters (0x08, 0x02) {
                connection: u8,
                interval: u16,
                latency: u16,
                timeout: u16,
                security_mode: u8,
                txsize: u16,
            }
            LeConnectionRssi => le_connection_rssi (0x08, 0x03) { connection: u8, status: u8, rssi: i8 }
            LeConnectionPhyStatus => le_connection_phy_status (0x08, 0x04) { connection: u8, phy: u8 }
            LeConnectionBt5Opened => le_connection_bt5_opened (0x08, 0x05) {
                address: BdAddr,
                address_type: u8,
                master: u8,
                connection: u8,
                bonding: u8,
                advertiser: u8,
            }

            // gatt
            GattMtuExchanged => gatt_mtu_exchanged (0x09, 0x00) { connection: u8, mtu: u16 }
            GattService => gatt_service (0x09, 0x01) { connection: u8, service: u32, uuid: &'a [u8] }
            GattCharacteristic => gatt_characteristic (0x09, 0x02) {
                connection: u8,
                characteristic: u16,
                properties: u8,
                uuid: &'a [u8],
            }
            GattDescriptor => gatt_descriptor (0x09, 0x03) {
                connection: u8,
                descriptor: u16,
                uuid: &'a [u8],
            }
            GattCharacteristicValue => gatt_characteristic_value (0x09, 0x04) {
                connection: u8,
                characteristic: u16,
                att_opcode: u8,
                offset: u16,
                value: &'a [u8],
            }
            GattDescriptorValue => gatt_descriptor_value (0x09, 0x05) {
                connection: u8,
                descriptor: u16,
                offset: u16,
                value: &'a [u8],
            }
            GattProcedureCompleted => gatt_procedure_completed (0x09, 0x06) { connection: u8, result: u16 }

            // gatt_server
            GattServerAttributeValue => gatt_server_attribute_value (0x0a, 0x00) {
                connection: u8,
                attribute: u16,
                att_opcode: u8,
                offset: u16,
                value: &'a [u8],
            }
            GattServerUserReadRequest => gatt_server_user_read_request (0x0a, 0x01) {
                connection: u8,
                characteristic: u16,
                att_opcode: u8,
                offset: u16,
            }
            GattServerUserWriteRequest => gatt_server_user_write_request (0x0a, 0x02) {
                connection: u8,
                characteristic: u16,
                att_opcode: u8,
                offset: u16,
                value: &'a [u8],
            }
            GattServerCharacteristicStatus => gatt_server_characteristic_status (0x0a, 0x03) {
                connection: u8,
                characteristic: u16,
                status_flags: u8,
                client_config_flags: u16,
            }
            GattServerExecuteWriteCompleted => gatt_server_execute_write_completed (0x0a, 0x04) {
                connection: u8,
                result: u16,
            }

            // endpoint
            EndpointSyntaxError => endpoint_syntax_error (0x0b, 0x00) { result: u16, endpoint: u8 }
            EndpointData => endpoint_data (0x0b, 0x01) { endpoint: u8, data: &'a [u8] }
            EndpointStatus => endpoint_status (0x0b, 0x02) {
                endpoint: u8,
                endpoint_type: u32,
                destination_endpoint: i8,
                flags: u8,
            }

            // hardware
            HardwareSoftTimer => hardware_soft_timer (0x0c, 0x00) { handle: u8 }

            // flash
            FlashPsKey => flash_ps_key (0x0d, 0x00) { key: u16, value: &'a [u8] }

            // test
            TestDtmCompleted => test_dtm_completed (0x0e, 0x00) { result: u16, number_of_packets: u16 }
            TestHcidump => test_hcidump (0x0e, 0x01) {
                time: u32,
                direction: u8,
                packet_type: u8,
                data: LongArray<'a>,
            }

            // sm
            SmPasskeyDisplay => sm_passkey_display (0x0f, 0x00) { connection: u8, passkey: u32 }
            SmPasskeyRequest => sm_passkey_request (0x0f, 0x01) { connection: u8 }
            SmConfirmPasskey => sm_confirm_passkey (0x0f, 0x02) { connection: u8, passkey: u32 }
            SmBonded => sm_bonded (0x0f, 0x03) { connection: u8, bonding: u8 }
            SmBondingFailed => sm_bonding_failed (0x0f, 0x04) { connection: u8, reason: u16 }
            SmListBondingEntry => sm_list_bonding_entry (0x0f, 0x05) {
                bonding: u8,
                address: BdAddr,
                address_type: u8,
            }
            SmListAllBondingsComplete => sm_list_all_bondings_complete (0x0f, 0x06) {}
            SmConfirmBonding => sm_confirm_bonding (0x0f, 0x09) { connection: u8, bonding_handle: i8 }

            // homekit
            HomekitSetupcodeDisplay => homekit_setupcode_display (0x13, 0x00) {
                connection: u8,
                setupcode: &'a [u8],
            }
            HomekitPaired => homekit_paired (0x13, 0x01) { connection: u8, reason: u16 }
            HomekitPairVerified => homekit_pair_verified (0x13, 0x02) { connection: u8, reason: u16 }
            HomekitConnectionOpened => homekit_connection_opened (0x13, 0x03) { connection: u8 }
            HomekitConnectionClosed => homekit_connection_closed (0x13, 0x04) { connection: u8, reason: u16 }
            HomekitIdentify => homekit_identify (0x13, 0x05) { connection: u8 }
            HomekitWriteRequest => homekit_write_request (0x13, 0x06) {
                connection: u8,
                characteristic: u16,
                chr_value_size: u16,
                authorization_size: u16,
                value_offset: u16,
                value: &'a [u8],
            }
            HomekitReadRequest => homekit_read_request (0x13, 0x07) {
                connection: u8,
                characteristic: u16,
                offset: u16,
            }
            HomekitError => homekit_error (0x13, 0x08) { connection: u8, reason: u16 }
            HomekitPairingRemoved => homekit_pairing_removed (0x13, 0x09) {
                connection: u8,
                remaining_pairings: u16,
                pairing_id: &'a [u8],
            }

            // user
            UserMessageToHost => user_message_to_host (0xff, 0x00) { data: &'a [u8] }
        }
    };
}

macro_rules! define_events {
    (
        $lt:lifetime;
        $(
            $(#[$doc:meta])*
            $variant:ident => $handler:ident ($class:literal, $method:literal) {
                $($field:ident: $ty:ty),* $(,)?
            }
        )*
    ) => {
        /// Identity of a stack event, independent of its payload
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum EventKind {
            $($(#[$doc])* $variant,)*
        }

        impl EventKind {
            /// Every known event
            pub const ALL: &'static [EventKind] = &[$(EventKind::$variant,)*];

            /// Identifier carried in the record header
            pub const fn id(self) -> u32 {
                match self {
                    $(EventKind::$variant => event_id($class, $method),)*
                }
            }

            /// Look up an identifier, `None` for events this firmware does not know
            pub fn from_id(id: u32) -> Option<Self> {
                $(
                    if id == event_id($class, $method) {
                        return Some(EventKind::$variant);
                    }
                )*
                None
            }

            /// Handler name, `class_method`
            pub const fn name(self) -> &'static str {
                match self {
                    $(EventKind::$variant => stringify!($handler),)*
                }
            }
        }

        /// Decoded stack event
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum Event<$lt> {
            $($(#[$doc])* $variant { $($field: $ty),* },)*
        }

        impl<$lt> Event<$lt> {
            pub fn kind(&self) -> EventKind {
                match self {
                    $(Event::$variant { .. } => EventKind::$variant,)*
                }
            }

            /// Decode a record
            ///
            /// `Ok(None)` for an unknown identifier. Payload bytes beyond the
            /// last field are ignored; newer stacks may append fields.
            pub fn decode(record: &$lt Record) -> Result<Option<Self>, DecodeError> {
                let Some(kind) = EventKind::from_id(record.id()) else {
                    return Ok(None);
                };
                #[allow(unused_mut, unused_variables)]
                let mut cursor = Cursor::new(record.payload());
                let event = match kind {
                    $(EventKind::$variant => Event::$variant {
                        $($field: <$ty as Field<$lt>>::read(&mut cursor)?,)*
                    },)*
                };
                Ok(Some(event))
            }
        }
    };
}

stack_events!(define_events);

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: EventKind, payload: &[u8]) -> Record {
        let id = kind.id();
        Record::from_parts((id >> 16) as u8, (id >> 24) as u8, payload).unwrap()
    }

    #[test]
    fn catalogue_ids_are_unique() {
        assert_eq!(EventKind::ALL.len(), 53);
        for (i, a) in EventKind::ALL.iter().enumerate() {
            assert_eq!(EventKind::from_id(a.id()), Some(*a));
            for b in &EventKind::ALL[i + 1..] {
                assert_ne!(a.id(), b.id(), "{} and {} share an id", a.name(), b.name());
            }
        }
    }

    #[test]
    fn fields_decode_in_wire_order() {
        let payload = [
            0x10, 0x32, 0x54, 0x76, 0x98, 0xBA, // address
            0x01, // address_type
            0x00, // master
            0x03, // connection
            0xFF, // bonding
        ];
        let rec = record(EventKind::LeConnectionOpened, &payload);
        let event = Event::decode(&rec).unwrap().unwrap();
        assert_eq!(
            event,
            Event::LeConnectionOpened {
                address: BdAddr([0x10, 0x32, 0x54, 0x76, 0x98, 0xBA]),
                address_type: 1,
                master: 0,
                connection: 3,
                bonding: 0xFF,
            }
        );
    }

    #[test]
    fn arrays_borrow_from_record() {
        // connection, characteristic, att_opcode, offset, value
        let payload = [0x01, 0x0b, 0x00, 0x12, 0x00, 0x00, 0x03, b'a', b'b', b'c'];
        let rec = record(EventKind::GattServerUserWriteRequest, &payload);
        match Event::decode(&rec).unwrap() {
            Some(Event::GattServerUserWriteRequest {
                characteristic,
                att_opcode,
                value,
                ..
            }) => {
                assert_eq!(characteristic, 0x000b);
                assert_eq!(att_opcode, 0x12);
                assert_eq!(value, b"abc");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn long_array_uses_two_byte_length() {
        let mut payload = std::vec![0x78, 0x56, 0x34, 0x12, 0x01, 0x04, 0x03, 0x00];
        payload.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let rec = record(EventKind::TestHcidump, &payload);
        match Event::decode(&rec).unwrap() {
            Some(Event::TestHcidump { time, data, .. }) => {
                assert_eq!(time, 0x1234_5678);
                assert_eq!(data.as_bytes(), &[0xAA, 0xBB, 0xCC]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn signed_fields() {
        let rec = record(EventKind::LeConnectionRssi, &[0x02, 0x00, 0xC4]);
        assert_eq!(
            Event::decode(&rec).unwrap(),
            Some(Event::LeConnectionRssi {
                connection: 2,
                status: 0,
                rssi: -60,
            })
        );
    }

    #[test]
    fn unknown_id_is_not_an_error() {
        let rec = Record::from_parts(0x42, 0x07, &[1, 2, 3]).unwrap();
        assert_eq!(Event::decode(&rec), Ok(None));
    }

    #[test]
    fn short_payload_is_truncated() {
        // reason present, connection missing
        let rec = record(EventKind::LeConnectionClosed, &[0x13, 0x02]);
        assert_eq!(
            Event::decode(&rec),
            Err(DecodeError::Truncated {
                needed: 3,
                available: 2
            })
        );

        // array length runs past the payload
        let rec = record(EventKind::UserMessageToHost, &[0x05, 0x01]);
        assert_eq!(
            Event::decode(&rec),
            Err(DecodeError::Truncated {
                needed: 6,
                available: 2
            })
        );
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let rec = record(EventKind::HardwareSoftTimer, &[0x04, 0xEE, 0xEE]);
        assert_eq!(
            Event::decode(&rec).unwrap(),
            Some(Event::HardwareSoftTimer { handle: 4 })
        );
    }

    #[test]
    fn address_displays_most_significant_first() {
        let addr = BdAddr([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(std::format!("{}", addr), "06:05:04:03:02:01");
    }
}
