//! HCI and ACI packets for the BlueNRG-MS network coprocessor
//!
//! The firmware only moves bytes over SPI. Building commands, parsing events and
//! the SPI status header all live here so they run on the host.

use heapless::Vec;

use crate::wireless::{Characteristic, MAX_ADVERTISING_LEN, MAX_WRITE_LEN, RadioEvent};

/// Longest HCI packet: indicator, event code, length and 255 parameter bytes
pub const MAX_PACKET_LEN: usize = 258;

/// Return parameters kept from a command complete event
pub const MAX_RETURN_LEN: usize = 16;

/// One HCI packet as sent or received
pub type Packet = Vec<u8, MAX_PACKET_LEN>;

/// Return parameters of a completed command, status byte stripped
pub type ReturnParams = Vec<u8, MAX_RETURN_LEN>;

/// SPI header asking for write space
pub const SPI_WRITE_HEADER: [u8; 5] = [0x0A, 0x00, 0x00, 0x00, 0x00];
/// SPI header asking for pending read data
pub const SPI_READ_HEADER: [u8; 5] = [0x0B, 0x00, 0x00, 0x00, 0x00];

/// HCI packet indicator: command
const PACKET_COMMAND: u8 = 0x01;
/// HCI packet indicator: event
const PACKET_EVENT: u8 = 0x04;

/// HCI event: disconnection complete
const EVENT_DISCONNECTION_COMPLETE: u8 = 0x05;
/// HCI event: command complete
const EVENT_COMMAND_COMPLETE: u8 = 0x0E;
/// HCI event: command status
const EVENT_COMMAND_STATUS: u8 = 0x0F;
/// HCI event: LE meta event
const EVENT_LE_META: u8 = 0x3E;
/// HCI event: vendor specific
const EVENT_VENDOR: u8 = 0xFF;
/// LE meta subevent: connection complete
const LE_CONNECTION_COMPLETE: u8 = 0x01;
/// Vendor event: stack initialised after reset
const VENDOR_HAL_INITIALIZED: u16 = 0x0001;
/// Vendor event: a client wrote an attribute
const VENDOR_GATT_ATTRIBUTE_MODIFIED: u16 = 0x0C01;

/// ACI GATT init
pub const ACI_GATT_INIT: u16 = 0xFD01;
/// ACI GATT add service
pub const ACI_GATT_ADD_SERVICE: u16 = 0xFD02;
/// ACI GATT add characteristic
pub const ACI_GATT_ADD_CHARACTERISTIC: u16 = 0xFD04;
/// ACI GATT update characteristic value
pub const ACI_GATT_UPDATE_CHARACTERISTIC_VALUE: u16 = 0xFD06;
/// ACI GAP set discoverable
pub const ACI_GAP_SET_DISCOVERABLE: u16 = 0xFC83;
/// ACI GAP init
pub const ACI_GAP_INIT: u16 = 0xFC8A;
/// ACI GAP update advertising data
pub const ACI_GAP_UPDATE_ADVERTISING_DATA: u16 = 0xFC8E;

/// Characteristic property: read
pub const PROPERTY_READ: u8 = 0x02;
/// Characteristic property: write without response
pub const PROPERTY_WRITE_WITHOUT_RESPONSE: u8 = 0x04;
/// Characteristic property: write
pub const PROPERTY_WRITE: u8 = 0x08;

/// UUID type tag for 16-bit UUIDs
const UUID_16: u8 = 0x01;
/// AD type of the flags structure
const AD_FLAGS: u8 = 0x01;

/// Packet could not be built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum HciError {
    /// Parameters do not fit one packet
    TooLong,
}

/// Encoded command together with its opcode, matched against completion events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Opcode the completion event echoes
    pub opcode: u16,
    /// Bytes to put on the wire
    pub packet: Packet,
}

/// Builds a command packet
pub fn command(opcode: u16, params: &[u8]) -> Result<Command, HciError> {
    let len = u8::try_from(params.len()).map_err(|_| HciError::TooLong)?;
    let [lo, hi] = opcode.to_le_bytes();
    let mut packet = Packet::new();
    packet
        .extend_from_slice(&[PACKET_COMMAND, lo, hi, len])
        .map_err(|_| HciError::TooLong)?;
    packet.extend_from_slice(params).map_err(|_| HciError::TooLong)?;
    Ok(Command { opcode, packet })
}

/// GATT server init
pub fn gatt_init() -> Result<Command, HciError> {
    command(ACI_GATT_INIT, &[])
}

/// GAP init as peripheral without privacy, with room for `name`
pub fn gap_init_peripheral(name: &[u8]) -> Result<Command, HciError> {
    let name_len = u8::try_from(name.len()).map_err(|_| HciError::TooLong)?;
    command(ACI_GAP_INIT, &[0x01, 0x00, name_len])
}

/// Primary service with a 16-bit UUID
pub fn add_service(uuid: u16, max_attribute_records: u8) -> Result<Command, HciError> {
    let [lo, hi] = uuid.to_le_bytes();
    command(ACI_GATT_ADD_SERVICE, &[UUID_16, lo, hi, 0x01, max_attribute_records])
}

/// Fixed-length characteristic with a 16-bit UUID, no security.
///
/// With `notify_writes` the stack reports client writes as attribute-modified events.
pub fn add_characteristic(
    service: u16,
    uuid: u16,
    value_len: u8,
    properties: u8,
    notify_writes: bool,
) -> Result<Command, HciError> {
    let [service_lo, service_hi] = service.to_le_bytes();
    let [uuid_lo, uuid_hi] = uuid.to_le_bytes();
    let event_mask = u8::from(notify_writes);
    command(
        ACI_GATT_ADD_CHARACTERISTIC,
        &[
            service_lo, service_hi, UUID_16, uuid_lo, uuid_hi, value_len, properties, 0x00, event_mask, 0x07,
            0x00,
        ],
    )
}

/// Sets a characteristic value from the server side
pub fn update_characteristic_value(service: u16, characteristic: u16, value: &[u8]) -> Result<Command, HciError> {
    let len = u8::try_from(value.len()).map_err(|_| HciError::TooLong)?;
    let mut params: Vec<u8, MAX_PACKET_LEN> = Vec::new();
    params
        .extend_from_slice(&service.to_le_bytes())
        .and_then(|()| params.extend_from_slice(&characteristic.to_le_bytes()))
        .and_then(|()| params.extend_from_slice(&[0x00, len]))
        .and_then(|()| params.extend_from_slice(value))
        .map_err(|_| HciError::TooLong)?;
    command(ACI_GATT_UPDATE_CHARACTERISTIC_VALUE, &params)
}

/// Advertising interval in 0.625 ms units, clamped to the controller's range
pub fn advertising_interval_units(interval_ms: u16) -> u16 {
    let units = u32::from(interval_ms) * 8 / 5;
    u16::try_from(units.clamp(0x0020, 0x4000)).unwrap_or(0x4000)
}

/// Starts undirected advertising without name or UUIDs; those follow as advertising data
pub fn set_discoverable(interval_ms: u16, connectable: bool) -> Result<Command, HciError> {
    let [lo, hi] = advertising_interval_units(interval_ms).to_le_bytes();
    // ADV_IND or ADV_NONCONN_IND
    let advertising_type = if connectable { 0x00 } else { 0x03 };
    command(
        ACI_GAP_SET_DISCOVERABLE,
        &[advertising_type, lo, hi, lo, hi, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    )
}

/// AD structures of `payload` minus the flags, which the stack writes itself
pub fn advertising_data_without_flags(payload: &[u8]) -> Vec<u8, MAX_ADVERTISING_LEN> {
    let mut data = Vec::new();
    let mut rest = payload;
    while let Some((&len_byte, tail)) = rest.split_first() {
        let len = usize::from(len_byte);
        if len == 0 || len > tail.len() {
            break;
        }
        let (structure, next) = tail.split_at(len);
        if structure[0] != AD_FLAGS {
            let _ = data.push(len_byte);
            let _ = data.extend_from_slice(structure);
        }
        rest = next;
    }
    data
}

/// Replaces the advertising data with `payload` (flags dropped)
pub fn update_advertising_data(payload: &[u8]) -> Result<Command, HciError> {
    let data = advertising_data_without_flags(payload);
    let mut params: Vec<u8, { MAX_ADVERTISING_LEN + 1 }> = Vec::new();
    let len = u8::try_from(data.len()).map_err(|_| HciError::TooLong)?;
    params.push(len).map_err(|_| HciError::TooLong)?;
    params.extend_from_slice(&data).map_err(|_| HciError::TooLong)?;
    command(ACI_GAP_UPDATE_ADVERTISING_DATA, &params)
}

/// Little-endian handle at `offset` of a command's return parameters
pub fn handle_at(params: &[u8], offset: usize) -> Option<u16> {
    let bytes = params.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Event received from the coprocessor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HciEvent {
    /// A command finished
    CommandComplete {
        /// Command opcode
        opcode: u16,
        /// Zero on success
        status: u8,
        /// Return parameters after the status
        params: ReturnParams,
    },
    /// A command was accepted or refused
    CommandStatus {
        /// Command opcode
        opcode: u16,
        /// Zero when accepted
        status: u8,
    },
    /// Stack came up after a reset
    Initialized,
    /// A central connected
    Connected,
    /// The connection closed
    Disconnected,
    /// A client wrote an attribute
    AttributeModified {
        /// Attribute (value) handle
        handle: u16,
        /// Written bytes
        data: Vec<u8, MAX_WRITE_LEN>,
    },
    /// Anything this firmware does not act on
    Other,
}

/// Parses one event packet; `None` for anything that is not a well-formed event
pub fn parse_event(packet: &[u8]) -> Option<HciEvent> {
    let (&indicator, rest) = packet.split_first()?;
    if indicator != PACKET_EVENT {
        return None;
    }
    let (&code, rest) = rest.split_first()?;
    let (&len, rest) = rest.split_first()?;
    let params = rest.get(..usize::from(len))?;

    let event = match code {
        EVENT_COMMAND_COMPLETE => {
            let opcode = handle_at(params, 1)?;
            let status = *params.get(3)?;
            let tail = &params[4..];
            let kept = &tail[..tail.len().min(MAX_RETURN_LEN)];
            HciEvent::CommandComplete {
                opcode,
                status,
                params: Vec::from_slice(kept).ok()?,
            }
        }
        EVENT_COMMAND_STATUS => HciEvent::CommandStatus {
            status: *params.first()?,
            opcode: handle_at(params, 2)?,
        },
        EVENT_DISCONNECTION_COMPLETE => HciEvent::Disconnected,
        EVENT_LE_META if params.first() == Some(&LE_CONNECTION_COMPLETE) => HciEvent::Connected,
        EVENT_VENDOR => parse_vendor_event(params)?,
        _ => HciEvent::Other,
    };
    Some(event)
}

/// Vendor events: code, then the event body
fn parse_vendor_event(params: &[u8]) -> Option<HciEvent> {
    let event = match handle_at(params, 0)? {
        VENDOR_HAL_INITIALIZED => HciEvent::Initialized,
        VENDOR_GATT_ATTRIBUTE_MODIFIED => {
            // connection handle, attribute handle, length, offset, data
            let handle = handle_at(params, 4)?;
            let len = usize::from(*params.get(6)?);
            let data = params.get(9..9 + len)?;
            HciEvent::AttributeModified {
                handle,
                data: Vec::from_slice(&data[..len.min(MAX_WRITE_LEN)]).ok()?,
            }
        }
        _ => HciEvent::Other,
    };
    Some(event)
}

/// Maps a coprocessor event to what the link state machine understands
pub fn radio_event(event: HciEvent, actuator_handle: Option<u16>) -> Option<RadioEvent> {
    match event {
        HciEvent::Connected => Some(RadioEvent::Connected),
        HciEvent::Disconnected => Some(RadioEvent::Disconnected),
        HciEvent::AttributeModified { handle, data } => {
            let characteristic = if Some(handle) == actuator_handle {
                Characteristic::Actuator
            } else {
                Characteristic::Other(handle)
            };
            Some(RadioEvent::Written { characteristic, data })
        }
        HciEvent::CommandComplete { .. } | HciEvent::CommandStatus { .. } | HciEvent::Initialized | HciEvent::Other => {
            None
        }
    }
}

/// Reply to an SPI header exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct SpiStatus {
    /// Coprocessor is awake and answered
    pub ready: bool,
    /// Bytes it can accept
    pub write_space: u16,
    /// Bytes waiting to be read
    pub read_len: u16,
}

impl SpiStatus {
    /// Decodes the five bytes clocked in while sending a header
    pub const fn parse(header: &[u8; 5]) -> Self {
        Self {
            ready: header[0] == 0x02,
            write_space: u16::from_le_bytes([header[1], header[2]]),
            read_len: u16::from_le_bytes([header[3], header[4]]),
        }
    }
}
