//! Wireless link lifecycle
//!
//! The radio stack itself is a collaborator behind [`Radio`]. This module owns the
//! lifecycle state, the advertising payload and the reaction to radio events.

use heapless::Vec;

use crate::config::{
    ADVERTISING_INTERVAL_MS, DEVICE_INFORMATION_SERVICE_UUID, DEVICE_NAME, LED_SERVICE_UUID,
};

/// Maximum legacy advertising payload length
pub const MAX_ADVERTISING_LEN: usize = 31;

/// Longest characteristic write kept from a radio event
pub const MAX_WRITE_LEN: usize = 20;

/// AD type: flags
const AD_FLAGS: u8 = 0x01;
/// AD type: complete list of 16-bit service UUIDs
const AD_COMPLETE_16BIT_UUIDS: u8 = 0x03;
/// AD type: complete local name
const AD_COMPLETE_LOCAL_NAME: u8 = 0x09;
/// LE general discoverable, BR/EDR not supported
const FLAGS_GENERAL_DISCOVERABLE_LE_ONLY: u8 = 0x06;

/// Lifecycle of the wireless link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum LinkState {
    /// Radio not touched yet
    Uninitialized,
    /// Radio initialisation running
    Initializing,
    /// Initialised and advertising or connected
    Ready,
    /// Initialisation failed
    Error,
}

/// Characteristics a central can write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum Characteristic {
    /// Byte-wide value driving the actuated output
    Actuator,
    /// Any other handle
    Other(u16),
}

/// Event delivered by the radio stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// A central connected
    Connected,
    /// The central went away
    Disconnected,
    /// A central wrote a characteristic
    Written {
        /// Target characteristic
        characteristic: Characteristic,
        /// Written bytes
        data: Vec<u8, MAX_WRITE_LEN>,
    },
}

/// Advertising parameters handed to the radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// AD structures
    pub payload: Vec<u8, MAX_ADVERTISING_LEN>,
    /// Interval in milliseconds
    pub interval_ms: u16,
    /// Connectable undirected advertising
    pub connectable: bool,
}

impl Advertisement {
    /// Connectable advertising with the device name and both service UUIDs
    pub fn device() -> Self {
        Self {
            payload: advertising_payload(),
            interval_ms: ADVERTISING_INTERVAL_MS,
            connectable: true,
        }
    }
}

/// Wireless stack collaborator
#[allow(async_fn_in_trait)]
pub trait Radio {
    /// Stack error
    type Error;

    /// Brings the stack up
    async fn init(&mut self) -> Result<(), Self::Error>;

    /// Starts (or restarts) advertising
    async fn start_advertising(&mut self, advertisement: &Advertisement) -> Result<(), Self::Error>;

    /// Waits for the next stack event
    async fn next_event(&mut self) -> RadioEvent;
}

/// What the main loop has to act on after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum LinkOutcome {
    /// Nothing for the rest of the system
    None,
    /// Actuated output must be switched
    Actuator(bool),
    /// Advertising was restarted after a disconnect; `false` if the radio refused
    Readvertised(bool),
}

/// Pushes one AD structure, silently dropping it if it does not fit
fn push_ad(payload: &mut Vec<u8, MAX_ADVERTISING_LEN>, ad_type: u8, data: &[u8]) {
    let Ok(len) = u8::try_from(data.len() + 1) else {
        return;
    };
    if payload.len() + data.len() + 2 > MAX_ADVERTISING_LEN {
        return;
    }
    let _ = payload.push(len);
    let _ = payload.push(ad_type);
    let _ = payload.extend_from_slice(data);
}

/// Flags, service UUIDs and device name as advertising data
pub fn advertising_payload() -> Vec<u8, MAX_ADVERTISING_LEN> {
    let mut payload = Vec::new();
    push_ad(&mut payload, AD_FLAGS, &[FLAGS_GENERAL_DISCOVERABLE_LE_ONLY]);
    let [led_lo, led_hi] = LED_SERVICE_UUID.to_le_bytes();
    let [info_lo, info_hi] = DEVICE_INFORMATION_SERVICE_UUID.to_le_bytes();
    push_ad(&mut payload, AD_COMPLETE_16BIT_UUIDS, &[led_lo, led_hi, info_lo, info_hi]);
    push_ad(&mut payload, AD_COMPLETE_LOCAL_NAME, DEVICE_NAME.as_bytes());
    payload
}

/// Link state machine
pub struct WirelessLink {
    /// Current lifecycle state
    state: LinkState,
    /// Advertising used on start and after every disconnect
    advertisement: Advertisement,
}

impl WirelessLink {
    /// Fresh link, radio untouched
    pub fn new() -> Self {
        Self {
            state: LinkState::Uninitialized,
            advertisement: Advertisement::device(),
        }
    }

    /// Current lifecycle state
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// Whether the link is up
    pub const fn is_ready(&self) -> bool {
        matches!(self.state, LinkState::Ready)
    }

    /// Uninitialized → Initializing. Returns `false` if initialisation already ran.
    pub const fn begin(&mut self) -> bool {
        if matches!(self.state, LinkState::Uninitialized) {
            self.state = LinkState::Initializing;
            true
        } else {
            false
        }
    }

    /// Initializing → Ready or Error
    pub const fn complete(&mut self, succeeded: bool) -> LinkState {
        if matches!(self.state, LinkState::Initializing) {
            self.state = if succeeded { LinkState::Ready } else { LinkState::Error };
        }
        self.state
    }

    /// Runs initialisation and, once ready, starts advertising.
    ///
    /// Returns the state after completion; the caller hands it to the main loop once.
    pub async fn start<R: Radio>(&mut self, radio: &mut R) -> LinkState {
        if !self.begin() {
            return self.state;
        }
        let initialised = radio.init().await.is_ok();
        if self.complete(initialised) == LinkState::Ready
            && radio.start_advertising(&self.advertisement).await.is_err()
        {
            self.state = LinkState::Error;
        }
        self.state
    }

    /// Reacts to one radio event.
    ///
    /// A disconnect restarts advertising before this returns, so no later event is
    /// looked at until the device is discoverable again. Only single-byte writes to
    /// the actuator characteristic switch the output.
    pub async fn handle_event<R: Radio>(&mut self, radio: &mut R, event: RadioEvent) -> LinkOutcome {
        if !self.is_ready() {
            return LinkOutcome::None;
        }
        match event {
            RadioEvent::Disconnected => {
                let restarted = radio.start_advertising(&self.advertisement).await.is_ok();
                LinkOutcome::Readvertised(restarted)
            }
            RadioEvent::Written {
                characteristic: Characteristic::Actuator,
                data,
            } if data.len() == 1 => LinkOutcome::Actuator(data[0] != 0),
            RadioEvent::Written { .. } | RadioEvent::Connected => LinkOutcome::None,
        }
    }
}

impl Default for WirelessLink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    /// Radio call recorded by the fake
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Init,
        Advertise,
        Event,
    }

    /// Scripted radio recording the calls made on it
    struct FakeRadio {
        init_ok: bool,
        advertise_ok: bool,
        events: std::collections::VecDeque<RadioEvent>,
        calls: std::vec::Vec<Call>,
    }

    impl FakeRadio {
        fn new(init_ok: bool) -> Self {
            Self {
                init_ok,
                advertise_ok: true,
                events: std::collections::VecDeque::new(),
                calls: std::vec::Vec::new(),
            }
        }
    }

    impl Radio for FakeRadio {
        type Error = ();

        async fn init(&mut self) -> Result<(), ()> {
            self.calls.push(Call::Init);
            if self.init_ok { Ok(()) } else { Err(()) }
        }

        async fn start_advertising(&mut self, advertisement: &Advertisement) -> Result<(), ()> {
            assert!(advertisement.connectable);
            self.calls.push(Call::Advertise);
            if self.advertise_ok { Ok(()) } else { Err(()) }
        }

        async fn next_event(&mut self) -> RadioEvent {
            self.calls.push(Call::Event);
            self.events.pop_front().unwrap_or(RadioEvent::Connected)
        }
    }

    fn write(characteristic: Characteristic, bytes: &[u8]) -> RadioEvent {
        let mut data = Vec::new();
        let _ = data.extend_from_slice(bytes);
        RadioEvent::Written { characteristic, data }
    }

    #[test]
    fn test_payload_layout() {
        let payload = advertising_payload();
        assert_eq!(&payload[..3], &[0x02, 0x01, 0x06]);
        assert_eq!(&payload[3..9], &[0x05, 0x03, 0x00, 0xA0, 0x0A, 0x18]);
        assert_eq!(payload[9], 10);
        assert_eq!(payload[10], 0x09);
        assert_eq!(&payload[11..], b"IoToWSbSr");
        assert!(payload.len() <= MAX_ADVERTISING_LEN);
    }

    #[test]
    fn test_state_transitions() {
        let mut link = WirelessLink::new();
        assert_eq!(link.state(), LinkState::Uninitialized);
        assert!(link.begin());
        assert_eq!(link.state(), LinkState::Initializing);
        assert!(!link.begin());
        assert_eq!(link.complete(true), LinkState::Ready);
        // Completion is only taken once
        assert_eq!(link.complete(false), LinkState::Ready);
    }

    #[test]
    fn test_start_advertises_when_ready() {
        let mut radio = FakeRadio::new(true);
        let mut link = WirelessLink::new();
        assert_eq!(block_on(link.start(&mut radio)), LinkState::Ready);
        assert_eq!(radio.calls, [Call::Init, Call::Advertise]);
    }

    #[test]
    fn test_init_failure_is_error() {
        let mut radio = FakeRadio::new(false);
        let mut link = WirelessLink::new();
        assert_eq!(block_on(link.start(&mut radio)), LinkState::Error);
        assert_eq!(radio.calls, [Call::Init]);
        assert!(!link.is_ready());
        // Events are ignored without a link
        let outcome = block_on(link.handle_event(&mut radio, RadioEvent::Disconnected));
        assert_eq!(outcome, LinkOutcome::None);
    }

    #[test]
    fn test_advertising_refused_is_error() {
        let mut radio = FakeRadio::new(true);
        radio.advertise_ok = false;
        let mut link = WirelessLink::new();
        assert_eq!(block_on(link.start(&mut radio)), LinkState::Error);
    }

    #[test]
    fn test_disconnect_readvertises_before_next_event() {
        let mut radio = FakeRadio::new(true);
        radio.events.push_back(RadioEvent::Disconnected);
        radio.events.push_back(write(Characteristic::Actuator, &[1]));
        let mut link = WirelessLink::new();
        block_on(link.start(&mut radio));

        let event = block_on(radio.next_event());
        let first = block_on(link.handle_event(&mut radio, event));
        let event = block_on(radio.next_event());
        let second = block_on(link.handle_event(&mut radio, event));

        assert_eq!(first, LinkOutcome::Readvertised(true));
        assert_eq!(second, LinkOutcome::Actuator(true));
        assert_eq!(
            radio.calls,
            [Call::Init, Call::Advertise, Call::Event, Call::Advertise, Call::Event]
        );
    }

    #[test]
    fn test_actuator_writes() {
        let mut radio = FakeRadio::new(true);
        let mut link = WirelessLink::new();
        block_on(link.start(&mut radio));

        let on = block_on(link.handle_event(&mut radio, write(Characteristic::Actuator, &[7])));
        assert_eq!(on, LinkOutcome::Actuator(true));
        let off = block_on(link.handle_event(&mut radio, write(Characteristic::Actuator, &[0])));
        assert_eq!(off, LinkOutcome::Actuator(false));
        let two_bytes = block_on(link.handle_event(&mut radio, write(Characteristic::Actuator, &[1, 1])));
        assert_eq!(two_bytes, LinkOutcome::None);
        let other = block_on(link.handle_event(&mut radio, write(Characteristic::Other(0x20), &[1])));
        assert_eq!(other, LinkOutcome::None);
    }
}
