//! Events and system channel for sending and receiving events

use bike_computer::wireless::LinkState;
use defmt::Format;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};

/// System event channel for sending and receiving events
pub static EVENT_CHANNEL: Channel<CriticalSectionRawMutex, Event, EVENT_CHANNEL_CAPACITY> = Channel::new();
/// The capacity of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 10;

/// Sends an event to the system channel
pub async fn send_event(event: Event) {
    EVENT_CHANNEL.sender().send(event).await;
}

/// Receives the next event from the system channel
pub async fn receive_event() -> Event {
    EVENT_CHANNEL.receiver().receive().await
}

/// The event type used in the system, representing various system events
#[derive(Debug, Clone, Copy, Format)]
pub enum Event {
    /// Wireless initialisation finished with this state
    LinkStatus(LinkState),
    /// A central wrote the actuator characteristic
    Actuator(bool),
    /// The display confirmed its boot
    DisplayBooted,
}
