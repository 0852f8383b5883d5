//! Wireless task
//!
//! Drives the link lifecycle on the BlueNRG-MS shield. When the shield does not come up
//! the link ends in the error state, the self-check screen shows the BLE line as failed
//! and the task stops.

use bike_computer::wireless::{LinkOutcome, LinkState, Radio, WirelessLink};
use defmt::{info, warn};
use embassy_rp::{
    peripherals::SPI1,
    spi::{Async, Spi},
};

use crate::{
    bluenrg::BlueNrg,
    event::{Event, send_event},
    watchdog::{TaskId, report_task_success},
};

/// The board's radio
pub type BoardRadio = BlueNrg<Spi<'static, SPI1, Async>>;

#[embassy_executor::task]
pub async fn wireless_task(mut radio: BoardRadio) {
    let mut link = WirelessLink::new();
    let state = link.start(&mut radio).await;
    send_event(Event::LinkStatus(state)).await;
    report_task_success(TaskId::Wireless).await;
    if state != LinkState::Ready {
        warn!("Wireless link unavailable: {}", state);
        return;
    }
    info!("Wireless link advertising");

    loop {
        let event = radio.next_event().await;
        match link.handle_event(&mut radio, event).await {
            LinkOutcome::Actuator(on) => send_event(Event::Actuator(on)).await,
            LinkOutcome::Readvertised(false) => warn!("Failed to restart advertising"),
            LinkOutcome::Readvertised(true) | LinkOutcome::None => {}
        }
        report_task_success(TaskId::Wireless).await;
    }
}
