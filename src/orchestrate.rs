//! The main orchestrator task for the system

use bike_computer::system_state::SYSTEM_STATE;
use defmt::info;
use embassy_rp::gpio::{Level, Output};

use crate::{
    event::{Event, receive_event},
    watchdog::{TaskId, report_task_success},
};

/// Main coordination task: applies events to the system state and drives the actuated output
#[embassy_executor::task]
pub async fn orchestrate_task(mut actuated: Output<'static>) {
    let initial = SYSTEM_STATE.lock().await.actuator_on();
    actuated.set_level(Level::from(initial));

    loop {
        let event = receive_event().await;
        process_event(event, &mut actuated).await;
    }
}

/// Processes the received event
async fn process_event(event: Event, actuated: &mut Output<'static>) {
    match event {
        Event::LinkStatus(link) => {
            info!("Wireless link: {}", link);
            SYSTEM_STATE.lock().await.set_link(link);
        }
        Event::Actuator(on) => {
            SYSTEM_STATE.lock().await.set_actuator(on);
            actuated.set_level(Level::from(on));
        }
        Event::DisplayBooted => {
            info!("Display boot confirmed");
            SYSTEM_STATE.lock().await.mark_display_booted();
        }
    }
    report_task_success(TaskId::Orchestrator).await;
}
