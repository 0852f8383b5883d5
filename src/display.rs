//! Display task driving the Nextion panel over UART

use bike_computer::{
    environment::SelfCheckReport,
    nextion::{RideValues, render_ride, render_self_check},
};
use defmt::{error, info, warn};
use embassy_rp::uart::{Async, UartTx};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};

use crate::watchdog::{TaskId, report_task_success};

/// Channel for screen updates
pub static DISPLAY_CHANNEL: Channel<CriticalSectionRawMutex, DisplayCommand, 3> = Channel::new();

/// Commands for controlling the display
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum DisplayCommand {
    /// Refresh the ride screen
    Ride(RideValues),
    /// Show the self-check results
    SelfCheck(SelfCheckReport),
}

/// Queues a screen update.
///
/// Never waits: the cycle must not stall behind a slow serial line, so an update
/// that finds the queue full is dropped and the next cycle sends fresh values.
pub fn send_display_command(command: DisplayCommand) {
    if DISPLAY_CHANNEL.try_send(command).is_err() {
        warn!("Display queue full, dropping update");
    }
}

/// Waits for the next screen update
async fn wait_for_display_command() -> DisplayCommand {
    DISPLAY_CHANNEL.receive().await
}

#[embassy_executor::task]
pub async fn display_task(mut uart: UartTx<'static, Async>) {
    info!("Display task initialized successfully");
    // Alive even while no screen is selected and nothing is rendered
    report_task_success(TaskId::Display).await;

    loop {
        let command = wait_for_display_command().await;

        let frame = match command {
            DisplayCommand::Ride(values) => render_ride(&values),
            DisplayCommand::SelfCheck(report) => {
                info!("Self-check: {}", report);
                render_self_check(&report)
            }
        };

        match frame {
            Ok(frame) => {
                for command in &frame {
                    if let Err(e) = uart.write(command).await {
                        warn!("Display write failed (continuing): {}", e);
                        break;
                    }
                }
            }
            Err(e) => error!("Failed to build display frame: {}", e),
        }

        report_task_success(TaskId::Display).await;
    }
}
