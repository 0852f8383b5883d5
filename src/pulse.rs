//! Wheel pulse handling, runs on the high-priority executor

use bike_computer::motion::MOTION;
use defmt::info;
use embassy_rp::gpio::{Input, Output};
use embassy_time::Instant;

/// Records one rotation per falling edge of the hall sensor and toggles the status LED.
///
/// Nothing else happens here: values are only read back by the cycle task.
#[embassy_executor::task]
pub async fn pulse_task(mut hall: Input<'static>, mut status_led: Output<'static>) {
    info!("Pulse task waiting for wheel rotations");

    loop {
        hall.wait_for_falling_edge().await;
        MOTION.record_pulse(Instant::now().as_millis());
        status_led.toggle();
    }
}
