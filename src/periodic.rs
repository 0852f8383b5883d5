//! The 200 ms measurement and rendering cycle

use bike_computer::{
    advisory::Advisory,
    config::CYCLE_PERIOD_MS,
    cycle::{CycleController, Render, skipped_ticks},
    environment::SensorSuite,
    motion::MOTION,
    screen::ScreenInputs,
    system_state::SYSTEM_STATE,
};
use defmt::{debug, info, warn};
use embassy_embedded_hal::shared_bus::asynch::i2c::I2cDevice;
use embassy_rp::{
    gpio::Input,
    i2c::{Async, I2c},
    peripherals::I2C0,
};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::{Duration, Instant, Ticker};

use crate::{
    display::{DisplayCommand, send_display_command},
    event::{Event, send_event},
    sensor::{Hts221, Lps22hb, Lsm303agrAcc, Lsm303agrMag, Lsm6dsl},
    watchdog::{TaskId, report_task_success},
};

/// One device on the shared sensor bus
pub type SensorBus = I2cDevice<'static, NoopRawMutex, I2c<'static, I2C0, Async>>;

/// The sensors of the expansion board
pub type BoardSensors = SensorSuite<
    Hts221<SensorBus>,
    Lps22hb<SensorBus>,
    Lsm303agrMag<SensorBus>,
    Lsm303agrAcc<SensorBus>,
    Lsm6dsl<SensorBus>,
>;

/// Screen selector and music control lines, all active-high
pub struct SelectorPins {
    /// Boot screen
    pub boot: Input<'static>,
    /// Ride screen
    pub ride: Input<'static>,
    /// Bump screen
    pub bump: Input<'static>,
    /// Music screen
    pub music: Input<'static>,
    /// Self-check screen
    pub self_check: Input<'static>,
    /// Music play/pause
    pub music_play_pause: Input<'static>,
    /// Music previous
    pub music_left: Input<'static>,
    /// Music next
    pub music_right: Input<'static>,
}

impl SelectorPins {
    /// Reads all lines once
    fn sample(&self) -> ScreenInputs {
        ScreenInputs {
            boot: self.boot.is_high(),
            ride: self.ride.is_high(),
            bump: self.bump.is_high(),
            music: self.music.is_high(),
            self_check: self.self_check.is_high(),
            music_play_pause: self.music_play_pause.is_high(),
            music_left: self.music_left.is_high(),
            music_right: self.music_right.is_high(),
        }
    }
}

#[embassy_executor::task]
pub async fn cycle_task(mut sensors: BoardSensors, selectors: SelectorPins) {
    let failed = sensors.enable_all().await;
    if failed > 0 {
        warn!("{} sensors failed to enable, their readings stay at zero", failed);
    }

    let mut ticker = Ticker::every(Duration::from_millis(CYCLE_PERIOD_MS));
    let mut controller = CycleController::new();
    let mut last_advisory: Option<Advisory> = None;
    let mut boot_reported = false;

    info!("Cycle task started with a {}ms period", CYCLE_PERIOD_MS);

    loop {
        ticker.next().await;
        let started = Instant::now();

        let link_ready = SYSTEM_STATE.lock().await.link_ready();
        let inputs = selectors.sample();
        let report = controller
            .run(&MOTION, started.as_millis(), &mut sensors, &inputs, link_ready)
            .await;

        if sensors.failed_reads() > 0 {
            warn!("{} sensor reads failed, keeping previous values", sensors.failed_reads());
        }
        if last_advisory != Some(report.advisory) {
            info!("Advisory: {}", report.advisory.message());
            last_advisory = Some(report.advisory);
        }
        if report.display_booted && !boot_reported {
            send_event(Event::DisplayBooted).await;
            boot_reported = true;
        }
        debug!(
            "speed {} m/s, average {} m/s, distance {} m, altitude {} m, heading {}",
            report.speed_mps, report.average_mps, report.distance_m, report.altitude_m, report.heading_deg
        );

        match report.render {
            Render::Ride(values) => send_display_command(DisplayCommand::Ride(values)),
            Render::SelfCheck(check) => send_display_command(DisplayCommand::SelfCheck(check)),
            Render::Nothing => {}
        }

        // Skip missed ticks instead of firing them back to back
        let elapsed_ms = started.elapsed().as_millis();
        let skipped = skipped_ticks(elapsed_ms, CYCLE_PERIOD_MS);
        if skipped > 0 {
            warn!("Cycle took {}ms, skipping {} ticks", elapsed_ms, skipped);
            SYSTEM_STATE.lock().await.add_skipped_cycles(skipped);
            ticker.reset();
        }

        report_task_success(TaskId::Cycle).await;
    }
}
