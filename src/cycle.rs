//! One run of the periodic measurement and rendering cycle
//!
//! The firmware calls [`CycleController::run`] on every tick of the 200 ms ticker.
//! Nothing here waits on time itself, so a whole cycle can be driven from a test.

use crate::{
    advisory::{Advisory, classify},
    config::AVERAGE_SAMPLES,
    environment::{
        Accelerometer, EnvironmentSnapshot, Gyroscope, HumidityTemperature, Magnetometer, PressureTemperature,
        SelfCheckReport, SensorSuite, altitude_m, heading_deg,
    },
    motion::{MotionMonitor, MotionSnapshot, distance_m, mps_to_kmh, riding_speed_mps},
    nextion::RideValues,
    rolling_average::RollingAverage,
    screen::{MusicControl, RenderAction, ScreenInputs, ScreenMode, ScreenState},
};

/// What the display has to show after a cycle
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum Render {
    /// Leave the display alone
    Nothing,
    /// Ride screen values
    Ride(RideValues),
    /// Self-check results
    SelfCheck(SelfCheckReport),
}

/// Everything computed during one cycle
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct CycleReport {
    /// Motion state the cycle worked from
    pub motion: MotionSnapshot,
    /// Current speed in m/s, zero while idle
    pub speed_mps: f32,
    /// Rolling average speed in m/s
    pub average_mps: f32,
    /// Distance since power-up in metres
    pub distance_m: f32,
    /// Sensor readings
    pub environment: EnvironmentSnapshot,
    /// Barometric altitude in metres
    pub altitude_m: f32,
    /// Compass heading in degrees
    pub heading_deg: f32,
    /// Selected weather advisory
    pub advisory: Advisory,
    /// Screen after input evaluation
    pub screen: Option<ScreenMode>,
    /// Music control after input evaluation
    pub music: Option<MusicControl>,
    /// Display boot confirmed
    pub display_booted: bool,
    /// Display work for this cycle
    pub render: Render,
}

/// State the cycle carries from one tick to the next
pub struct CycleController {
    /// Recent speed samples
    average: RollingAverage<AVERAGE_SAMPLES>,
    /// Screen selection and self-check hold
    screen: ScreenState,
}

impl CycleController {
    /// Zeroed average, no screen selected
    pub const fn new() -> Self {
        Self {
            average: RollingAverage::new(),
            screen: ScreenState::new(),
        }
    }

    /// Runs one cycle at `now_ms`.
    ///
    /// `link_ready` is the cached wireless status used by the self-check screen.
    /// Sensor identities are only checked while the self-check screen is entered.
    pub async fn run<H, P, M, A, G>(
        &mut self,
        motion: &MotionMonitor,
        now_ms: u64,
        sensors: &mut SensorSuite<H, P, M, A, G>,
        inputs: &ScreenInputs,
        link_ready: bool,
    ) -> CycleReport
    where
        H: HumidityTemperature,
        P: PressureTemperature,
        M: Magnetometer,
        A: Accelerometer,
        G: Accelerometer + Gyroscope,
    {
        // Idle detection, speed and distance from one consistent snapshot
        let snapshot = motion.snapshot(now_ms);
        let speed_mps = riding_speed_mps(&snapshot);
        let distance_m = distance_m(snapshot.rotation_count);
        let average_mps = self.average.update(speed_mps);

        let environment = sensors.sample().await;
        let altitude_m = altitude_m(environment.pressure, environment.pressure_temperature);
        let heading_deg = heading_deg(environment.magnetometer);
        let advisory = classify(&environment);

        let render = match self.screen.update(inputs) {
            RenderAction::Ride => Render::Ride(RideValues {
                speed_kmh: mps_to_kmh(speed_mps),
                average_kmh: mps_to_kmh(average_mps),
                distance_m,
                advisory,
            }),
            RenderAction::SelfCheck => Render::SelfCheck(sensors.self_check(link_ready).await),
            RenderAction::Idle | RenderAction::Hold => Render::Nothing,
        };

        CycleReport {
            motion: snapshot,
            speed_mps,
            average_mps,
            distance_m,
            environment,
            altitude_m,
            heading_deg,
            advisory,
            screen: self.screen.mode(),
            music: self.screen.music(),
            display_booted: self.screen.display_booted(),
            render,
        }
    }
}

impl Default for CycleController {
    fn default() -> Self {
        Self::new()
    }
}

/// Ticks lost when a cycle took `elapsed_ms` against a period of `period_ms`.
///
/// A cycle finishing within its period loses nothing; past that every started
/// period counts as one skipped tick.
pub fn skipped_ticks(elapsed_ms: u64, period_ms: u64) -> u32 {
    if period_ms == 0 || elapsed_ms <= period_ms {
        return 0;
    }
    u32::try_from(elapsed_ms / period_ms).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::STALL_THRESHOLD_MS, testing::suite};
    use embassy_futures::block_on;

    fn ride() -> ScreenInputs {
        ScreenInputs {
            ride: true,
            ..ScreenInputs::default()
        }
    }

    #[test]
    fn test_skipped_ticks() {
        assert_eq!(skipped_ticks(150, 200), 0);
        assert_eq!(skipped_ticks(200, 200), 0);
        assert_eq!(skipped_ticks(250, 200), 1);
        assert_eq!(skipped_ticks(650, 200), 3);
        assert_eq!(skipped_ticks(650, 0), 0);
    }

    #[test]
    fn test_ride_cycle() {
        let motion = MotionMonitor::new();
        let mut sensors = suite();
        let mut controller = CycleController::new();

        motion.record_pulse(1_000);
        motion.record_pulse(1_500);
        let report = block_on(controller.run(&motion, 1_600, &mut sensors, &ride(), false));

        assert!((report.speed_mps - 2.5133).abs() < 1e-3);
        assert!((report.average_mps - 2.5133 / 5.0).abs() < 1e-3);
        assert!((report.distance_m - 2.0 * 1.2566).abs() < 1e-3);
        assert_eq!(report.screen, Some(ScreenMode::Ride));
        // 21 °C on the barometer decides the advisory
        assert_eq!(report.advisory, Advisory::PLEASANT);
        match report.render {
            Render::Ride(values) => {
                assert!((values.speed_kmh - 9.048).abs() < 1e-2);
                assert_eq!(values.advisory, Advisory::PLEASANT);
            }
            other => panic!("expected ride render, got {other:?}"),
        }
    }

    #[test]
    fn test_idle_cycle_forces_zero_speed() {
        let motion = MotionMonitor::new();
        let mut sensors = suite();
        let mut controller = CycleController::new();

        motion.record_pulse(0);
        motion.record_pulse(500);
        let report = block_on(controller.run(&motion, 500 + STALL_THRESHOLD_MS, &mut sensors, &ride(), false));
        assert!(report.motion.idle);
        assert_eq!(report.speed_mps, 0.0);
        // Distance survives a stop
        assert!((report.distance_m - 2.0 * 1.2566).abs() < 1e-3);
    }

    #[test]
    fn test_average_fills_over_cycles() {
        let motion = MotionMonitor::new();
        let mut sensors = suite();
        let mut controller = CycleController::new();

        motion.record_pulse(0);
        motion.record_pulse(500);
        let mut report = block_on(controller.run(&motion, 600, &mut sensors, &ride(), false));
        for tick in 1..5u64 {
            report = block_on(controller.run(&motion, 600 + tick * 200, &mut sensors, &ride(), false));
        }
        assert!((report.average_mps - report.speed_mps).abs() < 1e-4);
    }

    #[test]
    fn test_self_check_reads_ids_once_then_holds() {
        let motion = MotionMonitor::new();
        let mut sensors = suite();
        sensors.press_temp.id_ok = false;
        let mut controller = CycleController::new();
        let check = ScreenInputs {
            self_check: true,
            ..ScreenInputs::default()
        };

        let first = block_on(controller.run(&motion, 200, &mut sensors, &check, true));
        match first.render {
            Render::SelfCheck(report) => {
                assert!(!report.barometer);
                assert!(report.humidity);
                assert!(report.wireless);
            }
            other => panic!("expected self-check render, got {other:?}"),
        }

        let held = block_on(controller.run(&motion, 400, &mut sensors, &check, true));
        assert_eq!(held.render, Render::Nothing);
        assert_eq!(held.screen, Some(ScreenMode::SelfCheck));
    }

    #[test]
    fn test_nothing_selected_renders_nothing() {
        let motion = MotionMonitor::new();
        let mut sensors = suite();
        let mut controller = CycleController::new();
        let report = block_on(controller.run(&motion, 200, &mut sensors, &ScreenInputs::default(), false));
        assert_eq!(report.render, Render::Nothing);
        assert_eq!(report.screen, None);
    }

    #[test]
    fn test_altitude_and_heading_are_derived() {
        let motion = MotionMonitor::new();
        let mut sensors = suite();
        let mut controller = CycleController::new();
        let report = block_on(controller.run(&motion, 200, &mut sensors, &ScreenInputs::default(), false));
        assert!(report.altitude_m > 100.0 && report.altitude_m < 120.0, "altitude {}", report.altitude_m);
        assert!((0.0..360.0).contains(&report.heading_deg));
    }
}
