//! Environmental sensor collaborators and the per-cycle snapshot
//!
//! The concrete drivers live with the firmware binary. Everything here only sees
//! the traits below, so the sampling rules can be exercised with fakes on the host.

use core::f32::consts::PI;

use crate::config::{DECLINATION_RAD, SEA_LEVEL_PRESSURE_HPA};

/// Common part of every sensor on the expansion board
#[allow(async_fn_in_trait)]
pub trait Sensor {
    /// Bus or device error
    type Error;

    /// Powers the sensor up and starts continuous measurement
    async fn enable(&mut self) -> Result<(), Self::Error>;

    /// Reads the identity register and reports whether the expected value came back
    async fn read_id(&mut self) -> bool;
}

/// Combined humidity and temperature sensor
#[allow(async_fn_in_trait)]
pub trait HumidityTemperature: Sensor {
    /// Relative humidity in percent
    async fn humidity(&mut self) -> Result<f32, Self::Error>;
    /// Temperature in degrees Celsius
    async fn temperature(&mut self) -> Result<f32, Self::Error>;
}

/// Barometer with its own temperature channel
#[allow(async_fn_in_trait)]
pub trait PressureTemperature: Sensor {
    /// Pressure in hPa
    async fn pressure(&mut self) -> Result<f32, Self::Error>;
    /// Temperature in degrees Celsius
    async fn temperature(&mut self) -> Result<f32, Self::Error>;
}

/// Three-axis magnetometer, milligauss
#[allow(async_fn_in_trait)]
pub trait Magnetometer: Sensor {
    /// Field strength on x, y, z
    async fn magnetic_axes(&mut self) -> Result<[i32; 3], Self::Error>;
}

/// Three-axis accelerometer, milli-g
#[allow(async_fn_in_trait)]
pub trait Accelerometer: Sensor {
    /// Acceleration on x, y, z
    async fn acceleration_axes(&mut self) -> Result<[i32; 3], Self::Error>;
}

/// Three-axis gyroscope, milli-degrees per second
#[allow(async_fn_in_trait)]
pub trait Gyroscope: Sensor {
    /// Angular rate on x, y, z
    async fn angular_rate_axes(&mut self) -> Result<[i32; 3], Self::Error>;
}

/// Readings taken during one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct EnvironmentSnapshot {
    /// Relative humidity in percent
    pub humidity: f32,
    /// Temperature from the humidity sensor
    pub temperature: f32,
    /// Pressure in hPa
    pub pressure: f32,
    /// Temperature from the barometer
    pub pressure_temperature: f32,
    /// Pressure of the previous cycle
    pub previous_pressure: f32,
    /// Magnetometer axes
    pub magnetometer: [i32; 3],
    /// Accelerometer axes of the compass chip
    pub accelerometer: [i32; 3],
    /// Accelerometer axes of the inertial module
    pub accelerometer_aux: [i32; 3],
    /// Gyroscope axes
    pub gyroscope: [i32; 3],
}

/// Identity check results for the self-check screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct SelfCheckReport {
    /// Humidity sensor answered
    pub humidity: bool,
    /// Barometer answered
    pub barometer: bool,
    /// Temperature row, settled by the magnetometer check
    pub temperature: bool,
    /// Compass-chip accelerometer answered
    pub accelerometer: bool,
    /// Inertial module answered
    pub gyroscope: bool,
    /// Wireless link is up
    pub wireless: bool,
}

/// Keeps `current` when the read failed, counting the failure
fn or_stale<T, E>(result: Result<T, E>, current: T, failures: &mut u8) -> T {
    result.unwrap_or_else(|_| {
        *failures = failures.saturating_add(1);
        current
    })
}

/// All sensors of the expansion board.
///
/// `G` is the inertial module providing both an accelerometer and a gyroscope.
pub struct SensorSuite<H, P, M, A, G> {
    /// Humidity and temperature sensor
    pub hum_temp: H,
    /// Barometer
    pub press_temp: P,
    /// Magnetometer
    pub magnetometer: M,
    /// Compass-chip accelerometer
    pub accelerometer: A,
    /// Accelerometer and gyroscope module
    pub acc_gyro: G,
    /// Last snapshot, source of stale values when a read fails
    last: EnvironmentSnapshot,
    /// Whether a pressure reading has been taken yet
    has_pressure: bool,
    /// Failed reads during the last [`SensorSuite::sample`]
    failed_reads: u8,
}

impl<H, P, M, A, G> SensorSuite<H, P, M, A, G>
where
    H: HumidityTemperature,
    P: PressureTemperature,
    M: Magnetometer,
    A: Accelerometer,
    G: Accelerometer + Gyroscope,
{
    /// Bundles the sensors, no readings yet
    pub fn new(hum_temp: H, press_temp: P, magnetometer: M, accelerometer: A, acc_gyro: G) -> Self {
        Self {
            hum_temp,
            press_temp,
            magnetometer,
            accelerometer,
            acc_gyro,
            last: EnvironmentSnapshot::default(),
            has_pressure: false,
            failed_reads: 0,
        }
    }

    /// Enables every sensor and returns how many failed to start
    pub async fn enable_all(&mut self) -> u8 {
        let results = [
            self.hum_temp.enable().await.is_ok(),
            self.press_temp.enable().await.is_ok(),
            self.magnetometer.enable().await.is_ok(),
            self.accelerometer.enable().await.is_ok(),
            self.acc_gyro.enable().await.is_ok(),
        ];
        #[allow(clippy::cast_possible_truncation)]
        let failed = results.iter().filter(|ok| !**ok).count() as u8;
        failed
    }

    /// Reads every sensor once.
    ///
    /// A failed read leaves the previous value in place; there is no retry. The
    /// previous pressure is the pressure of the last cycle.
    pub async fn sample(&mut self) -> EnvironmentSnapshot {
        let last = self.last;
        let mut failures = 0;

        let humidity = or_stale(self.hum_temp.humidity().await, last.humidity, &mut failures);
        let temperature = or_stale(
            HumidityTemperature::temperature(&mut self.hum_temp).await,
            last.temperature,
            &mut failures,
        );
        let pressure_temperature = or_stale(
            PressureTemperature::temperature(&mut self.press_temp).await,
            last.pressure_temperature,
            &mut failures,
        );
        let pressure = or_stale(self.press_temp.pressure().await, last.pressure, &mut failures);
        let magnetometer = or_stale(
            self.magnetometer.magnetic_axes().await,
            last.magnetometer,
            &mut failures,
        );
        let accelerometer = or_stale(
            self.accelerometer.acceleration_axes().await,
            last.accelerometer,
            &mut failures,
        );
        let accelerometer_aux = or_stale(
            self.acc_gyro.acceleration_axes().await,
            last.accelerometer_aux,
            &mut failures,
        );
        let gyroscope = or_stale(
            self.acc_gyro.angular_rate_axes().await,
            last.gyroscope,
            &mut failures,
        );

        let previous_pressure = if self.has_pressure { last.pressure } else { pressure };
        self.has_pressure = true;

        let snapshot = EnvironmentSnapshot {
            humidity,
            temperature,
            pressure,
            pressure_temperature,
            previous_pressure,
            magnetometer,
            accelerometer,
            accelerometer_aux,
            gyroscope,
        };
        self.last = snapshot;
        self.failed_reads = failures;
        snapshot
    }

    /// Failed reads during the last sample
    pub const fn failed_reads(&self) -> u8 {
        self.failed_reads
    }

    /// Checks every sensor identity; `link_ready` is the cached wireless status
    pub async fn self_check(&mut self, link_ready: bool) -> SelfCheckReport {
        let humidity = self.hum_temp.read_id().await;
        let barometer = self.press_temp.read_id().await;
        let magnetometer = self.magnetometer.read_id().await;
        let accelerometer = self.accelerometer.read_id().await;
        let gyroscope = self.acc_gyro.read_id().await;
        SelfCheckReport {
            humidity,
            barometer,
            temperature: magnetometer,
            accelerometer,
            gyroscope,
            wireless: link_ready,
        }
    }
}

/// Barometric altitude in metres from pressure (hPa) and temperature (°C).
///
/// Uses the hypsometric formula against [`SEA_LEVEL_PRESSURE_HPA`]. Returns zero
/// for a non-positive pressure, which only a failed read produces.
pub fn altitude_m(pressure_hpa: f32, temperature_c: f32) -> f32 {
    if pressure_hpa <= 0.0 {
        return 0.0;
    }
    let ratio = libm::powf(SEA_LEVEL_PRESSURE_HPA / pressure_hpa, 1.0 / 5.257) - 1.0;
    ratio * (temperature_c + 273.15) / 0.0065
}

/// Compass heading in degrees, `[0, 360)`, corrected for declination
#[allow(clippy::cast_precision_loss)]
pub fn heading_deg(magnetometer: [i32; 3]) -> f32 {
    let mut angle = libm::atan2f(magnetometer[1] as f32, magnetometer[0] as f32) - DECLINATION_RAD;
    if angle < 0.0 {
        angle += 2.0 * PI;
    }
    if angle >= 2.0 * PI {
        angle -= 2.0 * PI;
    }
    angle * 180.0 / PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::suite;
    use embassy_futures::block_on;

    #[test]
    fn test_sample_reads_all_sensors() {
        let mut sensors = suite();
        let snapshot = block_on(sensors.sample());
        assert_eq!(snapshot.humidity, 55.0);
        assert_eq!(snapshot.temperature, 22.0);
        assert_eq!(snapshot.pressure, 1000.0);
        assert_eq!(snapshot.pressure_temperature, 21.0);
        assert_eq!(snapshot.magnetometer, [10, 20, 30]);
        assert_eq!(snapshot.accelerometer, [1, 2, 3]);
        assert_eq!(snapshot.accelerometer_aux, [4, 5, 6]);
        assert_eq!(snapshot.gyroscope, [6, 5, 4]);
        assert_eq!(sensors.failed_reads(), 0);
    }

    #[test]
    fn test_previous_pressure_carries_one_cycle() {
        let mut sensors = suite();
        let first = block_on(sensors.sample());
        assert_eq!(first.previous_pressure, 1000.0);
        sensors.press_temp.value = 990.0;
        let second = block_on(sensors.sample());
        assert_eq!(second.previous_pressure, 1000.0);
        assert_eq!(second.pressure, 990.0);
    }

    #[test]
    fn test_failed_read_keeps_stale_value() {
        let mut sensors = suite();
        block_on(sensors.sample());
        sensors.hum_temp.fail = true;
        sensors.hum_temp.value = 99.0;
        let snapshot = block_on(sensors.sample());
        assert_eq!(snapshot.humidity, 55.0);
        assert_eq!(snapshot.temperature, 22.0);
        assert_eq!(sensors.failed_reads(), 2);
    }

    #[test]
    fn test_failed_first_read_is_zero() {
        let mut sensors = suite();
        sensors.magnetometer.fail = true;
        let snapshot = block_on(sensors.sample());
        assert_eq!(snapshot.magnetometer, [0, 0, 0]);
    }

    #[test]
    fn test_enable_all_counts_failures() {
        let mut sensors = suite();
        assert_eq!(block_on(sensors.enable_all()), 0);
        sensors.press_temp.fail = true;
        sensors.acc_gyro.fail = true;
        assert_eq!(block_on(sensors.enable_all()), 2);
    }

    #[test]
    fn test_self_check_all_pass() {
        let mut sensors = suite();
        let report = block_on(sensors.self_check(true));
        assert_eq!(
            report,
            SelfCheckReport {
                humidity: true,
                barometer: true,
                temperature: true,
                accelerometer: true,
                gyroscope: true,
                wireless: true,
            }
        );
    }

    #[test]
    fn test_self_check_temperature_follows_magnetometer_when_humidity_fails() {
        let mut sensors = suite();
        sensors.hum_temp.id_ok = false;
        let report = block_on(sensors.self_check(true));
        assert!(!report.humidity);
        assert!(report.temperature);
    }

    #[test]
    fn test_self_check_temperature_needs_magnetometer() {
        let mut sensors = suite();
        sensors.magnetometer.id_ok = false;
        let report = block_on(sensors.self_check(false));
        assert!(report.humidity);
        assert!(!report.temperature);
        assert!(!report.wireless);
    }

    #[test]
    fn test_altitude_at_sea_level_is_zero() {
        assert!(altitude_m(SEA_LEVEL_PRESSURE_HPA, 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_altitude_at_900_hpa() {
        let altitude = altitude_m(900.0, 15.0);
        assert!(altitude > 1000.0 && altitude < 1020.0, "altitude was {altitude}");
    }

    #[test]
    fn test_altitude_without_pressure() {
        assert_eq!(altitude_m(0.0, 20.0), 0.0);
    }

    #[test]
    fn test_heading_applies_declination() {
        let north = heading_deg([1000, 0, 0]);
        assert!((north - (360.0 - DECLINATION_RAD.to_degrees())).abs() < 1e-2);
        let east = heading_deg([0, 1000, 0]);
        assert!((east - (90.0 - DECLINATION_RAD.to_degrees())).abs() < 1e-2);
    }

    #[test]
    fn test_heading_range() {
        for axes in [[1, 0, 0], [0, -1, 0], [-1, 0, 0], [-1, -1, 0], [5, 1, 0]] {
            let heading = heading_deg(axes);
            assert!((0.0..360.0).contains(&heading), "heading was {heading}");
        }
    }
}
