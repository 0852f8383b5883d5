//! Compile-time configuration for the bike computer

use core::f32::consts::PI;

/// Radius of the wheel carrying the hall-sensor magnet, in metres
pub const WHEEL_RADIUS_M: f32 = 0.2;

/// Distance covered by one wheel rotation, in metres
pub const WHEEL_CIRCUMFERENCE_M: f32 = 2.0 * PI * WHEEL_RADIUS_M;

/// Period of the measurement and rendering cycle
pub const CYCLE_PERIOD_MS: u64 = 200;

/// Without a pulse for this long the bike is considered standing still
pub const STALL_THRESHOLD_MS: u64 = 10_000;

/// Number of speed samples in the rolling average
pub const AVERAGE_SAMPLES: usize = 5;

/// Reference pressure at sea level in hPa
pub const SEA_LEVEL_PRESSURE_HPA: f32 = 1013.25;

/// Magnetic declination correction in radians
pub const DECLINATION_RAD: f32 = 0.003_839_724;

/// Baud rate of the Nextion display serial line
pub const DISPLAY_BAUD_RATE: u32 = 9600;

/// Name advertised by the wireless link
pub const DEVICE_NAME: &str = "IoToWSbSr";

/// 16-bit UUID of the actuated-output (LED) service
pub const LED_SERVICE_UUID: u16 = 0xA000;

/// 16-bit UUID of the byte-wide actuator characteristic in the LED service
pub const ACTUATOR_CHARACTERISTIC_UUID: u16 = 0xA001;

/// 16-bit UUID of the device information service
pub const DEVICE_INFORMATION_SERVICE_UUID: u16 = 0x180A;

/// Manufacturer name string characteristic of the device information service
pub const MANUFACTURER_NAME_UUID: u16 = 0x2A29;

/// Value of the manufacturer name characteristic
pub const MANUFACTURER_NAME: &str = "ST Micro";

/// Advertising interval in milliseconds
pub const ADVERTISING_INTERVAL_MS: u16 = 1000;
