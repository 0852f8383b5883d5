//! Advisory message selection from environmental readings

use crate::environment::EnvironmentSnapshot;

/// Weather messages shown to the rider, indexed by [`Advisory`]
pub const WEATHER_MESSAGES: [&str; 6] = [
    "Its pleasent to ride bike :)",
    "Its not to bad :) a bit Humid :)",
    "Its HUMID !! :|",
    "Not Today, Its very Humid :\\",
    "Its Chilling :O",
    "Its Hot :<",
];

/// Index into [`WEATHER_MESSAGES`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct Advisory(u8);

impl Advisory {
    /// Pleasant riding weather
    pub const PLEASANT: Self = Self(0);
    /// Slightly humid
    pub const SLIGHTLY_HUMID: Self = Self(1);
    /// Humid
    pub const HUMID: Self = Self(2);
    /// Very humid
    pub const VERY_HUMID: Self = Self(3);
    /// Cold
    pub const CHILLY: Self = Self(4);
    /// Hot
    pub const HOT: Self = Self(5);

    /// Position in the message table
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Message text
    pub const fn message(self) -> &'static str {
        WEATHER_MESSAGES[self.index()]
    }
}

/// Humidity rule. Values exactly on a boundary fall through to the last arm.
fn by_humidity(humidity: f32) -> Advisory {
    if humidity < 70.0 {
        Advisory::PLEASANT
    } else if humidity > 70.0 && humidity < 80.0 {
        Advisory::SLIGHTLY_HUMID
    } else if humidity > 80.0 && humidity < 90.0 {
        Advisory::HUMID
    } else {
        Advisory::VERY_HUMID
    }
}

/// Temperature rule. Exactly 20 °C counts as hot, like every other value outside the open band.
fn by_temperature(temperature: f32) -> Advisory {
    if temperature < 20.0 {
        Advisory::CHILLY
    } else if temperature > 20.0 && temperature < 35.0 {
        Advisory::PLEASANT
    } else {
        Advisory::HOT
    }
}

/// Pressure trend rule: falling pressure is pleasant, anything else is not
fn by_pressure_trend(previous: f32, current: f32) -> Advisory {
    if previous > current {
        Advisory::PLEASANT
    } else {
        Advisory::SLIGHTLY_HUMID
    }
}

/// Classifies a snapshot.
///
/// The rules run in a fixed order and each one overwrites the previous result:
/// humidity, humidity-sensor temperature, pressure trend, barometer temperature.
/// The barometer temperature therefore always decides.
pub fn classify(snapshot: &EnvironmentSnapshot) -> Advisory {
    let cascade = [
        by_humidity(snapshot.humidity),
        by_temperature(snapshot.temperature),
        by_pressure_trend(snapshot.previous_pressure, snapshot.pressure),
        by_temperature(snapshot.pressure_temperature),
    ];
    cascade.into_iter().fold(Advisory::PLEASANT, |_, next| next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(humidity: f32, temperature: f32, previous: f32, pressure: f32, baro_temp: f32) -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            humidity,
            temperature,
            pressure,
            pressure_temperature: baro_temp,
            previous_pressure: previous,
            ..EnvironmentSnapshot::default()
        }
    }

    #[test]
    fn test_humidity_rule() {
        assert_eq!(by_humidity(50.0), Advisory::PLEASANT);
        assert_eq!(by_humidity(75.0), Advisory::SLIGHTLY_HUMID);
        assert_eq!(by_humidity(85.0), Advisory::HUMID);
        assert_eq!(by_humidity(95.0), Advisory::VERY_HUMID);
        assert_eq!(by_humidity(70.0), Advisory::VERY_HUMID);
    }

    #[test]
    fn test_temperature_rule() {
        assert_eq!(by_temperature(10.0), Advisory::CHILLY);
        assert_eq!(by_temperature(25.0), Advisory::PLEASANT);
        assert_eq!(by_temperature(40.0), Advisory::HOT);
        assert_eq!(by_temperature(20.0), Advisory::HOT);
    }

    #[test]
    fn test_pressure_trend_rule() {
        assert_eq!(by_pressure_trend(1010.0, 1000.0), Advisory::PLEASANT);
        assert_eq!(by_pressure_trend(1000.0, 1010.0), Advisory::SLIGHTLY_HUMID);
        assert_eq!(by_pressure_trend(1000.0, 1000.0), Advisory::SLIGHTLY_HUMID);
    }

    #[test]
    fn test_last_rule_wins() {
        // Humidity says very humid, first temperature says hot, pressure says rising,
        // barometer temperature says chilly.
        let readings = snapshot(95.0, 40.0, 1000.0, 1010.0, 10.0);
        assert_eq!(classify(&readings), Advisory::CHILLY);

        // Humidity says humid, first temperature says chilly, barometer temperature pleasant.
        let readings = snapshot(85.0, 5.0, 1010.0, 1000.0, 25.0);
        assert_eq!(classify(&readings), Advisory::PLEASANT);

        let readings = snapshot(60.0, 25.0, 1010.0, 1000.0, 38.0);
        assert_eq!(classify(&readings), Advisory::HOT);
    }

    #[test]
    fn test_classify_is_pure() {
        let readings = snapshot(72.0, 18.0, 1005.0, 1004.0, 30.0);
        let first = classify(&readings);
        for _ in 0..10 {
            assert_eq!(classify(&readings), first);
        }
    }

    #[test]
    fn test_message_lookup() {
        assert_eq!(Advisory::PLEASANT.message(), "Its pleasent to ride bike :)");
        assert_eq!(Advisory::HOT.message(), "Its Hot :<");
        assert_eq!(Advisory::CHILLY.index(), 4);
    }
}
