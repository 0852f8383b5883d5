//! Nextion display command protocol
//!
//! Each command is an ASCII assignment such as `n0.val=12` followed by three
//! `0xFF` bytes. The display task writes the finished commands to the UART.

use core::fmt::Write;

use heapless::{String, Vec};

use crate::{advisory::Advisory, environment::SelfCheckReport};

/// Terminates every command
pub const TERMINATOR: [u8; 3] = [0xFF, 0xFF, 0xFF];

/// Longest command including the terminator
pub const MAX_COMMAND_LEN: usize = 64;

/// Most commands a single screen update produces
pub const MAX_FRAME_COMMANDS: usize = 8;

/// Ride screen: speed number
const SPEED: &str = "n0.val=";
/// Ride screen: distance number
const DISTANCE: &str = "n1.val=";
/// Ride screen: average speed number
const AVERAGE: &str = "n2.val=";
/// Ride screen: advisory text
const ADVISORY: &str = "t0.txt=\"";
/// Suffix for a passed check
const PASS: &str = "PASS\"";
/// Suffix for a failed check
const FAIL: &str = "FAIL\"";

/// One framed command, terminator included
pub type Command = Vec<u8, MAX_COMMAND_LEN>;

/// Commands for one screen update, in send order
pub type Frame = Vec<Command, MAX_FRAME_COMMANDS>;

/// Building a command failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum CommandError {
    /// Command does not fit into [`MAX_COMMAND_LEN`]
    TooLong,
    /// Frame holds more than [`MAX_FRAME_COMMANDS`] commands
    FrameFull,
}

/// Rows on the self-check screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum CheckItem {
    /// Compass-chip accelerometer
    Accelerometer,
    /// Humidity sensor
    Humidity,
    /// Temperature channel
    Temperature,
    /// Inertial module
    Gyroscope,
    /// Barometer
    Barometer,
    /// Wireless link
    Wireless,
    /// Network link. The board has none; the row is reserved and never sent.
    Network,
}

impl CheckItem {
    /// Rows sent on the self-check screen, in order
    pub const RENDERED: [Self; 6] = [
        Self::Humidity,
        Self::Barometer,
        Self::Temperature,
        Self::Accelerometer,
        Self::Gyroscope,
        Self::Wireless,
    ];

    /// Text-field assignment with the row label, without the result
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Accelerometer => "t1.txt=\"Acc ",
            Self::Humidity => "t2.txt=\"Hx ",
            Self::Temperature => "t3.txt=\"Temp ",
            Self::Gyroscope => "t4.txt=\"Gyro ",
            Self::Barometer => "t5.txt=\"Bk ",
            Self::Wireless => "t6.txt=\"BLE ",
            Self::Network => "t7.txt=\"WiFi ",
        }
    }

    /// Result of this row in `report`
    pub const fn passed(self, report: &SelfCheckReport) -> bool {
        match self {
            Self::Accelerometer => report.accelerometer,
            Self::Humidity => report.humidity,
            Self::Temperature => report.temperature,
            Self::Gyroscope => report.gyroscope,
            Self::Barometer => report.barometer,
            Self::Wireless => report.wireless,
            Self::Network => false,
        }
    }
}

/// Values shown on the ride screen
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct RideValues {
    /// Current speed in km/h
    pub speed_kmh: f32,
    /// Rolling average speed in km/h
    pub average_kmh: f32,
    /// Distance since power-up in metres
    pub distance_m: f32,
    /// Weather advisory
    pub advisory: Advisory,
}

/// Appends the terminator and converts the text into a command
fn finish(text: &str) -> Result<Command, CommandError> {
    let mut command = Command::new();
    command
        .extend_from_slice(text.as_bytes())
        .map_err(|_| CommandError::TooLong)?;
    command
        .extend_from_slice(&TERMINATOR)
        .map_err(|_| CommandError::TooLong)?;
    Ok(command)
}

/// `mnemonic` followed by `value` truncated towards zero
#[allow(clippy::cast_possible_truncation)]
pub fn number(mnemonic: &str, value: f32) -> Result<Command, CommandError> {
    let mut text: String<MAX_COMMAND_LEN> = String::new();
    write!(text, "{mnemonic}{}", value as i32).map_err(|_| CommandError::TooLong)?;
    finish(&text)
}

/// `prefix` followed by `content` and the closing quote
pub fn text(prefix: &str, content: &str) -> Result<Command, CommandError> {
    let mut text: String<MAX_COMMAND_LEN> = String::new();
    write!(text, "{prefix}{content}\"").map_err(|_| CommandError::TooLong)?;
    finish(&text)
}

/// PASS or FAIL line for one self-check row
pub fn check(item: CheckItem, passed: bool) -> Result<Command, CommandError> {
    let mut text: String<MAX_COMMAND_LEN> = String::new();
    let result = if passed { PASS } else { FAIL };
    write!(text, "{}{result}", item.mnemonic()).map_err(|_| CommandError::TooLong)?;
    finish(&text)
}

/// Adds a command to the frame
fn push(frame: &mut Frame, command: Command) -> Result<(), CommandError> {
    frame.push(command).map_err(|_| CommandError::FrameFull)
}

/// Speed, average, distance and the advisory text
pub fn render_ride(values: &RideValues) -> Result<Frame, CommandError> {
    let mut frame = Frame::new();
    push(&mut frame, number(SPEED, values.speed_kmh)?)?;
    push(&mut frame, number(AVERAGE, values.average_kmh)?)?;
    push(&mut frame, number(DISTANCE, values.distance_m)?)?;
    push(&mut frame, text(ADVISORY, values.advisory.message())?)?;
    Ok(frame)
}

/// One PASS/FAIL line per rendered self-check row
pub fn render_self_check(report: &SelfCheckReport) -> Result<Frame, CommandError> {
    let mut frame = Frame::new();
    for item in CheckItem::RENDERED {
        push(&mut frame, check(item, item.passed(report))?)?;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Command text without the terminator
    fn body(command: &Command) -> &str {
        core::str::from_utf8(&command[..command.len() - 3]).unwrap_or("<invalid>")
    }

    fn assert_terminated(frame: &Frame) {
        for command in frame {
            assert!(command.ends_with(&TERMINATOR), "missing terminator");
            let ff = command.iter().filter(|b| **b == 0xFF).count();
            assert_eq!(ff, 3, "terminator merged or duplicated");
        }
    }

    #[test]
    fn test_number_command_bytes() {
        let command = number(SPEED, 9.0).unwrap_or_default();
        assert_eq!(&command[..], b"n0.val=9\xFF\xFF\xFF");
    }

    #[test]
    fn test_number_truncates() {
        let command = number(DISTANCE, 1234.99).unwrap_or_default();
        assert_eq!(body(&command), "n1.val=1234");
        let command = number(SPEED, 0.7).unwrap_or_default();
        assert_eq!(body(&command), "n0.val=0");
    }

    #[test]
    fn test_ride_frame() {
        let values = RideValues {
            speed_kmh: 25.9,
            average_kmh: 18.2,
            distance_m: 5026.5,
            advisory: Advisory::HOT,
        };
        let frame = render_ride(&values).unwrap_or_default();
        assert_eq!(frame.len(), 4);
        assert_eq!(body(&frame[0]), "n0.val=25");
        assert_eq!(body(&frame[1]), "n2.val=18");
        assert_eq!(body(&frame[2]), "n1.val=5026");
        assert_eq!(body(&frame[3]), "t0.txt=\"Its Hot :<\"");
        assert_terminated(&frame);
    }

    #[test]
    fn test_every_advisory_fits() {
        for message in crate::advisory::WEATHER_MESSAGES {
            assert!(text(ADVISORY, message).is_ok(), "{message} does not fit");
        }
    }

    #[test]
    fn test_self_check_frame() {
        let report = SelfCheckReport {
            humidity: true,
            barometer: false,
            temperature: true,
            accelerometer: true,
            gyroscope: false,
            wireless: true,
        };
        let frame = render_self_check(&report).unwrap_or_default();
        let lines: std::vec::Vec<&str> = frame.iter().map(body).collect();
        assert_eq!(
            lines,
            [
                "t2.txt=\"Hx PASS\"",
                "t5.txt=\"Bk FAIL\"",
                "t3.txt=\"Temp PASS\"",
                "t1.txt=\"Acc PASS\"",
                "t4.txt=\"Gyro FAIL\"",
                "t6.txt=\"BLE PASS\"",
            ]
        );
        assert_terminated(&frame);
    }

    #[test]
    fn test_network_row_never_sent() {
        let frame = render_self_check(&SelfCheckReport::default()).unwrap_or_default();
        assert_eq!(frame.len(), 6);
        for command in &frame {
            assert!(!body(command).starts_with("t7"));
        }
        assert_eq!(CheckItem::Network.mnemonic(), "t7.txt=\"WiFi ");
    }

    #[test]
    fn test_too_long_text_is_rejected() {
        let long = "x".repeat(80);
        assert_eq!(text(ADVISORY, &long), Err(CommandError::TooLong));
    }
}
