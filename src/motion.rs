//! Wheel motion tracking shared between the pulse interrupt and the cycle task
//!
//! The pulse handler and the periodic cycle never see each other's half-written
//! state: every access copies the whole [`MotionState`] inside a critical section.

use core::cell::Cell;

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};

use crate::config::{STALL_THRESHOLD_MS, WHEEL_CIRCUMFERENCE_M};

/// Global motion state, written by the pulse handler and read by the cycle task
pub static MOTION: MotionMonitor = MotionMonitor::new();

/// Raw wheel state as left behind by the last pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct MotionState {
    /// Wheel rotations since power-up
    pub rotation_count: u32,
    /// Time between the last two pulses in milliseconds
    pub last_interval_ms: u32,
    /// Timestamp of the last pulse
    pub last_pulse_ms: Option<u64>,
    /// No pulse within the stall threshold
    pub idle: bool,
}

impl MotionState {
    /// State at power-up: no rotation seen, standing still
    pub const fn new() -> Self {
        Self {
            rotation_count: 0,
            last_interval_ms: 0,
            last_pulse_ms: None,
            idle: true,
        }
    }
}

impl Default for MotionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Consistent copy of the motion state taken by the cycle task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct MotionSnapshot {
    /// Wheel rotations since power-up
    pub rotation_count: u32,
    /// Time between the last two pulses in milliseconds
    pub last_interval_ms: u32,
    /// Time since the last pulse, or since boot if there was none
    pub since_last_pulse_ms: u64,
    /// Whether the stall threshold has been exceeded
    pub idle: bool,
}

/// Critical-section guarded holder for [`MotionState`]
pub struct MotionMonitor {
    /// The guarded state
    state: Mutex<CriticalSectionRawMutex, Cell<MotionState>>,
}

impl MotionMonitor {
    /// Creates a monitor in the power-up state
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(MotionState::new())),
        }
    }

    /// Records a wheel pulse observed at `now_ms`.
    ///
    /// Called from the pulse handler. Does nothing beyond the state update so it
    /// stays short enough for interrupt context.
    pub fn record_pulse(&self, now_ms: u64) {
        self.state.lock(|cell| {
            let mut state = cell.get();
            let interval = state
                .last_pulse_ms
                .map_or(0, |last| now_ms.saturating_sub(last));
            state.last_interval_ms = u32::try_from(interval).unwrap_or(u32::MAX);
            state.idle = false;
            state.rotation_count = state.rotation_count.wrapping_add(1);
            state.last_pulse_ms = Some(now_ms);
            cell.set(state);
        });
    }

    /// Takes a snapshot at `now_ms` and updates the idle flag in the same critical section
    pub fn snapshot(&self, now_ms: u64) -> MotionSnapshot {
        self.state.lock(|cell| {
            let mut state = cell.get();
            let since_last_pulse_ms = now_ms.saturating_sub(state.last_pulse_ms.unwrap_or(0));
            state.idle = since_last_pulse_ms >= STALL_THRESHOLD_MS;
            cell.set(state);
            MotionSnapshot {
                rotation_count: state.rotation_count,
                last_interval_ms: state.last_interval_ms,
                since_last_pulse_ms,
                idle: state.idle,
            }
        })
    }

    /// Copy of the raw state
    pub fn state(&self) -> MotionState {
        self.state.lock(Cell::get)
    }
}

impl Default for MotionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Speed in m/s for one wheel rotation taking `interval_ms`.
///
/// The interval is converted to seconds before the division. A zero interval
/// (first pulse after boot) yields zero.
#[allow(clippy::cast_precision_loss)]
pub fn speed_mps(interval_ms: u32) -> f32 {
    if interval_ms == 0 {
        return 0.0;
    }
    WHEEL_CIRCUMFERENCE_M / (interval_ms as f32 / 1000.0)
}

/// Speed for the snapshot, forced to zero while idle
pub fn riding_speed_mps(snapshot: &MotionSnapshot) -> f32 {
    if snapshot.idle {
        0.0
    } else {
        speed_mps(snapshot.last_interval_ms)
    }
}

/// Total distance in metres after `rotation_count` rotations
#[allow(clippy::cast_precision_loss)]
pub fn distance_m(rotation_count: u32) -> f32 {
    WHEEL_CIRCUMFERENCE_M * rotation_count as f32
}

/// Converts m/s to km/h
pub fn mps_to_kmh(speed: f32) -> f32 {
    speed * 3.6
}
