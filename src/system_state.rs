//! System state shared between the firmware tasks

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};

use crate::wireless::LinkState;

/// Global system state - initialized with default values
pub static SYSTEM_STATE: Mutex<CriticalSectionRawMutex, SystemState> = Mutex::new(SystemState::new());

/// State written by one task and read by another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct SystemState {
    /// Wireless link status as last reported
    link: LinkState,
    /// Actuated output as last written over the air
    actuator_on: bool,
    /// Display has confirmed its boot
    display_booted: bool,
    /// Cycles dropped because the previous one overran its period
    skipped_cycles: u32,
}

impl SystemState {
    /// Creates a new `SystemState` with default values
    pub const fn new() -> Self {
        Self {
            link: LinkState::Uninitialized,
            // The actuator characteristic starts out on
            actuator_on: true,
            display_booted: false,
            skipped_cycles: 0,
        }
    }

    /// Sets the wireless link status
    pub const fn set_link(&mut self, link: LinkState) {
        self.link = link;
    }

    /// Wireless link status
    pub const fn link(&self) -> LinkState {
        self.link
    }

    /// Whether the wireless link is up, the cached flag for the self-check
    pub const fn link_ready(&self) -> bool {
        matches!(self.link, LinkState::Ready)
    }

    /// Sets the actuated output
    pub const fn set_actuator(&mut self, on: bool) {
        self.actuator_on = on;
    }

    /// Actuated output
    pub const fn actuator_on(&self) -> bool {
        self.actuator_on
    }

    /// Latches the display boot confirmation
    pub const fn mark_display_booted(&mut self) {
        self.display_booted = true;
    }

    /// Whether the display has confirmed its boot
    pub const fn display_booted(&self) -> bool {
        self.display_booted
    }

    /// Counts cycles skipped after an overrun
    pub const fn add_skipped_cycles(&mut self, count: u32) {
        self.skipped_cycles = self.skipped_cycles.saturating_add(count);
    }

    /// Cycles skipped since power-up
    pub const fn skipped_cycles(&self) -> u32 {
        self.skipped_cycles
    }
}

impl Default for SystemState {
    fn default() -> Self {
        Self::new()
    }
}
