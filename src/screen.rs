//! Screen selection from the display's selector lines

/// Screen shown on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum ScreenMode {
    /// Display reported a successful boot
    Boot,
    /// Speed, average and distance
    Ride,
    /// Bump marker pressed
    Bump,
    /// Music controls
    Music,
    /// Sensor self-check
    SelfCheck,
}

/// Music sub-control selected on the music screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum MusicControl {
    /// Play or pause
    PlayPause,
    /// Previous track
    Left,
    /// Next track
    Right,
}

/// Levels of the selector inputs sampled in one cycle, `true` = asserted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct ScreenInputs {
    /// Display boot confirmation
    pub boot: bool,
    /// Ride screen
    pub ride: bool,
    /// Bump pressed
    pub bump: bool,
    /// Music screen
    pub music: bool,
    /// Self-check screen
    pub self_check: bool,
    /// Music play/pause
    pub music_play_pause: bool,
    /// Music left
    pub music_left: bool,
    /// Music right
    pub music_right: bool,
}

impl ScreenInputs {
    /// Highest-priority asserted screen: Boot, Ride, Bump, Music, `SelfCheck`
    pub const fn selected_screen(&self) -> Option<ScreenMode> {
        if self.boot {
            Some(ScreenMode::Boot)
        } else if self.ride {
            Some(ScreenMode::Ride)
        } else if self.bump {
            Some(ScreenMode::Bump)
        } else if self.music {
            Some(ScreenMode::Music)
        } else if self.self_check {
            Some(ScreenMode::SelfCheck)
        } else {
            None
        }
    }

    /// Highest-priority asserted music control: play/pause, left, right
    pub const fn selected_music_control(&self) -> Option<MusicControl> {
        if self.music_play_pause {
            Some(MusicControl::PlayPause)
        } else if self.music_left {
            Some(MusicControl::Left)
        } else if self.music_right {
            Some(MusicControl::Right)
        } else {
            None
        }
    }
}

/// What the cycle should render after a screen update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum RenderAction {
    /// Nothing to send
    Idle,
    /// Refresh the ride values
    Ride,
    /// Check the sensor identities and show the self-check results
    SelfCheck,
    /// Self-check results are on screen and the operator still holds the input
    Hold,
}

/// Screen state retained across cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct ScreenState {
    /// Current screen; `None` until a selector has been asserted once
    mode: Option<ScreenMode>,
    /// Last selected music control
    music: Option<MusicControl>,
    /// Display has confirmed its boot at least once
    display_booted: bool,
    /// Self-check results shown and the self-check input not yet released
    holding: bool,
}

impl ScreenState {
    /// Nothing selected yet
    pub const fn new() -> Self {
        Self {
            mode: None,
            music: None,
            display_booted: false,
            holding: false,
        }
    }

    /// Applies one cycle of inputs.
    ///
    /// A screen stays selected when no selector is asserted. While the self-check
    /// results are held the inputs are not re-evaluated until the self-check line
    /// drops.
    pub const fn update(&mut self, inputs: &ScreenInputs) -> RenderAction {
        if self.holding {
            if inputs.self_check {
                return RenderAction::Hold;
            }
            self.holding = false;
        }

        if inputs.boot {
            self.display_booted = true;
        }
        if let Some(mode) = inputs.selected_screen() {
            self.mode = Some(mode);
        }
        if let Some(control) = inputs.selected_music_control() {
            self.music = Some(control);
        }

        match self.mode {
            Some(ScreenMode::Ride) => RenderAction::Ride,
            Some(ScreenMode::SelfCheck) if inputs.self_check => {
                self.holding = true;
                RenderAction::SelfCheck
            }
            _ => RenderAction::Idle,
        }
    }

    /// Current screen
    pub const fn mode(&self) -> Option<ScreenMode> {
        self.mode
    }

    /// Last selected music control
    pub const fn music(&self) -> Option<MusicControl> {
        self.music
    }

    /// Whether the display has confirmed its boot
    pub const fn display_booted(&self) -> bool {
        self.display_booted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_beats_ride() {
        let inputs = ScreenInputs {
            boot: true,
            ride: true,
            ..ScreenInputs::default()
        };
        assert_eq!(inputs.selected_screen(), Some(ScreenMode::Boot));
    }

    #[test]
    fn test_priority_order() {
        let mut inputs = ScreenInputs {
            ride: true,
            bump: true,
            music: true,
            self_check: true,
            ..ScreenInputs::default()
        };
        assert_eq!(inputs.selected_screen(), Some(ScreenMode::Ride));
        inputs.ride = false;
        assert_eq!(inputs.selected_screen(), Some(ScreenMode::Bump));
        inputs.bump = false;
        assert_eq!(inputs.selected_screen(), Some(ScreenMode::Music));
        inputs.music = false;
        assert_eq!(inputs.selected_screen(), Some(ScreenMode::SelfCheck));
        inputs.self_check = false;
        assert_eq!(inputs.selected_screen(), None);
    }

    #[test]
    fn test_music_control_priority() {
        let inputs = ScreenInputs {
            music_left: true,
            music_right: true,
            ..ScreenInputs::default()
        };
        assert_eq!(inputs.selected_music_control(), Some(MusicControl::Left));
        let inputs = ScreenInputs {
            music_play_pause: true,
            music_right: true,
            ..ScreenInputs::default()
        };
        assert_eq!(inputs.selected_music_control(), Some(MusicControl::PlayPause));
    }

    #[test]
    fn test_mode_persists_without_input() {
        let mut state = ScreenState::new();
        assert_eq!(state.update(&ScreenInputs::default()), RenderAction::Idle);
        assert_eq!(state.mode(), None);

        let ride = ScreenInputs {
            ride: true,
            ..ScreenInputs::default()
        };
        assert_eq!(state.update(&ride), RenderAction::Ride);
        assert_eq!(state.update(&ScreenInputs::default()), RenderAction::Ride);
        assert_eq!(state.mode(), Some(ScreenMode::Ride));
    }

    #[test]
    fn test_boot_latches() {
        let mut state = ScreenState::new();
        let boot = ScreenInputs {
            boot: true,
            ..ScreenInputs::default()
        };
        assert_eq!(state.update(&boot), RenderAction::Idle);
        assert!(state.display_booted());
        state.update(&ScreenInputs::default());
        assert!(state.display_booted());
        assert_eq!(state.mode(), Some(ScreenMode::Boot));
    }

    #[test]
    fn test_self_check_holds_until_release() {
        let mut state = ScreenState::new();
        let check = ScreenInputs {
            self_check: true,
            ..ScreenInputs::default()
        };
        assert_eq!(state.update(&check), RenderAction::SelfCheck);
        assert_eq!(state.update(&check), RenderAction::Hold);

        // Ride asserted while the self-check line is still held is ignored
        let check_and_ride = ScreenInputs {
            self_check: true,
            ride: true,
            ..ScreenInputs::default()
        };
        assert_eq!(state.update(&check_and_ride), RenderAction::Hold);
        assert_eq!(state.mode(), Some(ScreenMode::SelfCheck));

        // Released: screen stays self-check but nothing is re-sent
        assert_eq!(state.update(&ScreenInputs::default()), RenderAction::Idle);
        assert_eq!(state.mode(), Some(ScreenMode::SelfCheck));

        // Pressed again: a fresh check
        assert_eq!(state.update(&check), RenderAction::SelfCheck);
    }

    #[test]
    fn test_release_into_ride() {
        let mut state = ScreenState::new();
        let check = ScreenInputs {
            self_check: true,
            ..ScreenInputs::default()
        };
        state.update(&check);
        let ride = ScreenInputs {
            ride: true,
            ..ScreenInputs::default()
        };
        assert_eq!(state.update(&ride), RenderAction::Ride);
    }

    #[test]
    fn test_music_control_latches() {
        let mut state = ScreenState::new();
        let inputs = ScreenInputs {
            music: true,
            music_right: true,
            ..ScreenInputs::default()
        };
        assert_eq!(state.update(&inputs), RenderAction::Idle);
        state.update(&ScreenInputs::default());
        assert_eq!(state.music(), Some(MusicControl::Right));
        assert_eq!(state.mode(), Some(ScreenMode::Music));
    }
}
