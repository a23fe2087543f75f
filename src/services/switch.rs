use serde::{Deserialize, Serialize};

/// Shared state machine for switch, outlet and water-valve services
/// (spec.md §4.4 "straight toggle" + auto-off countdown).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Switch {
    pub active: bool,
    /// `true` once a status-only (no physical actuation) toggle has been
    /// requested; used by the `v==5` service-manager dialect.
    pub status_only: bool,
    /// Remaining seconds until auto-off, decremented by a 1 Hz timer
    /// (spec.md §4.4). `None` when no auto-off is armed.
    pub auto_off_remaining: Option<u32>,
    /// Configured maximum on-duration; `None` disables auto-off entirely.
    pub max_duration_secs: Option<u32>,
}

/// Result of applying a service-manager dialect value to a [`Switch`]
/// (spec.md §4.1 sub-table): `v<0` arms auto-off; `v==4` toggle active;
/// `v==5` toggle status-only; `v>1` set-status; else set-active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwitchCommand {
    ArmAutoOff(u32),
    ToggleActive,
    ToggleStatusOnly,
    SetStatus(bool),
    SetActive(bool),
}

pub fn decode_manager_value(value: i32) -> SwitchCommand {
    if value < 0 {
        SwitchCommand::ArmAutoOff((-value) as u32)
    } else if value == 4 {
        SwitchCommand::ToggleActive
    } else if value == 5 {
        SwitchCommand::ToggleStatusOnly
    } else if value > 1 {
        SwitchCommand::SetStatus(value != 0)
    } else {
        SwitchCommand::SetActive(value != 0)
    }
}

impl Switch {
    /// Applies a decoded command, returning `true` if `active` changed.
    pub fn apply(&mut self, command: SwitchCommand) -> bool {
        let before = self.active;
        match command {
            SwitchCommand::ArmAutoOff(secs) => {
                self.auto_off_remaining = Some(secs);
                self.active = true;
            }
            SwitchCommand::ToggleActive => self.active = !self.active,
            SwitchCommand::ToggleStatusOnly => self.status_only = !self.status_only,
            SwitchCommand::SetStatus(v) => self.status_only = v,
            SwitchCommand::SetActive(v) => self.active = v,
        }
        before != self.active
    }

    /// 1 Hz auto-off tick (spec.md §8 scenario 1). Returns `true` when the
    /// countdown has just expired and the caller should dispatch the
    /// off-setter / turn the characteristic off.
    pub fn tick_auto_off(&mut self) -> bool {
        match self.auto_off_remaining {
            Some(0) => {
                self.auto_off_remaining = None;
                self.active = false;
                true
            }
            Some(ref mut remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_off_scenario_switch_3_seconds() {
        let mut sw = Switch::default();
        sw.apply(decode_manager_value(-3));
        assert!(sw.active);
        assert_eq!(sw.auto_off_remaining, Some(3));

        assert!(!sw.tick_auto_off()); // t=1
        assert!(!sw.tick_auto_off()); // t=2
        assert!(sw.tick_auto_off()); // t=3: expires
        assert!(!sw.active);
        assert_eq!(sw.auto_off_remaining, None);
    }

    #[test]
    fn manager_dialect_decoding() {
        assert_eq!(decode_manager_value(-5), SwitchCommand::ArmAutoOff(5));
        assert_eq!(decode_manager_value(4), SwitchCommand::ToggleActive);
        assert_eq!(decode_manager_value(5), SwitchCommand::ToggleStatusOnly);
        assert_eq!(decode_manager_value(2), SwitchCommand::SetStatus(true));
        assert_eq!(decode_manager_value(0), SwitchCommand::SetActive(false));
        assert_eq!(decode_manager_value(1), SwitchCommand::SetActive(true));
    }
}
