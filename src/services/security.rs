use serde::{Deserialize, Serialize};

/// Integer dialect accepted from external setters (spec.md §4.1 sub-table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityTargetState {
    StayArm,
    AwayArm,
    NightArm,
    Disarm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityCurrentState {
    StayArm,
    AwayArm,
    NightArm,
    Disarmed,
    AlarmTriggered,
}

/// Security system service (spec.md §4.5). A recurrent-alarm timer
/// oscillates `current_state` between [SecurityCurrentState::AlarmTriggered]
/// and the armed state matching `target_state`, to drive a chiming UI while
/// the alarm is sounding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySystem {
    pub target_state: SecurityTargetState,
    pub current_state: SecurityCurrentState,
    pub alarm_active: bool,
}

impl Default for SecuritySystem {
    fn default() -> Self {
        SecuritySystem {
            target_state: SecurityTargetState::Disarm,
            current_state: SecurityCurrentState::Disarmed,
            alarm_active: false,
        }
    }
}

fn armed_state_for(target: SecurityTargetState) -> SecurityCurrentState {
    match target {
        SecurityTargetState::StayArm => SecurityCurrentState::StayArm,
        SecurityTargetState::AwayArm => SecurityCurrentState::AwayArm,
        SecurityTargetState::NightArm => SecurityCurrentState::NightArm,
        SecurityTargetState::Disarm => SecurityCurrentState::Disarmed,
    }
}

/// Service-manager dialect decode (spec.md §4.1: "a small integer dialect"),
/// matching the conventional HomeKit security-system target-state integer
/// encoding: `0`=stay, `1`=away, `2`=night, `3`=disarm.
pub fn decode_manager_value(value: i32) -> SecurityTargetState {
    match value {
        0 => SecurityTargetState::StayArm,
        1 => SecurityTargetState::AwayArm,
        2 => SecurityTargetState::NightArm,
        _ => SecurityTargetState::Disarm,
    }
}

impl SecuritySystem {
    pub fn set_target(&mut self, target: SecurityTargetState) {
        self.target_state = target;
        if target == SecurityTargetState::Disarm {
            self.alarm_active = false;
        }
        self.current_state = armed_state_for(target);
    }

    pub fn trigger_alarm(&mut self) {
        if self.target_state != SecurityTargetState::Disarm {
            self.alarm_active = true;
            self.current_state = SecurityCurrentState::AlarmTriggered;
        }
    }

    pub fn silence(&mut self) {
        self.alarm_active = false;
        self.current_state = armed_state_for(self.target_state);
    }

    /// One recurrent-alarm timer firing: flips `current_state` between the
    /// triggered display and the armed state it's returning to.
    pub fn oscillate(&mut self) {
        if !self.alarm_active {
            return;
        }
        self.current_state = match self.current_state {
            SecurityCurrentState::AlarmTriggered => armed_state_for(self.target_state),
            _ => SecurityCurrentState::AlarmTriggered,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alarm_oscillates_between_triggered_and_armed() {
        let mut s = SecuritySystem::default();
        s.set_target(SecurityTargetState::AwayArm);
        s.trigger_alarm();
        assert_eq!(s.current_state, SecurityCurrentState::AlarmTriggered);
        s.oscillate();
        assert_eq!(s.current_state, SecurityCurrentState::AwayArm);
        s.oscillate();
        assert_eq!(s.current_state, SecurityCurrentState::AlarmTriggered);
    }

    #[test]
    fn manager_dialect_decodes_homekit_convention() {
        assert_eq!(decode_manager_value(0), SecurityTargetState::StayArm);
        assert_eq!(decode_manager_value(3), SecurityTargetState::Disarm);
    }

    #[test]
    fn disarm_clears_alarm() {
        let mut s = SecuritySystem::default();
        s.set_target(SecurityTargetState::StayArm);
        s.trigger_alarm();
        s.set_target(SecurityTargetState::Disarm);
        assert!(!s.alarm_active);
        assert_eq!(s.current_state, SecurityCurrentState::Disarmed);
    }
}
