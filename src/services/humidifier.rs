use serde::{Deserialize, Serialize};

use super::hysteresis::{step, DeadbandParams, ThermoState};

/// Target mode dialect: `<0` changes the mode bias, `0`/`1` sets active,
/// a 1000-range value sets the humidify target, a 2000-range value sets
/// the dehumidify target (spec.md §4.1's humidifier row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetMode {
    Off,
    Humidify,
    Dehumidify,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Humidify,
    Dehumidify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumidifierAction {
    TotalOff,
    HumidifyOn,
    HumidifySoftOn,
    HumidifyIdle,
    HumidifyForceIdle,
    DehumidifyOn,
    DehumidifySoftOn,
    DehumidifyIdle,
    DehumidifyForceIdle,
}

impl HumidifierAction {
    /// See [`crate::services::thermostat::ThermostatAction::action_id`].
    pub fn action_id(self) -> i32 {
        use crate::action::ids;
        match self {
            HumidifierAction::TotalOff => ids::TOTAL_OFF,
            HumidifierAction::HumidifyOn => ids::HUMIDIFIER_ON,
            HumidifierAction::HumidifySoftOn => ids::HUMIDIFIER_SOFT_ON,
            HumidifierAction::HumidifyIdle => ids::HUMIDIFIER_IDLE,
            HumidifierAction::HumidifyForceIdle => ids::HUMIDIFIER_FORCE_IDLE,
            HumidifierAction::DehumidifyOn => ids::DEHUMIDIFIER_ON,
            HumidifierAction::DehumidifySoftOn => ids::DEHUMIDIFIER_SOFT_ON,
            HumidifierAction::DehumidifyIdle => ids::DEHUMIDIFIER_IDLE,
            HumidifierAction::DehumidifyForceIdle => ids::DEHUMIDIFIER_FORCE_IDLE,
        }
    }
}

/// Humidifier / humidifier-with-temp service (spec.md §4.3), identical
/// hysteresis engine to [crate::services::thermostat::Thermostat] but
/// reads percent humidity instead of temperature.
///
/// The original source derives the `auto` deadband from
/// `HUMIDIF_TARGET_MODE_HUM − mid_target`, mixing the mode-tag integer
/// with a percent value; this is treated as a defect (see DESIGN.md) and
/// replaced with the straightforward midpoint of the two thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Humidifier {
    pub current_hum: f32,
    pub current_temp: f32,
    pub active: bool,
    pub current_state: ThermoState,
    pub target_mode: TargetMode,
    pub humidify_threshold: f32,
    pub dehumidify_threshold: f32,
    pub deadband: f32,
    pub deadband_soft_on: f32,
    pub deadband_force_idle: f32,
    active_side: Side,
}

impl Default for Humidifier {
    fn default() -> Self {
        Humidifier {
            current_hum: 0.0,
            current_temp: 0.0,
            active: false,
            current_state: ThermoState::Off,
            target_mode: TargetMode::Off,
            humidify_threshold: 0.0,
            dehumidify_threshold: 0.0,
            deadband: 2.0,
            deadband_soft_on: 1.0,
            deadband_force_idle: 3.0,
            active_side: Side::Humidify,
        }
    }
}

impl Humidifier {
    fn select_side(&self) -> Side {
        match self.target_mode {
            TargetMode::Humidify => Side::Humidify,
            TargetMode::Dehumidify => Side::Dehumidify,
            TargetMode::Off => self.active_side,
            TargetMode::Auto => {
                let midpoint = (self.humidify_threshold + self.dehumidify_threshold) / 2.0;
                match self.active_side {
                    Side::Humidify if self.current_hum <= self.dehumidify_threshold + 1.5 => {
                        Side::Humidify
                    }
                    Side::Dehumidify if self.current_hum >= self.humidify_threshold - 1.5 => {
                        Side::Dehumidify
                    }
                    _ => {
                        if self.current_hum < midpoint {
                            Side::Humidify
                        } else {
                            Side::Dehumidify
                        }
                    }
                }
            }
        }
    }

    /// Service-manager dialect decode (spec.md §4.1 humidifier row):
    /// `<0` changes the mode bias, `0`/`1` sets active, a 1000-range
    /// value sets the humidify target (percent = `value-1000`), a
    /// 2000-range value sets the dehumidify target analogously.
    pub fn apply_manager_value(&mut self, value: i32) {
        if value < 0 {
            self.target_mode = match -value {
                1 => TargetMode::Off,
                2 => TargetMode::Humidify,
                3 => TargetMode::Dehumidify,
                _ => TargetMode::Auto,
            };
        } else if value == 0 || value == 1 {
            self.active = value == 1;
        } else if (1000..2000).contains(&value) {
            self.humidify_threshold = (value - 1000) as f32;
        } else if (2000..3000).contains(&value) {
            self.dehumidify_threshold = (value - 2000) as f32;
        }
    }

    pub fn process_tick(&mut self) -> Option<HumidifierAction> {
        if !self.active {
            let changed = self.current_state != ThermoState::Off;
            self.current_state = ThermoState::Off;
            return changed.then_some(HumidifierAction::TotalOff);
        }

        let side = self.select_side();
        self.active_side = side;
        let params = DeadbandParams {
            deadband: self.deadband,
            soft_on: self.deadband_soft_on,
            force_idle: self.deadband_force_idle,
        };

        let (target, sensed) = match side {
            Side::Humidify => (self.humidify_threshold, self.current_hum),
            Side::Dehumidify => (
                2.0 * self.dehumidify_threshold - self.current_hum,
                self.dehumidify_threshold,
            ),
        };
        let next = step(self.current_state, sensed, target, params);

        if next == self.current_state {
            return None;
        }
        self.current_state = next;
        Some(match (side, next) {
            (Side::Humidify, ThermoState::On) => HumidifierAction::HumidifyOn,
            (Side::Humidify, ThermoState::SoftOn) => HumidifierAction::HumidifySoftOn,
            (Side::Humidify, ThermoState::Idle) => HumidifierAction::HumidifyIdle,
            (Side::Humidify, ThermoState::ForceIdle) => HumidifierAction::HumidifyForceIdle,
            (Side::Dehumidify, ThermoState::On) => HumidifierAction::DehumidifyOn,
            (Side::Dehumidify, ThermoState::SoftOn) => HumidifierAction::DehumidifySoftOn,
            (Side::Dehumidify, ThermoState::Idle) => HumidifierAction::DehumidifyIdle,
            (Side::Dehumidify, ThermoState::ForceIdle) => HumidifierAction::DehumidifyForceIdle,
            (_, ThermoState::Off) => HumidifierAction::TotalOff,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humidify_side_soft_starts() {
        let mut h = Humidifier {
            active: true,
            target_mode: TargetMode::Humidify,
            humidify_threshold: 50.0,
            deadband: 2.0,
            deadband_soft_on: 1.0,
            deadband_force_idle: 3.0,
            current_hum: 45.0,
            ..Default::default()
        };
        assert_eq!(h.process_tick(), Some(HumidifierAction::HumidifySoftOn));
    }

    #[test]
    fn manager_dialect_sets_targets() {
        let mut h = Humidifier::default();
        h.apply_manager_value(1);
        assert!(h.active);
        h.apply_manager_value(-2);
        assert_eq!(h.target_mode, TargetMode::Humidify);
        h.apply_manager_value(1055);
        assert_eq!(h.humidify_threshold, 55.0);
        h.apply_manager_value(2060);
        assert_eq!(h.dehumidify_threshold, 60.0);
    }

    #[test]
    fn auto_mode_uses_plain_midpoint() {
        let h = Humidifier {
            target_mode: TargetMode::Auto,
            humidify_threshold: 40.0,
            dehumidify_threshold: 60.0,
            current_hum: 49.0,
            ..Default::default()
        };
        assert_eq!(h.select_side(), Side::Humidify);
        let h2 = Humidifier { current_hum: 51.0, ..h };
        assert_eq!(h2.select_side(), Side::Dehumidify);
    }
}
