use serde::{Deserialize, Serialize};

use super::hysteresis::{step, DeadbandParams, ThermoState};

/// Target mode dialect used by the service-manager set-ch decode (spec.md
/// §4.1): even non-listed values select the heater threshold, odd values
/// (minus 0.01) select the cooler threshold; `auto` lets the midpoint of
/// the two thresholds decide the active side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetMode {
    Off,
    Heater,
    Cooler,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Heater,
    Cooler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermostatAction {
    TotalOff,
    HeaterOn,
    HeaterSoftOn,
    HeaterIdle,
    HeaterForceIdle,
    CoolerOn,
    CoolerSoftOn,
    CoolerIdle,
    CoolerForceIdle,
}

impl ThermostatAction {
    /// Maps a state transition to the action id dispatched for it
    /// (spec.md §4.3: "on mode change, dispatch the corresponding action
    /// id").
    pub fn action_id(self) -> i32 {
        use crate::action::ids;
        match self {
            ThermostatAction::TotalOff => ids::TOTAL_OFF,
            ThermostatAction::HeaterOn => ids::HEATER_ON,
            ThermostatAction::HeaterSoftOn => ids::HEATER_SOFT_ON,
            ThermostatAction::HeaterIdle => ids::HEATER_IDLE,
            ThermostatAction::HeaterForceIdle => ids::HEATER_FORCE_IDLE,
            ThermostatAction::CoolerOn => ids::COOLER_ON,
            ThermostatAction::CoolerSoftOn => ids::COOLER_SOFT_ON,
            ThermostatAction::CoolerIdle => ids::COOLER_IDLE,
            ThermostatAction::CoolerForceIdle => ids::COOLER_FORCE_IDLE,
        }
    }
}

/// Thermostat / thermostat-with-hum service (spec.md §4.3). `current_hum`
/// is only meaningful for `thermostat-with-hum`; plain thermostats leave it
/// at zero and never read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thermostat {
    pub current_temp: f32,
    pub current_hum: f32,
    pub active: bool,
    pub current_state: ThermoState,
    pub target_mode: TargetMode,
    pub heater_threshold: f32,
    pub cooler_threshold: f32,
    pub deadband: f32,
    pub deadband_soft_on: f32,
    pub deadband_force_idle: f32,
    active_side: Side,
}

impl Default for Thermostat {
    fn default() -> Self {
        Thermostat {
            current_temp: 0.0,
            current_hum: 0.0,
            active: false,
            current_state: ThermoState::Off,
            target_mode: TargetMode::Off,
            heater_threshold: 0.0,
            cooler_threshold: 0.0,
            deadband: 0.5,
            deadband_soft_on: 0.2,
            deadband_force_idle: 1.0,
            active_side: Side::Heater,
        }
    }
}

impl Thermostat {
    /// Picks which threshold governs this tick. In `auto` mode the
    /// controller sticks to the side it was already driving unless the
    /// sensor has moved past the opposite threshold by more than 1.5
    /// (spec.md §4.3 "hysteresis prefers the current side").
    fn select_side(&self) -> Side {
        match self.target_mode {
            TargetMode::Heater => Side::Heater,
            TargetMode::Cooler => Side::Cooler,
            TargetMode::Off => self.active_side,
            TargetMode::Auto => {
                let midpoint = (self.heater_threshold + self.cooler_threshold) / 2.0;
                match self.active_side {
                    Side::Heater if self.current_temp <= self.cooler_threshold + 1.5 => Side::Heater,
                    Side::Cooler if self.current_temp >= self.heater_threshold - 1.5 => Side::Cooler,
                    _ => {
                        if self.current_temp < midpoint {
                            Side::Heater
                        } else {
                            Side::Cooler
                        }
                    }
                }
            }
        }
    }

    /// Service-manager dialect decode (spec.md §4.1 thermostat row): the
    /// value is a float encoded as `float*100`. `2`/`3` set active
    /// off/on; `4`/`5`/`6` set target mode to heater/cooler/auto; any
    /// other even value sets the heater threshold, any other odd value
    /// sets the cooler threshold (literally `value/100 - 0.01`, per the
    /// spec's "minus 0.01").
    pub fn apply_manager_value(&mut self, value: i32) {
        match value {
            2 => self.active = false,
            3 => self.active = true,
            4 => self.target_mode = TargetMode::Heater,
            5 => self.target_mode = TargetMode::Cooler,
            6 => self.target_mode = TargetMode::Auto,
            v if v % 2 == 0 => self.heater_threshold = v as f32 / 100.0,
            v => self.cooler_threshold = v as f32 / 100.0 - 0.01,
        }
    }

    /// Runs one processing tick, fired by the debounced update timer
    /// (default 300 ms, 200 ms minimum). Returns the action to dispatch
    /// when the current-state changes, or `None` if it held steady.
    pub fn process_tick(&mut self) -> Option<ThermostatAction> {
        if !self.active {
            let changed = self.current_state != ThermoState::Off;
            self.current_state = ThermoState::Off;
            return changed.then_some(ThermostatAction::TotalOff);
        }

        let side = self.select_side();
        self.active_side = side;
        let params = DeadbandParams {
            deadband: self.deadband,
            soft_on: self.deadband_soft_on,
            force_idle: self.deadband_force_idle,
        };

        let (target, sensed) = match side {
            Side::Heater => (self.heater_threshold, self.current_temp),
            // mirrored: a cooler wants to turn on when the room is warmer
            // than its threshold, so invert both readings around it.
            Side::Cooler => (
                2.0 * self.cooler_threshold - self.current_temp,
                self.cooler_threshold,
            ),
        };
        let next = step(self.current_state, sensed, target, params);

        if next == self.current_state {
            return None;
        }
        self.current_state = next;
        Some(match (side, next) {
            (Side::Heater, ThermoState::On) => ThermostatAction::HeaterOn,
            (Side::Heater, ThermoState::SoftOn) => ThermostatAction::HeaterSoftOn,
            (Side::Heater, ThermoState::Idle) => ThermostatAction::HeaterIdle,
            (Side::Heater, ThermoState::ForceIdle) => ThermostatAction::HeaterForceIdle,
            (Side::Cooler, ThermoState::On) => ThermostatAction::CoolerOn,
            (Side::Cooler, ThermoState::SoftOn) => ThermostatAction::CoolerSoftOn,
            (Side::Cooler, ThermoState::Idle) => ThermostatAction::CoolerIdle,
            (Side::Cooler, ThermoState::ForceIdle) => ThermostatAction::CoolerForceIdle,
            (_, ThermoState::Off) => ThermostatAction::TotalOff,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heater_scenario_from_spec() {
        let mut t = Thermostat {
            active: true,
            target_mode: TargetMode::Heater,
            heater_threshold: 22.0,
            deadband: 0.5,
            deadband_soft_on: 0.2,
            deadband_force_idle: 1.0,
            current_temp: 21.0,
            ..Default::default()
        };

        assert_eq!(t.process_tick(), Some(ThermostatAction::HeaterSoftOn));
        assert_eq!(t.current_state, ThermoState::SoftOn);

        t.current_temp = 21.5;
        assert_eq!(t.process_tick(), None);
        assert_eq!(t.current_state, ThermoState::SoftOn);

        t.current_temp = 23.2;
        assert_eq!(t.process_tick(), Some(ThermostatAction::HeaterIdle));

        t.current_temp = 23.6;
        assert_eq!(t.process_tick(), Some(ThermostatAction::HeaterForceIdle));
    }

    #[test]
    fn manager_dialect_sets_mode_and_thresholds() {
        let mut t = Thermostat::default();
        t.apply_manager_value(3);
        assert!(t.active);
        t.apply_manager_value(4);
        assert_eq!(t.target_mode, TargetMode::Heater);
        t.apply_manager_value(2200); // even -> heater threshold 22.00
        assert_eq!(t.heater_threshold, 22.0);
        t.apply_manager_value(2201); // odd -> cooler threshold 21.99
        assert!((t.cooler_threshold - 21.99).abs() < 1e-4);
    }

    #[test]
    fn inactive_dispatches_total_off_once() {
        let mut t = Thermostat {
            active: false,
            current_state: ThermoState::SoftOn,
            ..Default::default()
        };
        assert_eq!(t.process_tick(), Some(ThermostatAction::TotalOff));
        assert_eq!(t.process_tick(), None);
    }
}
