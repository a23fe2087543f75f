use serde::{Deserialize, Serialize};

/// Shared deadband/hysteresis engine backing both the thermostat and the
/// humidifier processing tick (spec.md §4.3). A "side" is the heater/
/// humidify direction (room colder/drier than target) or the cooler/
/// dehumidify direction (room warmer/damper than target); `target` is the
/// threshold for the active side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThermoState {
    Off,
    Idle,
    SoftOn,
    On,
    ForceIdle,
}

#[derive(Debug, Clone, Copy)]
pub struct DeadbandParams {
    pub deadband: f32,
    pub soft_on: f32,
    pub force_idle: f32,
}

/// Runs one processing tick of the state machine for a single side.
///
/// `sensed` and `target` share units (°C for thermostat, % for humidifier).
/// The first crossing into the active band always lands on [ThermoState::SoftOn];
/// escalation to [ThermoState::On] only happens while already active and the
/// reading keeps moving further past `deadband + soft_on`. This keeps a cold
/// start from slamming straight to full output and matches the monotonic,
/// no-skipped-state transition sequence required of the controller.
pub fn step(state: ThermoState, sensed: f32, target: f32, p: DeadbandParams) -> ThermoState {
    let needs_more = target - sensed; // positive: sensed is below target, side wants to turn on
    let overshoot = sensed - target; // positive: sensed is above target, side should back off

    if p.force_idle > 0.0 && overshoot >= p.deadband + p.force_idle {
        return ThermoState::ForceIdle;
    }

    if needs_more.abs() <= p.deadband || overshoot.abs() <= p.deadband {
        return match state {
            ThermoState::On | ThermoState::SoftOn => state,
            _ => ThermoState::Idle,
        };
    }

    if needs_more > p.deadband {
        return match state {
            ThermoState::On | ThermoState::SoftOn if needs_more >= p.deadband + p.soft_on => {
                ThermoState::On
            }
            _ => ThermoState::SoftOn,
        };
    }

    ThermoState::Idle
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: DeadbandParams = DeadbandParams {
        deadband: 0.5,
        soft_on: 0.2,
        force_idle: 1.0,
    };

    #[test]
    fn heater_scenario_from_spec() {
        let mut state = ThermoState::Off;
        state = step(state, 21.0, 22.0, PARAMS);
        assert_eq!(state, ThermoState::SoftOn);

        state = step(state, 21.5, 22.0, PARAMS);
        assert_eq!(state, ThermoState::SoftOn);

        state = step(state, 23.2, 22.0, PARAMS);
        assert_eq!(state, ThermoState::Idle);

        state = step(state, 23.6, 22.0, PARAMS);
        assert_eq!(state, ThermoState::ForceIdle);
    }

    #[test]
    fn escalates_to_on_when_deeply_cold_while_active() {
        let mut state = ThermoState::SoftOn;
        state = step(state, 19.0, 22.0, PARAMS);
        assert_eq!(state, ThermoState::On);
    }
}
