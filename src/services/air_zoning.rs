use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::hysteresis::ThermoState;
use crate::model::service::ServiceIndex;

/// Which side the shared HVAC unit is currently driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MainMode {
    Off,
    Heater,
    Cooler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IAirZoningAction {
    AllOff,
    AllIdle,
    AllSoftOn,
    AnyOn,
}

/// Aggregate HVAC controller multiplexing N thermostats over one unit with
/// per-zone gates (spec.md §4.3 "iAirZoning"). Cyclic references to the
/// member thermostats are stored as registry indices, never pointers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IAirZoning {
    pub zones: Vec<ServiceIndex>,
    pub main_mode: MainMode,
    pub close_before_open_delay_ms: u32,
    gate_open: Vec<bool>,
    /// Zones waiting to open once `close_before_open_delay_ms` has
    /// elapsed since `last_close_at`. Not persisted: a restart with no
    /// in-flight close is the same as an elapsed delay.
    #[serde(skip)]
    pending_open: Vec<usize>,
    #[serde(skip)]
    last_close_at: Option<Instant>,
}

impl IAirZoning {
    pub fn new(zones: Vec<ServiceIndex>, close_before_open_delay_ms: u32) -> Self {
        let gate_open = vec![false; zones.len()];
        IAirZoning {
            zones,
            main_mode: MainMode::Off,
            close_before_open_delay_ms,
            gate_open,
            pending_open: Vec::new(),
            last_close_at: None,
        }
    }

    /// One iteration of the two-pass gate loop. `zone_states` is the
    /// current thermostat state and requested side for each member, in
    /// the same order as `self.zones`. `now` times the close-before-open
    /// delay. Returns the gates that should be closed this pass, the
    /// gates that should be opened (after the configured delay has
    /// elapsed since the close pass), and the dispatch action if the
    /// main mode changed.
    ///
    /// Pass 1 forces any zone asking for the side opposite the current
    /// main mode back to OFF — a zone never drives the shared unit the
    /// wrong way. Pass 2 derives the new main mode from the (possibly
    /// corrected) zone states and decides gate movement: open gates for
    /// zones that are ON or SOFT_ON, close gates for idle zones unless
    /// every zone is idle (in which case the unit is shutting down
    /// wholesale and gates can close immediately). A zone wanting to
    /// open is queued in `pending_open` rather than opened immediately
    /// whenever a close happened less than `close_before_open_delay_ms`
    /// ago, so a zone's gate never opens in the same window another
    /// zone's gate closes in (spec.md §4.3 "prevents simultaneous duct
    /// transitions").
    pub fn tick(
        &mut self,
        zone_states: &mut [(ThermoState, MainMode)],
        now: Instant,
    ) -> (Vec<usize>, Vec<usize>, Option<IAirZoningAction>) {
        assert_eq!(zone_states.len(), self.zones.len());

        // Pass 1: force-off zones fighting the current main mode.
        for (state, side) in zone_states.iter_mut() {
            let opposing = match (self.main_mode, *side) {
                (MainMode::Heater, MainMode::Cooler) => true,
                (MainMode::Cooler, MainMode::Heater) => true,
                _ => false,
            };
            if opposing {
                *state = ThermoState::Off;
            }
        }

        let any_on = zone_states
            .iter()
            .any(|(s, _)| matches!(s, ThermoState::On | ThermoState::SoftOn));
        let all_idle = zone_states
            .iter()
            .all(|(s, _)| matches!(s, ThermoState::Idle | ThermoState::ForceIdle));
        let all_off = zone_states.iter().all(|(s, _)| *s == ThermoState::Off);

        let new_main = if all_off {
            MainMode::Off
        } else if let Some((_, side)) = zone_states
            .iter()
            .find(|(s, _)| matches!(s, ThermoState::On | ThermoState::SoftOn))
        {
            *side
        } else {
            self.main_mode
        };

        let action = if new_main != self.main_mode {
            Some(match (all_off, all_idle, any_on) {
                (true, _, _) => IAirZoningAction::AllOff,
                (_, true, false) => IAirZoningAction::AllIdle,
                (_, _, true) => IAirZoningAction::AnyOn,
                _ => IAirZoningAction::AllSoftOn,
            })
        } else {
            None
        };
        self.main_mode = new_main;

        let mut to_close = Vec::new();
        let mut wants_open = vec![false; zone_states.len()];
        for (i, (state, _)) in zone_states.iter().enumerate() {
            let open = matches!(state, ThermoState::On | ThermoState::SoftOn);
            wants_open[i] = open;
            if open {
                if !self.gate_open[i] && !self.pending_open.contains(&i) {
                    self.pending_open.push(i);
                }
            } else if self.gate_open[i] {
                to_close.push(i);
                self.gate_open[i] = false;
                self.last_close_at = Some(now);
            } else {
                self.pending_open.retain(|&p| p != i);
            }
        }

        let delay = Duration::from_millis(self.close_before_open_delay_ms as u64);
        let delay_elapsed = match self.last_close_at {
            Some(t) => now.duration_since(t) >= delay,
            None => true,
        };

        let mut to_open = Vec::new();
        if delay_elapsed {
            let ready: Vec<usize> = std::mem::take(&mut self.pending_open);
            for i in ready {
                if wants_open[i] && !self.gate_open[i] {
                    to_open.push(i);
                    self.gate_open[i] = true;
                }
            }
        }

        (to_close, to_open, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposing_zone_is_forced_off() {
        let mut z = IAirZoning::new(vec![0, 1], 2000);
        z.main_mode = MainMode::Heater;
        let mut states = [
            (ThermoState::On, MainMode::Heater),
            (ThermoState::On, MainMode::Cooler),
        ];
        z.tick(&mut states, Instant::now());
        assert_eq!(states[1].0, ThermoState::Off);
    }

    #[test]
    fn all_off_dispatches_all_off_action() {
        let mut z = IAirZoning::new(vec![0], 2000);
        z.main_mode = MainMode::Heater;
        let mut states = [(ThermoState::Off, MainMode::Heater)];
        let (_, _, action) = z.tick(&mut states, Instant::now());
        assert_eq!(action, Some(IAirZoningAction::AllOff));
        assert_eq!(z.main_mode, MainMode::Off);
    }

    #[test]
    fn opening_zone_waits_out_the_close_before_open_delay() {
        let mut z = IAirZoning::new(vec![0, 1], 2000);
        let t0 = Instant::now();

        // Zone 0 on, opens immediately (no prior close).
        let mut states = [(ThermoState::On, MainMode::Heater), (ThermoState::Idle, MainMode::Heater)];
        let (_, to_open, _) = z.tick(&mut states, t0);
        assert_eq!(to_open, vec![0]);

        // Zone 0 goes idle (closes), zone 1 wants on in the same tick:
        // its open must be deferred, not fired alongside the close.
        let mut states = [(ThermoState::Idle, MainMode::Heater), (ThermoState::On, MainMode::Heater)];
        let (to_close, to_open, _) = z.tick(&mut states, t0 + Duration::from_millis(100));
        assert_eq!(to_close, vec![0]);
        assert!(to_open.is_empty(), "zone 1 should not open in the same tick zone 0 closed");

        // Before the delay elapses, it still doesn't open.
        let (to_close, to_open, _) = z.tick(&mut states, t0 + Duration::from_millis(1500));
        assert!(to_close.is_empty());
        assert!(to_open.is_empty());

        // Once the delay elapses, the deferred open fires.
        let (to_close, to_open, _) = z.tick(&mut states, t0 + Duration::from_millis(2100));
        assert!(to_close.is_empty());
        assert_eq!(to_open, vec![1]);
    }
}
