use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorState {
    Open,
    Closed,
    Opening,
    Closing,
    Stopped,
    Obstructed,
}

/// Mirrors the window cover's virtual-stop dialect (spec.md §4.4) so a
/// momentary button wired to a garage door can double as a stop request
/// mid-travel. The door spec doesn't spell out the button semantics the
/// way the cover scenario does, so this is derived from §8's cover
/// scenario and documented as an open-question resolution in DESIGN.md:
/// `Disabled` leaves stop unreachable from the input, `SameAction` treats
/// a repeated open/close press during that same motion as stop, and
/// `OppositeAction` additionally treats the opposite press during motion
/// as stop (the physical button never reverses direction on its own).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirtualStop {
    Disabled,
    SameAction,
    OppositeAction,
}

/// Garage door service (spec.md §4.4). Position is tracked virtually in
/// seconds of travel time, `[0, working_time_secs]`, by a 1 Hz estimator;
/// open/closed/opening/closing sensors, when wired, override the
/// estimate outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarageDoor {
    pub state: DoorState,
    pub working_time_secs: f32,
    pub virtual_position_secs: f32,
    pub has_confirming_sensors: bool,
    pub obstructed: bool,
    pub virtual_stop: VirtualStop,
    /// Set when motion resumes from [DoorState::Stopped]; the action
    /// dispatch engine adds this as a sticky offset to the outgoing
    /// action id so a "resume" is distinguishable from a fresh open/close.
    pub resuming: bool,
}

impl GarageDoor {
    pub fn new(working_time_secs: f32) -> Self {
        GarageDoor {
            state: DoorState::Closed,
            working_time_secs,
            virtual_position_secs: 0.0,
            has_confirming_sensors: false,
            obstructed: false,
            virtual_stop: VirtualStop::Disabled,
            resuming: false,
        }
    }

    pub fn set_target(&mut self, open: bool) {
        if self.obstructed {
            return;
        }
        self.resuming = self.state == DoorState::Stopped;
        self.state = if open {
            DoorState::Opening
        } else {
            DoorState::Closing
        };
    }

    /// Stop request from a momentary input, honored only while moving and
    /// only if `virtual_stop` allows it for the given repeated action.
    pub fn request_stop(&mut self, same_action: bool) -> bool {
        let moving = matches!(self.state, DoorState::Opening | DoorState::Closing);
        if !moving {
            return false;
        }
        let allowed = match self.virtual_stop {
            VirtualStop::Disabled => false,
            VirtualStop::SameAction => same_action,
            VirtualStop::OppositeAction => true,
        };
        if allowed {
            self.state = DoorState::Stopped;
        }
        allowed
    }

    /// Service-manager dialect decode, analogous to the window cover's
    /// (spec.md §4.1: "Fan, Security system, ... each has its analogous
    /// encoding"): `-1` clears an obstruction; `0`/`1` sets the target
    /// closed/open.
    pub fn apply_manager_value(&mut self, value: i32) {
        match value {
            -1 => self.clear_obstruction(),
            0 => self.set_target(false),
            _ => self.set_target(true),
        }
    }

    pub fn clear_obstruction(&mut self) {
        self.obstructed = false;
        self.state = DoorState::Stopped;
    }

    /// 1 Hz position estimator tick. Without confirming sensors the timer
    /// is authoritative: reaching a bound ends the motion. With sensors,
    /// reaching a bound starts a grace period; if the sensor doesn't
    /// confirm within it the door is latched [DoorState::Obstructed].
    pub fn tick(&mut self, elapsed_secs: f32, sensor_confirmed: bool) {
        match self.state {
            DoorState::Opening => {
                self.virtual_position_secs = (self.virtual_position_secs + elapsed_secs)
                    .min(self.working_time_secs);
                if self.virtual_position_secs >= self.working_time_secs {
                    if self.has_confirming_sensors && !sensor_confirmed {
                        self.obstructed = true;
                        self.state = DoorState::Obstructed;
                    } else {
                        self.state = DoorState::Open;
                        self.resuming = false;
                    }
                }
            }
            DoorState::Closing => {
                self.virtual_position_secs = (self.virtual_position_secs - elapsed_secs).max(0.0);
                if self.virtual_position_secs <= 0.0 {
                    if self.has_confirming_sensors && !sensor_confirmed {
                        self.obstructed = true;
                        self.state = DoorState::Obstructed;
                    } else {
                        self.state = DoorState::Closed;
                        self.resuming = false;
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resuming_from_stopped_is_flagged() {
        let mut d = GarageDoor::new(20.0);
        d.set_target(true);
        d.tick(5.0, false);
        d.state = DoorState::Stopped;
        d.set_target(true);
        assert!(d.resuming);
        assert_eq!(d.state, DoorState::Opening);
    }

    #[test]
    fn unconfirmed_sensor_latches_obstructed() {
        let mut d = GarageDoor::new(10.0);
        d.has_confirming_sensors = true;
        d.set_target(true);
        d.tick(10.0, false);
        assert_eq!(d.state, DoorState::Obstructed);
        assert!(d.obstructed);

        d.set_target(false);
        assert_eq!(d.state, DoorState::Obstructed, "obstruction blocks new targets until cleared");

        d.clear_obstruction();
        assert!(!d.obstructed);
    }

    #[test]
    fn timer_alone_completes_without_sensors() {
        let mut d = GarageDoor::new(10.0);
        d.set_target(true);
        d.tick(10.0, false);
        assert_eq!(d.state, DoorState::Open);
    }
}
