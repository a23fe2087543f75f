use serde::{Deserialize, Serialize};

use super::door::VirtualStop;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverState {
    Open,
    Closed,
    Opening,
    Closing,
    Stop,
}

/// Window cover service (spec.md §4.4). HomeKit position is `[0, 100]`;
/// the motor follows a non-linear mapping so that the configured
/// `correction` can compensate for covers whose physical travel isn't
/// proportional to commanded open-percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowCover {
    pub state: CoverState,
    pub current_position: f32,
    pub target_position: f32,
    pub time_open_secs: f32,
    pub time_close_secs: f32,
    pub margin_sync_secs: f32,
    pub correction: f32,
    pub virtual_stop: VirtualStop,
    pub obstructed: bool,
    motor_position: f32,
}

/// `motor = homekit · (1 + k·100) / (1 + k·homekit)`, `k = correction/5000`.
pub fn homekit_to_motor(homekit: f32, correction: f32) -> f32 {
    let k = correction / 5000.0;
    homekit * (1.0 + k * 100.0) / (1.0 + k * homekit)
}

impl WindowCover {
    pub fn new(time_open_secs: f32, time_close_secs: f32, margin_sync_secs: f32, correction: f32) -> Self {
        WindowCover {
            state: CoverState::Closed,
            current_position: 0.0,
            target_position: 0.0,
            time_open_secs,
            time_close_secs,
            margin_sync_secs,
            correction,
            virtual_stop: VirtualStop::Disabled,
            obstructed: false,
            motor_position: 0.0,
        }
    }

    pub fn set_target(&mut self, homekit_target: f32) {
        if self.obstructed {
            return;
        }
        self.target_position = homekit_target.clamp(0.0, 100.0);
        self.state = if self.target_position > self.current_position {
            CoverState::Opening
        } else if self.target_position < self.current_position {
            CoverState::Closing
        } else {
            CoverState::Stop
        };
    }

    /// Last motor-mapped position sent to the driver, for diagnostics.
    pub fn motor_position(&self) -> f32 {
        self.motor_position
    }

    pub fn request_stop(&mut self) {
        if matches!(self.state, CoverState::Opening | CoverState::Closing) {
            self.state = CoverState::Stop;
            self.target_position = self.current_position;
        }
    }

    /// Service-manager dialect decode (spec.md §4.1 window-cover row):
    /// `<0` sets obstruction (`-1` clears it, any other negative latches
    /// it); `101` freezes the target at the current position; a
    /// 200-range value jumps directly to a position without running the
    /// motor; else the value is a plain `set_target`.
    pub fn apply_manager_value(&mut self, value: i32) {
        if value < 0 {
            self.obstructed = value != -1;
            if !self.obstructed {
                self.state = CoverState::Stop;
            }
        } else if value == 101 {
            self.target_position = self.current_position;
            self.state = CoverState::Stop;
        } else if (200..=300).contains(&value) {
            let pos = (value - 200) as f32;
            self.current_position = pos;
            self.target_position = pos;
            self.motor_position = homekit_to_motor(pos, self.correction);
            self.state = CoverState::Stop;
        } else {
            self.set_target(value as f32);
        }
    }

    /// Total travel time, lengthened by `margin_sync_secs` when the
    /// target is a full-range end (0 or 100) so the motor is given extra
    /// run time to guarantee it reaches a hard physical stop.
    fn travel_time(&self, opening: bool) -> f32 {
        let base = if opening {
            self.time_open_secs
        } else {
            self.time_close_secs
        };
        if self.target_position == 0.0 || self.target_position == 100.0 {
            base + self.margin_sync_secs
        } else {
            base
        }
    }

    pub fn tick(&mut self, elapsed_secs: f32) {
        match self.state {
            CoverState::Opening => {
                // `full` seconds cover the whole 0..100 range, so this is
                // the rate towards the target regardless of how far it is.
                let rate = 100.0 / self.travel_time(true);
                self.current_position =
                    (self.current_position + rate * elapsed_secs).min(self.target_position);
                self.motor_position = homekit_to_motor(self.current_position, self.correction);
                if self.current_position >= self.target_position {
                    self.state = if self.target_position >= 100.0 {
                        CoverState::Open
                    } else {
                        CoverState::Stop
                    };
                }
            }
            CoverState::Closing => {
                let rate = 100.0 / self.travel_time(false);
                self.current_position =
                    (self.current_position - rate * elapsed_secs).max(self.target_position);
                self.motor_position = homekit_to_motor(self.current_position, self.correction);
                if self.current_position <= self.target_position {
                    self.state = if self.target_position <= 0.0 {
                        CoverState::Closed
                    } else {
                        CoverState::Stop
                    };
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
    fn motor_mapping_identity_at_zero_correction() {
        assert!((homekit_to_motor(50.0, 0.0) - 50.0).abs() < 1e-6);
    }

    #[test]
    fn full_open_scenario_from_spec() {
        // time_open=20s, margin_sync=2s, correction=0: from 0 to 100,
        // arrival at t=22 +/- 0.1s.
        let mut c = WindowCover::new(20.0, 20.0, 2.0, 0.0);
        c.set_target(100.0);
        assert_eq!(c.state, CoverState::Opening);

        let mut elapsed = 0.0;
        while c.state == CoverState::Opening && elapsed < 30.0 {
            c.tick(0.1);
            elapsed += 0.1;
        }
        assert_eq!(c.state, CoverState::Open);
        assert!((elapsed - 22.0).abs() < 0.2, "arrived at t={elapsed}");
        assert_eq!(c.current_position, 100.0);
        assert_eq!(c.target_position, c.current_position);
    }

    #[test]
    fn manager_dialect_jump_to_position_skips_motion() {
        let mut c = WindowCover::new(20.0, 20.0, 0.0, 0.0);
        c.apply_manager_value(250);
        assert_eq!(c.current_position, 50.0);
        assert_eq!(c.state, CoverState::Stop);
    }

    #[test]
    fn stop_mid_travel_freezes_target_at_current() {
        let mut c = WindowCover::new(20.0, 20.0, 0.0, 0.0);
        c.set_target(100.0);
        c.tick(5.0);
        c.request_stop();
        assert_eq!(c.state, CoverState::Stop);
        assert_eq!(c.target_position, c.current_position);
    }
}
