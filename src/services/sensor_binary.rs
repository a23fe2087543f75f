use serde::{Deserialize, Serialize};

/// Backs contact/motion/leak/smoke/CO/CO2/filter-change/occupancy sensors,
/// plus stateless button/doorbell services (spec.md §4.1 sub-table: `Sensor
/// (contact/motion): v==-1 arms auto-off when active; else set state`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinarySensor {
    pub active: bool,
    pub auto_off_remaining: Option<u32>,
    /// Duration armed by [`BinarySensorCommand::ArmAutoOffWhenActive`];
    /// configured per-service, defaults to 30 s.
    pub configured_auto_off_secs: u32,
}

impl Default for BinarySensor {
    fn default() -> Self {
        BinarySensor { active: false, auto_off_remaining: None, configured_auto_off_secs: 30 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinarySensorCommand {
    ArmAutoOffWhenActive,
    SetState(bool),
}

pub fn decode_manager_value(value: i32) -> BinarySensorCommand {
    if value == -1 {
        BinarySensorCommand::ArmAutoOffWhenActive
    } else {
        BinarySensorCommand::SetState(value != 0)
    }
}

impl BinarySensor {
    /// `auto_off_secs` is only consulted for [`BinarySensorCommand::ArmAutoOffWhenActive`].
    pub fn apply(&mut self, command: BinarySensorCommand, auto_off_secs: u32) -> bool {
        let before = self.active;
        match command {
            BinarySensorCommand::ArmAutoOffWhenActive => {
                if self.active {
                    self.auto_off_remaining = Some(auto_off_secs);
                }
            }
            BinarySensorCommand::SetState(v) => self.active = v,
        }
        before != self.active
    }

    /// Service-manager dialect decode and apply in one step, using this
    /// sensor's own configured auto-off duration.
    pub fn apply_manager_value(&mut self, value: i32) -> bool {
        let secs = self.configured_auto_off_secs;
        self.apply(decode_manager_value(value), secs)
    }

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
