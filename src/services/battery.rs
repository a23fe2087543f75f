use serde::{Deserialize, Serialize};

/// Battery level service, driven by a downstream characteristic recompute
/// when set-ch targets it (spec.md §4.1 step 6 lists battery among the
/// services whose downstream processing is triggered on set-ch writes).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Battery {
    pub level_percent: u8,
    pub charging: bool,
    pub low_battery: bool,
}

/// Threshold below which the low-battery characteristic is asserted.
pub const LOW_BATTERY_THRESHOLD: u8 = 15;

impl Battery {
    pub fn set_level(&mut self, level_percent: u8) {
        self.level_percent = level_percent.min(100);
        self.low_battery = self.level_percent < LOW_BATTERY_THRESHOLD;
    }

    /// Service-manager dialect decode (spec.md §4.1: "each has its
    /// analogous encoding"): the value is the level percent directly.
    pub fn apply_manager_value(&mut self, value: i32) {
        self.set_level(value.clamp(0, 100) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_dialect_clamps_and_flags_low_battery() {
        let mut b = Battery::default();
        b.apply_manager_value(120);
        assert_eq!(b.level_percent, 100);
        b.apply_manager_value(5);
        assert!(b.low_battery);
    }
}
