use serde::{Deserialize, Serialize};

/// Power meter service backed by an HLW8012/ADE7953-class driver (register
/// access is an out-of-scope low-level driver; this struct holds the
/// already-decoded readings). Sampling period has a 30 ms floor
/// (spec.md §4.8 "Periodic sensor timers").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PowerMonitor {
    pub watts: f32,
    pub volt_amps: f32,
    pub voltage: f32,
    pub current_amps: f32,
    pub total_kwh: f64,
}

/// Minimum sampling period for power meters (spec.md §4.8).
pub const MIN_SAMPLE_PERIOD_MS: u32 = 30;

impl PowerMonitor {
    pub fn accumulate(&mut self, sample_period_ms: u32) {
        self.total_kwh += (self.watts as f64) * (sample_period_ms as f64) / 3_600_000_000.0;
    }

    /// Service-manager dialect decode (spec.md §4.1: "each has its
    /// analogous encoding"): the value is watts encoded as `watts*100`.
    pub fn apply_manager_value(&mut self, value: i32) {
        self.watts = value as f32 / 100.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_dialect_decodes_scaled_watts() {
        let mut p = PowerMonitor::default();
        p.apply_manager_value(1500);
        assert_eq!(p.watts, 15.0);
    }
}
