use serde::{Deserialize, Serialize};

/// Temperature, humidity, or combined temp+hum sensor (DS18B20/DHT/SI7021
/// class driver; the wire protocol is out of scope, this struct holds the
/// decoded reading and the transient-error counter of spec.md §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempHumSensor {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub consecutive_errors: u32,
    pub when_error_value: f32,
}

impl Default for TempHumSensor {
    fn default() -> Self {
        TempHumSensor {
            temperature: None,
            humidity: None,
            consecutive_errors: 0,
            when_error_value: 0.0,
        }
    }
}

/// Exceeding this many consecutive read errors substitutes the configured
/// "when-error" value and dispatches a `SENSOR_ERROR` action (spec.md §7).
pub const TH_SENSOR_MAX_ALLOWED_ERRORS: u32 = 5;

pub enum ReadOutcome {
    Ok,
    /// Error budget exhausted; caller should dispatch `SENSOR_ERROR`.
    ErrorBudgetExhausted,
    /// Still within the error budget, no action required yet.
    Transient,
}

impl TempHumSensor {
    pub fn record_success(&mut self, temperature: Option<f32>, humidity: Option<f32>) -> ReadOutcome {
        self.consecutive_errors = 0;
        self.temperature = temperature;
        self.humidity = humidity;
        ReadOutcome::Ok
    }

    pub fn record_error(&mut self) -> ReadOutcome {
        self.consecutive_errors += 1;
        if self.consecutive_errors > TH_SENSOR_MAX_ALLOWED_ERRORS {
            self.temperature = Some(self.when_error_value);
            ReadOutcome::ErrorBudgetExhausted
        } else {
            ReadOutcome::Transient
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_budget_triggers_after_threshold() {
        let mut sensor = TempHumSensor { when_error_value: -99.0, ..Default::default() };
        for _ in 0..TH_SENSOR_MAX_ALLOWED_ERRORS {
            assert!(matches!(sensor.record_error(), ReadOutcome::Transient));
        }
        assert!(matches!(sensor.record_error(), ReadOutcome::ErrorBudgetExhausted));
        assert_eq!(sensor.temperature, Some(-99.0));
    }
}
