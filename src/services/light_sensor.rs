use serde::{Deserialize, Serialize};

/// Ambient light sensor, sourced from an ADC or I2C light-to-digital driver
/// (out of scope; this struct holds the decoded lux reading).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LightSensor {
    pub lux: f32,
}
