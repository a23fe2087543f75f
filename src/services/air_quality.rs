use serde::{Deserialize, Serialize};

/// Air quality sensor (density reading plus derived HomeKit-style quality
/// tier). Polled like a temp/hum sensor; no service-manager dialect of its
/// own beyond plain value propagation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AirQuality {
    pub density: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AirQualityTier {
    Unknown,
    Excellent,
    Good,
    Fair,
    Inferior,
    Poor,
}

impl AirQuality {
    /// Five-tier bucketing matching typical VOC/PM density thresholds.
    pub fn tier(&self) -> AirQualityTier {
        match self.density {
            d if d <= 0.0 => AirQualityTier::Unknown,
            d if d < 50.0 => AirQualityTier::Excellent,
            d if d < 100.0 => AirQualityTier::Good,
            d if d < 150.0 => AirQualityTier::Fair,
            d if d < 200.0 => AirQualityTier::Inferior,
            _ => AirQualityTier::Poor,
        }
    }
}
