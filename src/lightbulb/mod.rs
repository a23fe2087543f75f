pub mod color;
pub mod transport;

use serde::{Deserialize, Serialize};

use color::{Chromaticity, Hsi, TransportParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightbulbTransport {
    Virtual,
    SoftwarePwm,
    HardwarePwm,
    AddressableNrz,
}

/// Autodimmer ramp phase (spec.md §3 "autodimmer task state").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutodimmerPhase {
    Idle,
    Up,
    Down,
}

/// Per-lightbulb colour engine state (spec.md §3 "Lightbulb group").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightbulbGroup {
    pub on: bool,
    pub brightness: f32,
    pub hue: f32,
    pub saturation: f32,
    pub color_temp: f32,

    pub transport: LightbulbTransport,
    pub channel_gpio: [Option<(u8, u8)>; 5],
    pub params: TransportParams,

    pub target: [u16; 5],
    pub current: [u16; 5],
    pub step: u16,

    pub autodimmer_phase: AutodimmerPhase,
    pub autodimmer_step: u16,
    pub autodimmer_delay_ms: u32,
    pub lightbulb_task_running: bool,

    pub last_on_command: bool,
}

impl LightbulbGroup {
    pub fn new(channel_count: u8, white_point: Chromaticity) -> Self {
        LightbulbGroup {
            on: false,
            brightness: 100.0,
            hue: 0.0,
            saturation: 0.0,
            color_temp: 0.0,
            transport: LightbulbTransport::Virtual,
            channel_gpio: [None; 5],
            params: TransportParams {
                channel_count,
                flux: [1.0; 5],
                white_point,
                led_primaries: color::REFERENCE_PRIMARIES,
                curve_factor: 0.0,
                max_power_cap: None,
            },
            target: [0; 5],
            current: [0; 5],
            step: 512,
            autodimmer_phase: AutodimmerPhase::Idle,
            autodimmer_step: 0,
            autodimmer_delay_ms: 0,
            lightbulb_task_running: false,
            last_on_command: false,
        }
    }

    /// Recomputes `target` from the current power/brightness/hue/
    /// saturation state (spec.md §4.2 contract: "on any write ... compute
    /// new per-channel 16-bit PWM targets").
    pub fn recompute_target(&mut self) {
        if !self.on {
            self.target = [0; 5];
            return;
        }
        let hsi = Hsi { hue: self.hue, saturation: self.saturation / 100.0, intensity: 1.0 };
        self.target = color::hsi_to_rgbww(hsi, self.brightness, &self.params);
    }

    /// Service-manager dialect decode (spec.md §4.1 lightbulb row):
    /// `2..102` sets brightness; a 1000-range sets hue; a 2000-range sets
    /// saturation; a 3000-range sets color temperature; a 300-range dims
    /// down by that much; a 600-range brightens up by that much; `200`
    /// toggles power; `<0` drives the autodimmer phase. Recomputes
    /// `target` afterwards, matching the downstream-recompute rule set-ch
    /// writes trigger for this service (spec.md §4.1 step 6).
    pub fn apply_manager_value(&mut self, value: i32) {
        if value < 0 {
            self.autodimmer_phase = match value {
                -1 => AutodimmerPhase::Up,
                -2 => AutodimmerPhase::Down,
                _ => AutodimmerPhase::Idle,
            };
        } else if value == 200 {
            self.on = !self.on;
        } else if (300..400).contains(&value) {
            self.brightness = (self.brightness - (value - 300) as f32).max(0.0);
        } else if (600..700).contains(&value) {
            self.brightness = (self.brightness + (value - 600) as f32).min(100.0);
        } else if (1000..2000).contains(&value) {
            self.hue = (value - 1000) as f32;
        } else if (2000..3000).contains(&value) {
            self.saturation = (value - 2000) as f32;
        } else if (3000..10000).contains(&value) {
            self.color_temp = (value - 3000) as f32;
        } else if (2..=102).contains(&value) {
            self.brightness = (value - 2) as f32;
            self.on = self.brightness > 0.0;
        }
        self.recompute_target();
    }

    pub fn settled(&self) -> bool {
        self.current == self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_dialect_brightness_and_toggle() {
        let mut lb = LightbulbGroup::new(3, color::WHITE_POINT_D50);
        lb.apply_manager_value(52); // brightness = 50
        assert_eq!(lb.brightness, 50.0);
        assert!(lb.on);
        lb.apply_manager_value(200); // toggle off
        assert!(!lb.on);
    }

    #[test]
    fn turning_off_zeroes_target() {
        let mut lb = LightbulbGroup::new(3, color::WHITE_POINT_D50);
        lb.on = true;
        lb.brightness = 100.0;
        lb.recompute_target();
        assert_ne!(lb.target, [0; 5]);

        lb.on = false;
        lb.recompute_target();
        assert_eq!(lb.target, [0; 5]);
    }
}
