use serde::{Deserialize, Serialize};

/// Fan service: on/off plus rotation speed percent. Service-manager
/// dialect: `v==0/1` set active; `2..=101` set speed percent (`v-2`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fan {
    pub active: bool,
    pub rotation_speed: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FanCommand {
    SetActive(bool),
    SetSpeed(u8),
}

pub fn decode_manager_value(value: i32) -> FanCommand {
    if (2..=101).contains(&value) {
        FanCommand::SetSpeed((value - 2) as u8)
    } else {
        FanCommand::SetActive(value != 0)
    }
}

impl Fan {
    pub fn apply(&mut self, command: FanCommand) -> bool {
        let before = (self.active, self.rotation_speed);
        match command {
            FanCommand::SetActive(v) => self.active = v,
            FanCommand::SetSpeed(s) => {
                self.rotation_speed = s;
                self.active = s > 0;
            }
        }
        before != (self.active, self.rotation_speed)
    }
}
