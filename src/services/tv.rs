use serde::{Deserialize, Serialize};

/// Minimal TV accessory: active state plus current input source index.
/// Service-manager dialect: `v==0/1` set active; `v>=100` select input
/// `v-100`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Television {
    pub active: bool,
    pub active_input: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TvCommand {
    SetActive(bool),
    SelectInput(u8),
}

pub fn decode_manager_value(value: i32) -> TvCommand {
    if value >= 100 {
        TvCommand::SelectInput((value - 100) as u8)
    } else {
        TvCommand::SetActive(value != 0)
    }
}

impl Television {
    pub fn apply(&mut self, command: TvCommand) -> bool {
        let before = (self.active, self.active_input);
        match command {
            TvCommand::SetActive(v) => self.active = v,
            TvCommand::SelectInput(i) => self.active_input = i,
        }
        before != (self.active, self.active_input)
    }
}
