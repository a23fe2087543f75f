use serde::{Deserialize, Serialize};

/// Lock service state (spec.md §4.1 sub-table: `v==4` toggle; `v==5`
/// toggle-status; `v>1` set status to `v-2`; else set target).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lock {
    pub target_locked: bool,
    pub current_locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LockCommand {
    Toggle,
    ToggleStatus,
    SetStatus(bool),
    SetTarget(bool),
}

pub fn decode_manager_value(value: i32) -> LockCommand {
    if value == 4 {
        LockCommand::Toggle
    } else if value == 5 {
        LockCommand::ToggleStatus
    } else if value > 1 {
        LockCommand::SetStatus((value - 2) != 0)
    } else {
        LockCommand::SetTarget(value != 0)
    }
}

impl Lock {
    pub fn apply(&mut self, command: LockCommand) -> bool {
        let before = (self.target_locked, self.current_locked);
        match command {
            LockCommand::Toggle => {
                self.target_locked = !self.target_locked;
                self.current_locked = self.target_locked;
            }
            LockCommand::ToggleStatus => self.current_locked = !self.current_locked,
            LockCommand::SetStatus(v) => self.current_locked = v,
            LockCommand::SetTarget(v) => {
                self.target_locked = v;
                self.current_locked = v;
            }
        }
        before != (self.target_locked, self.current_locked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_dialect() {
        assert_eq!(decode_manager_value(4), LockCommand::Toggle);
        assert_eq!(decode_manager_value(5), LockCommand::ToggleStatus);
        assert_eq!(decode_manager_value(3), LockCommand::SetStatus(true));
        assert_eq!(decode_manager_value(0), LockCommand::SetTarget(false));
    }
}
