use serde::{Deserialize, Serialize};

use super::DispatchContext;

/// System action dialect (spec.md §4.1 step 4: "setup/OTA/reboot/wifi-
/// reconnect"). These are process-lifecycle requests rather than
/// model mutations, so `apply` only records them; the runtime's main loop
/// drains [`super::PendingEffects::system`] once per tick and is the only
/// place that actually tears down the process or restarts the Wi-Fi
/// stack, mirroring how the teacher keeps `ESP.restart()`-class calls out
/// of request handlers and off the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemEntry {
    EnterSetupMode,
    StartOtaUpdate,
    Reboot,
    WifiReconnect,
}

pub fn apply(ctx: &mut DispatchContext, entries: &[SystemEntry]) {
    if entries.is_empty() {
        return;
    }
    ctx.pending.borrow_mut().system.extend_from_slice(entries);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::PendingEffects;
    use crate::gpio::MemoryGpio;
    use crate::model::Registry;
    use crate::scheduler::Scheduler;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Instant;

    #[test]
    fn queues_requested_system_actions_for_the_runtime_to_drain() {
        let mut registry = Registry::new();
        let mut scheduler = Scheduler::new();
        let mut gpio = MemoryGpio::new();
        let pending = Rc::new(RefCell::new(PendingEffects::default()));
        let mut ctx = DispatchContext {
            registry: &mut registry,
            scheduler: &mut scheduler,
            gpio: &mut gpio,
            pending: pending.clone(),
            now: Instant::now(),
        };

        apply(&mut ctx, &[SystemEntry::Reboot, SystemEntry::WifiReconnect]);
        assert_eq!(pending.borrow().system, vec![SystemEntry::Reboot, SystemEntry::WifiReconnect]);
    }
}
