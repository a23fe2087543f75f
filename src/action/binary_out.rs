use serde::{Deserialize, Serialize};

use crate::gpio::ExtendedPin;

use super::DispatchContext;

/// One binary-output write (spec.md §4.1 step 2). `inching_secs > 0.0` arms
/// a one-shot timer that writes the complement after that many seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BinaryOutEntry {
    pub pin: i32,
    pub value: bool,
    pub inching_secs: f32,
}

pub fn apply(ctx: &mut DispatchContext, entries: &[BinaryOutEntry]) {
    for entry in entries {
        let pin = ExtendedPin::decode(entry.pin);
        ctx.gpio.write(pin, entry.value);
        if entry.inching_secs > 0.0 {
            let complement = !entry.value;
            let effects = ctx.pending.clone();
            ctx.scheduler.create(
                ctx.now,
                std::time::Duration::from_secs_f32(entry.inching_secs),
                false,
                move |_scheduler| {
                    effects.borrow_mut().gpio_writes.push((pin, complement));
                },
            );
        }
    }
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
    fn inching_arms_complement_timer() {
        let mut registry = Registry::new();
        let mut scheduler = Scheduler::new();
        let mut gpio = MemoryGpio::new();
        let pending = Rc::new(RefCell::new(PendingEffects::default()));
        let now = Instant::now();
        let mut ctx = DispatchContext { registry: &mut registry, scheduler: &mut scheduler, gpio: &mut gpio, pending: pending.clone(), now };

        apply(&mut ctx, &[BinaryOutEntry { pin: 5, value: true, inching_secs: 3.0 }]);
        assert!(gpio.read(ExtendedPin::decode(5)));
        assert!(pending.borrow().gpio_writes.is_empty());

        scheduler.tick(now + std::time::Duration::from_secs(3));
        assert_eq!(pending.borrow().gpio_writes, vec![(ExtendedPin::decode(5), false)]);
    }
}
