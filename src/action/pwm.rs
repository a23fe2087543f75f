use serde::{Deserialize, Serialize};

use crate::gpio::ExtendedPin;

use super::DispatchContext;

/// PWM action entry (spec.md §4.1 step 5): update `pin`'s duty and,
/// when `freq_hz` is set, its frequency too.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PwmEntry {
    pub pin: i32,
    pub duty: u16,
    pub freq_hz: Option<u32>,
}

pub fn apply(ctx: &mut DispatchContext, entries: &[PwmEntry]) {
    for entry in entries {
        let pin = ExtendedPin::decode(entry.pin);
        let freq = entry.freq_hz.filter(|hz| *hz > 0);
        ctx.gpio.set_pwm_duty(pin, entry.duty, freq);
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
    fn writes_duty_and_frequency_through_the_gpio_driver() {
        let mut registry = Registry::new();
        let mut scheduler = Scheduler::new();
        let mut gpio = MemoryGpio::new();
        let mut ctx = DispatchContext {
            registry: &mut registry,
            scheduler: &mut scheduler,
            gpio: &mut gpio,
            pending: Rc::new(RefCell::new(PendingEffects::default())),
            now: Instant::now(),
        };

        apply(&mut ctx, &[PwmEntry { pin: 12, duty: 2048, freq_hz: Some(500) }]);
        assert_eq!(gpio.duty_of(ExtendedPin::decode(12)), Some((2048, Some(500))));
    }

    #[test]
    fn zero_frequency_leaves_frequency_unchanged() {
        let mut registry = Registry::new();
        let mut scheduler = Scheduler::new();
        let mut gpio = MemoryGpio::new();
        let mut ctx = DispatchContext {
            registry: &mut registry,
            scheduler: &mut scheduler,
            gpio: &mut gpio,
            pending: Rc::new(RefCell::new(PendingEffects::default())),
            now: Instant::now(),
        };

        apply(&mut ctx, &[PwmEntry { pin: 12, duty: 100, freq_hz: Some(0) }]);
        assert_eq!(gpio.duty_of(ExtendedPin::decode(12)), Some((100, None)));
    }
}
