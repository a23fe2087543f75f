pub mod timetable;

use std::time::{Duration, Instant};

/// Minimum periodic sensor timer periods (spec.md §4.8).
pub const MIN_PERIOD_POWER_METER_MS: u64 = 30;
pub const MIN_PERIOD_ANALOG_MS: u64 = 250;

pub type TimerId = usize;

struct SoftTimer {
    period: Duration,
    recurrent: bool,
    due_at: Instant,
    callback: Box<dyn FnMut(&mut Scheduler)>,
}

/// Generic soft-timer registry, generalized from the teacher's own
/// timer-service task and `do_time_keeping` 1 Hz-tick structure
/// (spec.md §4.8) to "one-shot/periodic timer, indexed by `TimerId`".
///
/// Timers are stored as `Option<SoftTimer>` slots so that `stop` is a
/// trivial `None` write, safe to call from inside a running callback:
/// the slot is already empty for the duration of its own invocation.
#[derive(Default)]
pub struct Scheduler {
    timers: Vec<Option<SoftTimer>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler { timers: Vec::new() }
    }

    /// Registers a one-shot or recurring timer due `period` from `now`.
    pub fn create(
        &mut self,
        now: Instant,
        period: Duration,
        recurrent: bool,
        callback: impl FnMut(&mut Scheduler) + 'static,
    ) -> TimerId {
        let timer = SoftTimer {
            period,
            recurrent,
            due_at: now + period,
            callback: Box::new(callback),
        };
        if let Some(id) = self.timers.iter().position(|t| t.is_none()) {
            self.timers[id] = Some(timer);
            id
        } else {
            self.timers.push(Some(timer));
            self.timers.len() - 1
        }
    }

    /// Stops a timer from outside its own callback. Always prevents any
    /// further invocation, including one already due this tick but not
    /// yet processed.
    pub fn stop(&mut self, id: TimerId) {
        if let Some(slot) = self.timers.get_mut(id) {
            *slot = None;
        }
    }

    /// Restarts a timer's countdown from `now`, without changing its
    /// callback or recurrence. Matches spec.md §5's "restart cancels the
    /// pending transition" rule for state-machine debounce timers.
    pub fn restart(&mut self, id: TimerId, now: Instant) {
        if let Some(Some(timer)) = self.timers.get_mut(id) {
            timer.due_at = now + timer.period;
        }
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        matches!(self.timers.get(id), Some(Some(_)))
    }

    /// Invokes every timer due at or before `now`. Non-recurrent timers
    /// are not reinserted after firing, matching "auto-deleted on expiry".
    pub fn tick(&mut self, now: Instant) {
        for i in 0..self.timers.len() {
            let due = matches!(&self.timers[i], Some(t) if t.due_at <= now);
            if !due {
                continue;
            }
            let mut timer = self.timers[i].take().unwrap();
            (timer.callback)(self);
            if timer.recurrent && self.timers[i].is_none() {
                timer.due_at = now + timer.period;
                self.timers[i] = Some(timer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn one_shot_fires_once_then_is_gone() {
        let mut s = Scheduler::new();
        let fired = Rc::new(RefCell::new(0));
        let f = fired.clone();
        let start = Instant::now();
        let id = s.create(start, Duration::from_millis(10), false, move |_| {
            *f.borrow_mut() += 1;
        });
        s.tick(start + Duration::from_millis(20));
        s.tick(start + Duration::from_millis(40));
        assert_eq!(*fired.borrow(), 1);
        assert!(!s.is_active(id));
    }

    #[test]
    fn recurrent_timer_keeps_firing() {
        let mut s = Scheduler::new();
        let fired = Rc::new(RefCell::new(0));
        let f = fired.clone();
        let start = Instant::now();
        s.create(start, Duration::from_millis(10), true, move |_| {
            *f.borrow_mut() += 1;
        });
        s.tick(start + Duration::from_millis(10));
        s.tick(start + Duration::from_millis(20));
        s.tick(start + Duration::from_millis(30));
        assert_eq!(*fired.borrow(), 3);
    }

    #[test]
    fn stop_from_outside_prevents_further_firing() {
        let mut s = Scheduler::new();
        let fired = Rc::new(RefCell::new(0));
        let f = fired.clone();
        let start = Instant::now();
        let id = s.create(start, Duration::from_millis(10), true, move |_| {
            *f.borrow_mut() += 1;
        });
        s.tick(start + Duration::from_millis(10));
        s.stop(id);
        s.tick(start + Duration::from_millis(20));
        assert_eq!(*fired.borrow(), 1);
    }
}
