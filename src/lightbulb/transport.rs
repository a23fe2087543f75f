use std::time::Duration;

use super::{LightbulbGroup, LightbulbTransport};

/// Default transport ticker period (spec.md §4.2).
pub const RGBW_PERIOD: Duration = Duration::from_millis(10);

/// Bytes per LED in the addressable NRZ channel map (spec.md §6
/// "Addressable LED on-wire").
pub const LIGHTBULB_CHANNELS: usize = 5;

/// One tick of the transport: advance `current` towards `target` by
/// `step`, snapping once within `step` of the target (spec.md §4.2
/// "Transport ticker"). Returns `true` if any channel changed value,
/// which the caller uses to decide whether to re-apply the transport
/// (update PWM duty, or transmit an NRZ frame).
pub fn tick(group: &mut LightbulbGroup) -> bool {
    let mut changed = false;
    for i in 0..group.current.len() {
        let cur = group.current[i] as i32;
        let tgt = group.target[i] as i32;
        let diff = tgt - cur;
        if diff == 0 {
            continue;
        }
        let next = if diff.unsigned_abs() as u16 <= group.step {
            tgt
        } else if diff > 0 {
            cur + group.step as i32
        } else {
            cur - group.step as i32
        };
        group.current[i] = next.clamp(0, u16::MAX as i32) as u16;
        changed = true;
    }
    changed
}

/// Assembles the NRZ byte buffer for `[range_start, range_end)` LEDs in
/// channel-map order, one [LIGHTBULB_CHANNELS]-byte group per LED. Bytes
/// beyond 8 bits come from the high byte of the 16-bit duty, matching the
/// PWM transports' resolution loss on addressable strings.
pub fn assemble_nrz_buffer(group: &LightbulbGroup, range_start: usize, range_end: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity((range_end - range_start) * LIGHTBULB_CHANNELS);
    for _ in range_start..range_end {
        for channel in group.current.iter() {
            buf.push((*channel >> 8) as u8);
        }
    }
    buf
}

/// Runs the ticker until every channel is settled or `max_ticks` is
/// exceeded (test/simulation helper; the real runtime reschedules the
/// soft-timer itself instead of looping).
pub fn run_until_settled(group: &mut LightbulbGroup, max_ticks: u32) -> bool {
    for _ in 0..max_ticks {
        if group.settled() {
            return true;
        }
        tick(group);
        if matches!(group.transport, LightbulbTransport::HardwarePwm | LightbulbTransport::SoftwarePwm) {
            // PWM transports apply duty immediately; nothing else to do.
        }
    }
    group.settled()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lightbulb::color;

    #[test]
    fn ticker_settles_current_to_target() {
        let mut lb = LightbulbGroup::new(3, color::WHITE_POINT_D50);
        lb.step = 1000;
        lb.target = [5000, 2000, 0, 0, 0];
        assert!(run_until_settled(&mut lb, 100));
        assert_eq!(lb.current, lb.target);
    }

    #[test]
    fn small_remainder_snaps_instead_of_overshooting() {
        let mut lb = LightbulbGroup::new(3, color::WHITE_POINT_D50);
        lb.step = 100;
        lb.current = [950, 0, 0, 0, 0];
        lb.target = [1000, 0, 0, 0, 0];
        tick(&mut lb);
        assert_eq!(lb.current[0], 1000);
    }
}
