use serde::{Deserialize, Serialize};

use crate::model::{Registry, ServiceIndex, ServiceKind};

use super::{dispatch, wildcard, DispatchContext};

/// One service-manager entry: an integer-encoded dialect value addressed
/// at another service by index (spec.md §4.1 step 3, §6 "serv-manager"
/// sub-arrays). `target_service` is already resolved from the config's
/// relative-index encoding by the time it reaches here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServManagerEntry {
    pub target_service: ServiceIndex,
    pub value: i32,
}

/// Killswitch toggle/assign triple values (spec.md §4.1 step 3): the
/// `-1000x` triple targets `main_enabled`, the `-2000x` triple targets
/// `child_enabled`. The spec names the triple but not which of the three
/// is toggle vs. assign-off vs. assign-on; this follows the same
/// toggle/off/on ordering already used by the switch and lock dialects
/// elsewhere in this table.
const MAIN_TOGGLE: i32 = -10000;
const MAIN_OFF: i32 = -10001;
const MAIN_ON: i32 = -10002;
const CHILD_TOGGLE: i32 = -20000;
const CHILD_OFF: i32 = -20001;
const CHILD_ON: i32 = -20002;

pub fn apply(ctx: &mut DispatchContext, _source: ServiceIndex, entries: &[ServManagerEntry]) {
    for entry in entries {
        match entry.value {
            MAIN_TOGGLE | MAIN_OFF | MAIN_ON | CHILD_TOGGLE | CHILD_OFF | CHILD_ON => {
                apply_killswitch(ctx.registry, entry.target_service, entry.value);
            }
            value => apply_dialect(ctx, entry.target_service, value),
        }
    }
}

fn apply_killswitch(registry: &mut Registry, target: ServiceIndex, value: i32) {
    let Some(svc) = registry.try_service_mut(target) else { return };
    match value {
        MAIN_TOGGLE => svc.main_enabled = !svc.main_enabled,
        MAIN_OFF => svc.main_enabled = false,
        MAIN_ON => svc.main_enabled = true,
        CHILD_TOGGLE => svc.child_enabled = !svc.child_enabled,
        CHILD_OFF => svc.child_enabled = false,
        CHILD_ON => svc.child_enabled = true,
        _ => unreachable!(),
    }
}

/// Dispatches a decoded dialect value to the target's own per-variant
/// manager sub-table (spec.md §4.1 "Service-manager sub-table"). For
/// thermostat/humidifier the resulting state transition is run through
/// immediately (computing a hysteresis transition is pure and
/// non-blocking) and its action id, plus the (temp, hum, target-heat,
/// target-cool) wildcard fires from spec.md §4.3, are dispatched
/// recursively.
pub(crate) fn apply_dialect(ctx: &mut DispatchContext, target: ServiceIndex, value: i32) {
    let mut followup: Option<i32> = None;
    let mut wildcard_fires: Vec<(usize, f64)> = Vec::new();

    {
        let Some(svc) = ctx.registry.try_service_mut(target) else { return };
        match &mut svc.kind {
            ServiceKind::Switch(sw) | ServiceKind::Outlet(sw) | ServiceKind::WaterValve(sw) => {
                sw.apply(crate::services::switch::decode_manager_value(value));
            }
            ServiceKind::Lock(lock) => {
                lock.apply(crate::services::lock::decode_manager_value(value));
            }
            ServiceKind::ContactSensor(s)
            | ServiceKind::OccupancySensor(s)
            | ServiceKind::LeakSensor(s)
            | ServiceKind::SmokeSensor(s)
            | ServiceKind::CarbonMonoxideSensor(s)
            | ServiceKind::CarbonDioxideSensor(s)
            | ServiceKind::FilterChangeSensor(s)
            | ServiceKind::MotionSensor(s) => {
                s.apply_manager_value(value);
            }
            ServiceKind::Button(_) | ServiceKind::Doorbell(_) => {}
            ServiceKind::Thermostat(t) | ServiceKind::ThermostatWithHum(t) => {
                t.apply_manager_value(value);
                if let Some(action) = t.process_tick() {
                    followup = Some(action.action_id());
                }
                wildcard_fires.push((0, t.current_temp as f64));
                wildcard_fires.push((1, t.current_hum as f64));
                wildcard_fires.push((2, t.heater_threshold as f64));
                wildcard_fires.push((3, t.cooler_threshold as f64));
            }
            ServiceKind::Humidifier(h) | ServiceKind::HumidifierWithTemp(h) => {
                h.apply_manager_value(value);
                if let Some(action) = h.process_tick() {
                    followup = Some(action.action_id());
                }
                wildcard_fires.push((0, h.current_hum as f64));
                wildcard_fires.push((1, h.current_temp as f64));
                wildcard_fires.push((2, h.humidify_threshold as f64));
                wildcard_fires.push((3, h.dehumidify_threshold as f64));
            }
            ServiceKind::IAirZoning(_) => {}
            ServiceKind::Lightbulb(lb) => lb.apply_manager_value(value),
            ServiceKind::GarageDoor(door) => door.apply_manager_value(value),
            ServiceKind::WindowCover(cover) => cover.apply_manager_value(value),
            ServiceKind::Fan(fan) => {
                fan.apply(crate::services::fan::decode_manager_value(value));
            }
            ServiceKind::SecuritySystem(sec) => {
                sec.set_target(crate::services::security::decode_manager_value(value));
            }
            ServiceKind::Tv(tv) => {
                tv.apply(crate::services::tv::decode_manager_value(value));
            }
            ServiceKind::Battery(battery) => battery.apply_manager_value(value),
            ServiceKind::PowerMonitor(power) => power.apply_manager_value(value),
            ServiceKind::FreeMonitor(fm) | ServiceKind::FreeMonitorAccumulative(fm) => {
                fm.post_process(value as f32 / 100.0);
            }
            ServiceKind::DataHistory(history) => {
                let epoch = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs() as u32)
                    .unwrap_or(0);
                history.push(epoch, value);
            }
            ServiceKind::AirQuality(aq) => aq.density = value as f32 / 100.0,
            ServiceKind::LightSensor(ls) => ls.lux = value as f32 / 100.0,
            ServiceKind::TempSensor(t) => t.temperature = Some(value as f32 / 100.0),
            ServiceKind::HumSensor(t) => t.humidity = Some(value as f32 / 100.0),
            ServiceKind::ThSensor(t) => {
                // single dialect value carries only one reading; the
                // original source multiplexes this over two action ids
                // instead, one per characteristic. Treat it as temperature,
                // matching the plain TempSensor row, and note in DESIGN.md
                // that ThSensor humidity updates arrive via set-ch instead.
                t.temperature = Some(value as f32 / 100.0);
            }
            ServiceKind::RootDevice => {}
        }
    }

    for (index, observed) in wildcard_fires {
        let svc = ctx.registry.service_mut(target);
        let action_id = wildcard::fire_wildcard(&svc.wildcard_actions, &mut svc.last_wildcard, index, observed);
        if let Some(action_id) = action_id {
            dispatch(ctx, target, action_id);
        }
    }
    if let Some(action_id) = followup {
        dispatch(ctx, target, action_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::PendingEffects;
    use crate::gpio::MemoryGpio;
    use crate::model::service::Service;
    use crate::scheduler::Scheduler;
    use crate::services::switch::Switch;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Instant;

    fn ctx_fixture<'a>(
        registry: &'a mut Registry,
        scheduler: &'a mut Scheduler,
        gpio: &'a mut MemoryGpio,
    ) -> DispatchContext<'a> {
        DispatchContext {
            registry,
            scheduler,
            gpio,
            pending: Rc::new(RefCell::new(PendingEffects::default())),
            now: Instant::now(),
        }
    }

    #[test]
    fn main_enabled_toggle_triple_flips_killswitch() {
        let mut registry = Registry::new();
        let idx = registry.push_service(Service::new(0, "sw", ServiceKind::Switch(Switch::default())));
        let mut scheduler = Scheduler::new();
        let mut gpio = MemoryGpio::new();
        let mut ctx = ctx_fixture(&mut registry, &mut scheduler, &mut gpio);

        apply(&mut ctx, idx, &[ServManagerEntry { target_service: idx, value: MAIN_TOGGLE }]);
        assert!(!ctx.registry.service(idx).main_enabled);
    }

    #[test]
    fn switch_dialect_toggles_active() {
        let mut registry = Registry::new();
        let idx = registry.push_service(Service::new(0, "sw", ServiceKind::Switch(Switch::default())));
        let mut scheduler = Scheduler::new();
        let mut gpio = MemoryGpio::new();
        let mut ctx = ctx_fixture(&mut registry, &mut scheduler, &mut gpio);

        apply(&mut ctx, idx, &[ServManagerEntry { target_service: idx, value: 4 }]);
        let ServiceKind::Switch(sw) = &ctx.registry.service(idx).kind else { unreachable!() };
        assert!(sw.active);
    }
}
