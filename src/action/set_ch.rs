use serde::{Deserialize, Serialize};

use crate::model::characteristic::Value;
use crate::model::{ServiceIndex, ServiceKind};

use super::{serv_manager, DispatchContext};

/// Set-ch action entry (spec.md §4.1 step 6): copy a numeric value from
/// one characteristic to another, coercing both ways at the boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SetChEntry {
    pub source_service: ServiceIndex,
    pub source_ch: usize,
    pub target_service: ServiceIndex,
    pub target_ch: usize,
}

/// Reverse coercion: the raw numeric value takes on the target
/// characteristic's existing wire type (spec.md §4.1 step 6 "using the
/// reverse coercion"). `Str`/`Bytes` targets have no numeric reverse
/// coercion defined, so they're left untouched.
fn coerce_like(template: &Value, raw: f64) -> Option<Value> {
    match template {
        Value::Bool(_) => Some(Value::Bool(raw != 0.0)),
        Value::Int(_) => Some(Value::Int(raw as i64)),
        Value::UInt(_) => Some(Value::UInt(raw.max(0.0) as u64)),
        Value::Float(_) => Some(Value::Float(raw)),
        Value::Str(_) | Value::Bytes(_) => None,
    }
}

/// Services whose downstream state machine is re-triggered on a set-ch
/// write (spec.md §4.1 step 6: "thermostat, humidifier, lightbulb,
/// battery"). Reuses the same per-kind dialect dispatch the
/// service-manager sub-table already runs, sourced from the coerced
/// characteristic value instead of a serv-manager entry.
fn has_downstream_processing(kind: &ServiceKind) -> bool {
    matches!(
        kind,
        ServiceKind::Thermostat(_)
            | ServiceKind::ThermostatWithHum(_)
            | ServiceKind::Humidifier(_)
            | ServiceKind::HumidifierWithTemp(_)
            | ServiceKind::Lightbulb(_)
            | ServiceKind::Battery(_)
    )
}

pub fn apply(ctx: &mut DispatchContext, entries: &[SetChEntry]) {
    for entry in entries {
        let Some(raw) = ctx
            .registry
            .try_service(entry.source_service)
            .and_then(|svc| svc.characteristics.get(entry.source_ch))
            .map(|ch| ch.value.as_f64())
        else {
            continue;
        };

        let Some(target) = ctx.registry.try_service_mut(entry.target_service) else { continue };
        let Some(template) = target.characteristics.get(entry.target_ch) else { continue };
        let Some(coerced) = coerce_like(&template.value, raw) else { continue };

        let changed = target.set_characteristic(entry.target_ch, coerced);
        if changed && has_downstream_processing(&target.kind) {
            serv_manager::apply_dialect(ctx, entry.target_service, raw as i32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::PendingEffects;
    use crate::gpio::MemoryGpio;
    use crate::model::service::Service;
    use crate::model::{Characteristic, Registry};
    use crate::scheduler::Scheduler;
    use crate::services::battery::Battery;
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
    fn copies_and_coerces_into_the_targets_existing_type() {
        let mut registry = Registry::new();
        let mut source = Service::new(0, "src", ServiceKind::Switch(Switch::default()));
        source.characteristics.push(Characteristic::new("level", Value::Float(42.0)));
        let src_idx = registry.push_service(source);

        let mut target = Service::new(1, "dst", ServiceKind::Battery(Battery::default()));
        target.characteristics.push(Characteristic::new("battery-level", Value::UInt(0)));
        let dst_idx = registry.push_service(target);

        let mut scheduler = Scheduler::new();
        let mut gpio = MemoryGpio::new();
        let mut ctx = ctx_fixture(&mut registry, &mut scheduler, &mut gpio);

        apply(
            &mut ctx,
            &[SetChEntry { source_service: src_idx, source_ch: 0, target_service: dst_idx, target_ch: 0 }],
        );

        assert_eq!(ctx.registry.service(dst_idx).characteristics[0].value, Value::UInt(42));
        let ServiceKind::Battery(battery) = &ctx.registry.service(dst_idx).kind else { unreachable!() };
        assert_eq!(battery.level_percent, 42);
    }

    #[test]
    fn unchanged_value_skips_downstream_retrigger() {
        let mut registry = Registry::new();
        let mut source = Service::new(0, "src", ServiceKind::Switch(Switch::default()));
        source.characteristics.push(Characteristic::new("level", Value::UInt(7)));
        let src_idx = registry.push_service(source);

        let mut target = Service::new(1, "dst", ServiceKind::Battery(Battery::default()));
        target.characteristics.push(Characteristic::new("battery-level", Value::UInt(7)));
        let dst_idx = registry.push_service(target);

        let mut scheduler = Scheduler::new();
        let mut gpio = MemoryGpio::new();
        let mut ctx = ctx_fixture(&mut registry, &mut scheduler, &mut gpio);

        apply(
            &mut ctx,
            &[SetChEntry { source_service: src_idx, source_ch: 0, target_service: dst_idx, target_ch: 0 }],
        );

        let ServiceKind::Battery(battery) = &ctx.registry.service(dst_idx).kind else { unreachable!() };
        assert_eq!(battery.level_percent, 0, "downstream apply_dialect must not have run");
    }
}
