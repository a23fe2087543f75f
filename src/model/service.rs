use serde::{Deserialize, Serialize};

use crate::action::{ActionList, WildcardAction};
use crate::lightbulb::LightbulbGroup;
use crate::services::{
    air_zoning::IAirZoning, cover::WindowCover, door::GarageDoor, fan::Fan, free_monitor::FreeMonitor,
    humidifier::Humidifier, security::SecuritySystem, sensor_binary::BinarySensor, switch::Switch,
    thermostat::Thermostat, tv::Television,
};
use crate::services::battery::Battery;
use crate::services::data_history::DataHistory;
use crate::services::light_sensor::LightSensor;
use crate::services::power_monitor::PowerMonitor;
use crate::services::temp_hum::TempHumSensor;

use super::characteristic::Characteristic;

/// Stable integer service index, 1-based at the config/RPC boundary,
/// 0-based internally as a `Vec<Service>` index (spec.md §3 invariants).
pub type ServiceIndex = usize;

/// Closed service-type tag set (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    Switch,
    Outlet,
    Button,
    Doorbell,
    Lock,
    ContactSensor,
    OccupancySensor,
    LeakSensor,
    SmokeSensor,
    CarbonMonoxideSensor,
    CarbonDioxideSensor,
    FilterChangeSensor,
    MotionSensor,
    AirQuality,
    WaterValve,
    Thermostat,
    ThermostatWithHum,
    IAirZoning,
    TempSensor,
    HumSensor,
    ThSensor,
    Humidifier,
    HumidifierWithTemp,
    Lightbulb,
    GarageDoor,
    WindowCover,
    LightSensor,
    SecuritySystem,
    Tv,
    Fan,
    Battery,
    PowerMonitor,
    FreeMonitor,
    FreeMonitorAccumulative,
    DataHistory,
    RootDevice,
}

/// Tagged service variants, each owning its own fields (spec.md §9
/// "Tagged service variants" re-architecture, replacing the dynamically
/// indexed `ch[]`/`num_i[]`/`num_f[]` arrays of the original model).
#[derive(Serialize, Deserialize)]
pub enum ServiceKind {
    Switch(Switch),
    Outlet(Switch),
    WaterValve(Switch),
    Lock(crate::services::lock::Lock),
    ContactSensor(BinarySensor),
    OccupancySensor(BinarySensor),
    LeakSensor(BinarySensor),
    SmokeSensor(BinarySensor),
    CarbonMonoxideSensor(BinarySensor),
    CarbonDioxideSensor(BinarySensor),
    FilterChangeSensor(BinarySensor),
    MotionSensor(BinarySensor),
    Button(BinarySensor),
    Doorbell(BinarySensor),
    AirQuality(crate::services::air_quality::AirQuality),
    Thermostat(Thermostat),
    ThermostatWithHum(Thermostat),
    IAirZoning(IAirZoning),
    TempSensor(TempHumSensor),
    HumSensor(TempHumSensor),
    ThSensor(TempHumSensor),
    Humidifier(Humidifier),
    HumidifierWithTemp(Humidifier),
    Lightbulb(LightbulbGroup),
    GarageDoor(GarageDoor),
    WindowCover(WindowCover),
    LightSensor(LightSensor),
    SecuritySystem(SecuritySystem),
    Tv(Television),
    Fan(Fan),
    Battery(Battery),
    PowerMonitor(PowerMonitor),
    FreeMonitor(FreeMonitor),
    FreeMonitorAccumulative(FreeMonitor),
    DataHistory(DataHistory),
    RootDevice,
}

impl ServiceKind {
    pub fn service_type(&self) -> ServiceType {
        match self {
            ServiceKind::Switch(_) => ServiceType::Switch,
            ServiceKind::Outlet(_) => ServiceType::Outlet,
            ServiceKind::WaterValve(_) => ServiceType::WaterValve,
            ServiceKind::Lock(_) => ServiceType::Lock,
            ServiceKind::ContactSensor(_) => ServiceType::ContactSensor,
            ServiceKind::OccupancySensor(_) => ServiceType::OccupancySensor,
            ServiceKind::LeakSensor(_) => ServiceType::LeakSensor,
            ServiceKind::SmokeSensor(_) => ServiceType::SmokeSensor,
            ServiceKind::CarbonMonoxideSensor(_) => ServiceType::CarbonMonoxideSensor,
            ServiceKind::CarbonDioxideSensor(_) => ServiceType::CarbonDioxideSensor,
            ServiceKind::FilterChangeSensor(_) => ServiceType::FilterChangeSensor,
            ServiceKind::MotionSensor(_) => ServiceType::MotionSensor,
            ServiceKind::Button(_) => ServiceType::Button,
            ServiceKind::Doorbell(_) => ServiceType::Doorbell,
            ServiceKind::AirQuality(_) => ServiceType::AirQuality,
            ServiceKind::Thermostat(_) => ServiceType::Thermostat,
            ServiceKind::ThermostatWithHum(_) => ServiceType::ThermostatWithHum,
            ServiceKind::IAirZoning(_) => ServiceType::IAirZoning,
            ServiceKind::TempSensor(_) => ServiceType::TempSensor,
            ServiceKind::HumSensor(_) => ServiceType::HumSensor,
            ServiceKind::ThSensor(_) => ServiceType::ThSensor,
            ServiceKind::Humidifier(_) => ServiceType::Humidifier,
            ServiceKind::HumidifierWithTemp(_) => ServiceType::HumidifierWithTemp,
            ServiceKind::Lightbulb(_) => ServiceType::Lightbulb,
            ServiceKind::GarageDoor(_) => ServiceType::GarageDoor,
            ServiceKind::WindowCover(_) => ServiceType::WindowCover,
            ServiceKind::LightSensor(_) => ServiceType::LightSensor,
            ServiceKind::SecuritySystem(_) => ServiceType::SecuritySystem,
            ServiceKind::Tv(_) => ServiceType::Tv,
            ServiceKind::Fan(_) => ServiceType::Fan,
            ServiceKind::Battery(_) => ServiceType::Battery,
            ServiceKind::PowerMonitor(_) => ServiceType::PowerMonitor,
            ServiceKind::FreeMonitor(_) => ServiceType::FreeMonitor,
            ServiceKind::FreeMonitorAccumulative(_) => ServiceType::FreeMonitorAccumulative,
            ServiceKind::DataHistory(_) => ServiceType::DataHistory,
            ServiceKind::RootDevice => ServiceType::RootDevice,
        }
    }
}

/// Tri-state visibility for a HomeKit-style characteristic grouping
/// (spec.md §3 `homekit_enabled`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomekitVisibility {
    Off,
    Visible,
    Hidden,
}

/// Dedicated timer handle slots a service owns (spec.md §3: "two dedicated
/// timer handles"), indexed by this small enum instead of a raw 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceTimerSlot {
    Primary,
    Secondary,
}

/// The smallest addressable accessory behavior (spec.md §3 "Service (Channel
/// Group)"). Owns its characteristics, action lists, and killswitch state;
/// cross-service references go through [`ServiceIndex`] and the owning
/// [`super::accessory::Registry`], never raw pointers (spec.md §9).
#[derive(Serialize, Deserialize)]
pub struct Service {
    pub index: ServiceIndex,
    pub name: String,
    pub kind: ServiceKind,
    pub characteristics: Vec<Characteristic>,

    pub actions: ActionList,
    pub wildcard_actions: Vec<WildcardAction>,
    /// Last value observed per wildcard index, used by `fire_wildcard`'s
    /// change-detection rule (spec.md §4.1).
    pub last_wildcard: Vec<Option<f64>>,

    /// Gates external setters (RPC writes).
    pub main_enabled: bool,
    /// Gates sensor/button-originated transitions.
    pub child_enabled: bool,
    pub homekit_enabled: HomekitVisibility,

    /// Strict reentrancy bit: re-entry through this service's own worker
    /// task is silently dropped (spec.md §3 invariants).
    #[serde(skip)]
    pub is_working: bool,

    pub ir_protocol: Option<String>,

    #[serde(skip)]
    pub timers: [Option<crate::scheduler::TimerId>; 2],
}

impl Service {
    pub fn new(index: ServiceIndex, name: impl Into<String>, kind: ServiceKind) -> Self {
        Service {
            index,
            name: name.into(),
            kind,
            characteristics: Vec::new(),
            actions: ActionList::default(),
            wildcard_actions: Vec::new(),
            last_wildcard: Vec::new(),
            main_enabled: true,
            child_enabled: true,
            homekit_enabled: HomekitVisibility::Visible,
            is_working: false,
            ir_protocol: None,
            timers: [None, None],
        }
    }

    pub fn timer_slot(&self, slot: ServiceTimerSlot) -> Option<crate::scheduler::TimerId> {
        match slot {
            ServiceTimerSlot::Primary => self.timers[0],
            ServiceTimerSlot::Secondary => self.timers[1],
        }
    }

    pub fn set_timer_slot(&mut self, slot: ServiceTimerSlot, id: Option<crate::scheduler::TimerId>) {
        match slot {
            ServiceTimerSlot::Primary => self.timers[0] = id,
            ServiceTimerSlot::Secondary => self.timers[1] = id,
        }
    }

    /// Enter the worker-task reentrancy guard. Returns `false` (and does
    /// nothing) if already working, matching the "silently dropped" rule.
    pub fn try_enter_working(&mut self) -> bool {
        if self.is_working {
            return false;
        }
        self.is_working = true;
        true
    }

    pub fn leave_working(&mut self) {
        self.is_working = false;
    }

    /// Set a characteristic's value by index, coalescing repeat notifications
    /// within the same tick.
    pub fn set_characteristic(&mut self, ch_index: usize, value: super::characteristic::Value) -> bool {
        self.characteristics[ch_index].set(value)
    }

    /// Drain characteristics with a pending notification, returning their
    /// indices. Called once per tick by the RPC transport boundary.
    pub fn drain_pending_notifications(&mut self) -> Vec<usize> {
        let mut out = Vec::new();
        for (i, ch) in self.characteristics.iter_mut().enumerate() {
            if ch.take_notify_pending() {
                out.push(i);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::characteristic::Value;
    use crate::services::switch::Switch;

    fn make_switch_service() -> Service {
        let mut svc = Service::new(0, "Switch", ServiceKind::Switch(Switch::default()));
        svc.characteristics.push(Characteristic::new("on", Value::Bool(false)));
        svc
    }

    #[test]
    fn reentrancy_guard_drops_nested_entry() {
        let mut svc = make_switch_service();
        assert!(svc.try_enter_working());
        assert!(!svc.try_enter_working());
        svc.leave_working();
        assert!(svc.try_enter_working());
    }

    #[test]
    fn notification_draining_collects_only_changed_indices() {
        let mut svc = make_switch_service();
        svc.characteristics.push(Characteristic::new("fault", Value::Bool(false)));
        svc.set_characteristic(0, Value::Bool(true));
        let pending = svc.drain_pending_notifications();
        assert_eq!(pending, vec![0]);
        assert!(svc.drain_pending_notifications().is_empty());
    }
}
