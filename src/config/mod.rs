pub mod cli;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::action::{ActionEntries, WildcardAction};
use crate::errors::ConfigError;
use crate::lightbulb::color::{Chromaticity, WHITE_POINT_D65};
use crate::lightbulb::LightbulbGroup;
use crate::model::accessory::Accessory;
use crate::model::{Characteristic, HomekitVisibility, Registry, Service, ServiceIndex, ServiceKind, Value};
use crate::services::air_zoning::IAirZoning;
use crate::services::cover::WindowCover;
use crate::services::data_history::DataHistory;
use crate::services::door::GarageDoor;
use crate::services::free_monitor::{FreeMonitor, Source as FreeMonitorSource};

/// Resolves a cross-service reference per spec.md §6 "Relative-index
/// encoding": `n > 7000` is `(current - 7000 + n)`, `n <= 0` is
/// `(current + n)`, anything else is already absolute.
pub fn resolve_relative_index(current: ServiceIndex, n: i32) -> ServiceIndex {
    let current = current as i64;
    let n = n as i64;
    let resolved = if n > 7000 {
        current - 7000 + n
    } else if n <= 0 {
        current + n
    } else {
        n
    };
    resolved.max(0) as ServiceIndex
}

/// `c`: general, accessory-independent configuration (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub wifi_ssid_hint: String,
    pub uarts: Vec<UartConfig>,
    pub i2c_buses: Vec<I2cBusConfig>,
    pub mcp23017_banks: u8,
    pub gpio_initial_modes: HashMap<i32, bool>,
    pub status_led_pin: i32,
    pub status_led_inverted: bool,
    pub ir_tx_pin: Option<i32>,
    pub ir_tx_freq_hz: u32,
    pub ir_tx_inverted: bool,
    pub rf_tx_pin: Option<i32>,
    pub rf_tx_inverted: bool,
    pub ping_poll_period_secs: u32,
    pub allowed_setup_seconds: u32,
    pub setup_toggle_count: u8,
    pub bridge_hostname: String,
    pub ntp_host: String,
    pub timezone: String,
    pub timetable: Vec<crate::scheduler::timetable::TimetableEntry>,
    pub homekit_max_clients: u8,
    pub homekit_category: String,
    pub homekit_mdns_ttl_secs: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            wifi_ssid_hint: String::new(),
            uarts: Vec::new(),
            i2c_buses: Vec::new(),
            mcp23017_banks: 0,
            gpio_initial_modes: HashMap::new(),
            status_led_pin: 2,
            status_led_inverted: false,
            ir_tx_pin: None,
            ir_tx_freq_hz: 38_000,
            ir_tx_inverted: false,
            rf_tx_pin: None,
            rf_tx_inverted: false,
            ping_poll_period_secs: 5,
            allowed_setup_seconds: 15,
            setup_toggle_count: 8,
            bridge_hostname: "haa-bridge".to_string(),
            ntp_host: "pool.ntp.org".to_string(),
            timezone: "UTC".to_string(),
            timetable: Vec::new(),
            homekit_max_clients: 8,
            homekit_category: "bridge".to_string(),
            homekit_mdns_ttl_secs: 4500,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UartConfig {
    pub port: u8,
    pub baud_rate: u32,
    pub tx_pin: i32,
    pub rx_pin: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct I2cBusConfig {
    pub bus: u8,
    pub sda_pin: i32,
    pub scl_pin: i32,
}

/// One of the handful of service kinds whose runtime constructor takes
/// required, non-`Default` parameters; everything else reuses the
/// runtime struct's own `Deserialize` impl directly as its config
/// schema (spec.md §9 Design Notes: config and domain types coincide
/// wherever the domain type is already a flat, serializable record).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightbulbConfig {
    pub channel_count: u8,
    pub white_point_x: f32,
    pub white_point_y: f32,
}

impl Default for LightbulbConfig {
    fn default() -> Self {
        LightbulbConfig { channel_count: 1, white_point_x: WHITE_POINT_D65.x, white_point_y: WHITE_POINT_D65.y }
    }
}

impl LightbulbConfig {
    fn build(self) -> LightbulbGroup {
        LightbulbGroup::new(self.channel_count, Chromaticity { x: self.white_point_x, y: self.white_point_y })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IAirZoningConfig {
    /// Relative-index references to the member thermostats, resolved
    /// against this service's own absolute index once it's known.
    pub zones: Vec<i32>,
    pub close_before_open_delay_ms: u32,
}

impl Default for IAirZoningConfig {
    fn default() -> Self {
        IAirZoningConfig { zones: Vec::new(), close_before_open_delay_ms: 500 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowCoverConfig {
    pub time_open_secs: f32,
    pub time_close_secs: f32,
    pub margin_sync_secs: f32,
    pub correction: f32,
}

impl Default for WindowCoverConfig {
    fn default() -> Self {
        WindowCoverConfig { time_open_secs: 10.0, time_close_secs: 10.0, margin_sync_secs: 1.5, correction: 0.0 }
    }
}

impl WindowCoverConfig {
    fn build(self) -> WindowCover {
        WindowCover::new(self.time_open_secs, self.time_close_secs, self.margin_sync_secs, self.correction)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GarageDoorConfig {
    pub working_time_secs: f32,
}

impl Default for GarageDoorConfig {
    fn default() -> Self {
        GarageDoorConfig { working_time_secs: 20.0 }
    }
}

impl GarageDoorConfig {
    fn build(self) -> GarageDoor {
        GarageDoor::new(self.working_time_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataHistoryConfig {
    pub block_count: usize,
}

impl Default for DataHistoryConfig {
    fn default() -> Self {
        DataHistoryConfig { block_count: 4 }
    }
}

impl DataHistoryConfig {
    fn build(self) -> DataHistory {
        DataHistory::new(self.block_count)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeMonitorConfig {
    pub source: FreeMonitorSource,
    #[serde(default = "default_one")]
    pub factor: f32,
    #[serde(default)]
    pub offset: f32,
}

fn default_one() -> f32 {
    1.0
}

impl FreeMonitorConfig {
    fn build(self) -> FreeMonitor {
        let mut fm = FreeMonitor::new(self.source);
        fm.factor = self.factor;
        fm.offset = self.offset;
        fm
    }
}

/// Internally-tagged per-kind config (spec.md §6 "closed tag set"); `t`
/// is the discriminant and the rest of the object deserializes straight
/// into each kind's own runtime struct, or a small `*Config` shim for
/// the kinds above.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "kebab-case")]
pub enum AccessoryKindConfig {
    Switch(crate::services::switch::Switch),
    Outlet(crate::services::switch::Switch),
    WaterValve(crate::services::switch::Switch),
    Button(crate::services::sensor_binary::BinarySensor),
    Doorbell(crate::services::sensor_binary::BinarySensor),
    Lock(crate::services::lock::Lock),
    ContactSensor(crate::services::sensor_binary::BinarySensor),
    OccupancySensor(crate::services::sensor_binary::BinarySensor),
    LeakSensor(crate::services::sensor_binary::BinarySensor),
    SmokeSensor(crate::services::sensor_binary::BinarySensor),
    CarbonMonoxideSensor(crate::services::sensor_binary::BinarySensor),
    CarbonDioxideSensor(crate::services::sensor_binary::BinarySensor),
    FilterChangeSensor(crate::services::sensor_binary::BinarySensor),
    MotionSensor(crate::services::sensor_binary::BinarySensor),
    AirQuality(crate::services::air_quality::AirQuality),
    Thermostat(crate::services::thermostat::Thermostat),
    ThermostatWithHum(crate::services::thermostat::Thermostat),
    IAirZoning(IAirZoningConfig),
    TempSensor(crate::services::temp_hum::TempHumSensor),
    HumSensor(crate::services::temp_hum::TempHumSensor),
    ThSensor(crate::services::temp_hum::TempHumSensor),
    Humidifier(crate::services::humidifier::Humidifier),
    HumidifierWithTemp(crate::services::humidifier::Humidifier),
    Lightbulb(LightbulbConfig),
    GarageDoor(GarageDoorConfig),
    WindowCover(WindowCoverConfig),
    LightSensor(crate::services::light_sensor::LightSensor),
    SecuritySystem(crate::services::security::SecuritySystem),
    Tv(crate::services::tv::Television),
    Fan(crate::services::fan::Fan),
    Battery(crate::services::battery::Battery),
    PowerMonitor(crate::services::power_monitor::PowerMonitor),
    FreeMonitor(FreeMonitorConfig),
    FreeMonitorAccumulative(FreeMonitorConfig),
    DataHistory(DataHistoryConfig),
    RootDevice,
}

/// One entry of `a` (spec.md §6): a service-type tag plus its fields,
/// its numeric action-id table, and up to 8 wildcard rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessoryServiceConfig {
    pub name: String,
    #[serde(flatten)]
    pub kind: AccessoryKindConfig,
    #[serde(default)]
    pub actions: HashMap<String, ActionEntries>,
    #[serde(default)]
    pub copy: Vec<crate::action::CopyEntry>,
    /// Keyed `"w0"`..`"w7"` (spec.md §6); flattened into one
    /// [`Service::wildcard_actions`] list at build time, since each
    /// entry already carries its own observation-channel `index`.
    #[serde(default)]
    pub wildcards: HashMap<String, Vec<WildcardAction>>,
    #[serde(default = "homekit_visible")]
    pub homekit_enabled: HomekitVisibility,
    #[serde(default)]
    pub ir_protocol: Option<String>,
}

fn homekit_visible() -> HomekitVisibility {
    HomekitVisibility::Visible
}

/// One entry of the top-level accessory array: a name plus its member
/// services, grouped the way the original groups an accessory's
/// "channel group" under one RPC identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessoryGroupConfig {
    pub name: String,
    pub services: Vec<AccessoryServiceConfig>,
}

/// Top-level configuration document (spec.md §6): `c` general config,
/// `a` ordered accessory array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub c: GeneralConfig,
    pub a: Vec<AccessoryGroupConfig>,
}

fn characteristics_for(kind: &ServiceKind) -> Vec<Characteristic> {
    use crate::model::characteristic::NumericConstraints;
    let bool_ch = |name, v| Characteristic::new(name, Value::Bool(v));
    let float_ch = |name, v| Characteristic::new(name, Value::Float(v));
    match kind {
        ServiceKind::Switch(_) | ServiceKind::Outlet(_) | ServiceKind::WaterValve(_) => vec![bool_ch("on", false)],
        ServiceKind::Lock(_) => vec![Characteristic::new("lock-state", Value::UInt(1))],
        ServiceKind::ContactSensor(_)
        | ServiceKind::OccupancySensor(_)
        | ServiceKind::LeakSensor(_)
        | ServiceKind::SmokeSensor(_)
        | ServiceKind::CarbonMonoxideSensor(_)
        | ServiceKind::CarbonDioxideSensor(_)
        | ServiceKind::FilterChangeSensor(_)
        | ServiceKind::MotionSensor(_) => vec![bool_ch("detected", false)],
        ServiceKind::Button(_) | ServiceKind::Doorbell(_) => vec![Characteristic::new("event", Value::UInt(0))],
        ServiceKind::AirQuality(_) => vec![float_ch("density", 0.0)],
        ServiceKind::Thermostat(_) | ServiceKind::ThermostatWithHum(_) => vec![
            float_ch("current-temp", 20.0),
            float_ch("current-hum", 50.0),
            float_ch("heater-threshold", 20.0),
            float_ch("cooler-threshold", 26.0),
        ],
        ServiceKind::IAirZoning(_) => vec![],
        ServiceKind::TempSensor(_) => vec![float_ch("temperature", 20.0)],
        ServiceKind::HumSensor(_) => vec![float_ch("humidity", 50.0)],
        ServiceKind::ThSensor(_) => vec![float_ch("temperature", 20.0), float_ch("humidity", 50.0)],
        ServiceKind::Humidifier(_) | ServiceKind::HumidifierWithTemp(_) => {
            vec![float_ch("current-hum", 50.0), Characteristic::new("target-hum", Value::UInt(45))]
        }
        ServiceKind::Lightbulb(_) => vec![bool_ch("on", false), Characteristic::new("brightness", Value::UInt(100))],
        ServiceKind::GarageDoor(_) => vec![Characteristic::new("door-state", Value::UInt(1))],
        ServiceKind::WindowCover(_) => vec![Characteristic::new("position", Value::UInt(0))
            .with_constraints(NumericConstraints { min: Some(0.0), max: Some(100.0), step: Some(1.0), valid_values: None })],
        ServiceKind::LightSensor(_) => vec![float_ch("lux", 0.0)],
        ServiceKind::SecuritySystem(_) => vec![Characteristic::new("state", Value::UInt(3))],
        ServiceKind::Tv(_) => vec![bool_ch("active", false)],
        ServiceKind::Fan(_) => vec![bool_ch("on", false), Characteristic::new("speed", Value::UInt(100))],
        ServiceKind::Battery(_) => vec![Characteristic::new("battery-level", Value::UInt(100))],
        ServiceKind::PowerMonitor(_) => {
            vec![float_ch("watts", 0.0), float_ch("volts", 0.0), float_ch("amperes", 0.0)]
        }
        ServiceKind::FreeMonitor(_) | ServiceKind::FreeMonitorAccumulative(_) => vec![float_ch("value", 0.0)],
        ServiceKind::DataHistory(_) => vec![],
        ServiceKind::RootDevice => vec![],
    }
}

fn build_kind(config: AccessoryKindConfig) -> ServiceKind {
    match config {
        AccessoryKindConfig::Switch(s) => ServiceKind::Switch(s),
        AccessoryKindConfig::Outlet(s) => ServiceKind::Outlet(s),
        AccessoryKindConfig::WaterValve(s) => ServiceKind::WaterValve(s),
        AccessoryKindConfig::Button(s) => ServiceKind::Button(s),
        AccessoryKindConfig::Doorbell(s) => ServiceKind::Doorbell(s),
        AccessoryKindConfig::Lock(s) => ServiceKind::Lock(s),
        AccessoryKindConfig::ContactSensor(s) => ServiceKind::ContactSensor(s),
        AccessoryKindConfig::OccupancySensor(s) => ServiceKind::OccupancySensor(s),
        AccessoryKindConfig::LeakSensor(s) => ServiceKind::LeakSensor(s),
        AccessoryKindConfig::SmokeSensor(s) => ServiceKind::SmokeSensor(s),
        AccessoryKindConfig::CarbonMonoxideSensor(s) => ServiceKind::CarbonMonoxideSensor(s),
        AccessoryKindConfig::CarbonDioxideSensor(s) => ServiceKind::CarbonDioxideSensor(s),
        AccessoryKindConfig::FilterChangeSensor(s) => ServiceKind::FilterChangeSensor(s),
        AccessoryKindConfig::MotionSensor(s) => ServiceKind::MotionSensor(s),
        AccessoryKindConfig::AirQuality(s) => ServiceKind::AirQuality(s),
        AccessoryKindConfig::Thermostat(s) => ServiceKind::Thermostat(s),
        AccessoryKindConfig::ThermostatWithHum(s) => ServiceKind::ThermostatWithHum(s),
        AccessoryKindConfig::IAirZoning(c) => {
            ServiceKind::IAirZoning(IAirZoning::new(Vec::new(), c.close_before_open_delay_ms))
        }
        AccessoryKindConfig::TempSensor(s) => ServiceKind::TempSensor(s),
        AccessoryKindConfig::HumSensor(s) => ServiceKind::HumSensor(s),
        AccessoryKindConfig::ThSensor(s) => ServiceKind::ThSensor(s),
        AccessoryKindConfig::Humidifier(s) => ServiceKind::Humidifier(s),
        AccessoryKindConfig::HumidifierWithTemp(s) => ServiceKind::HumidifierWithTemp(s),
        AccessoryKindConfig::Lightbulb(c) => ServiceKind::Lightbulb(c.build()),
        AccessoryKindConfig::GarageDoor(c) => ServiceKind::GarageDoor(c.build()),
        AccessoryKindConfig::WindowCover(c) => ServiceKind::WindowCover(c.build()),
        AccessoryKindConfig::LightSensor(s) => ServiceKind::LightSensor(s),
        AccessoryKindConfig::SecuritySystem(s) => ServiceKind::SecuritySystem(s),
        AccessoryKindConfig::Tv(s) => ServiceKind::Tv(s),
        AccessoryKindConfig::Fan(s) => ServiceKind::Fan(s),
        AccessoryKindConfig::Battery(s) => ServiceKind::Battery(s),
        AccessoryKindConfig::PowerMonitor(s) => ServiceKind::PowerMonitor(s),
        AccessoryKindConfig::FreeMonitor(c) => ServiceKind::FreeMonitor(c.build()),
        AccessoryKindConfig::FreeMonitorAccumulative(c) => {
            let mut fm = c.build();
            fm.accumulative = true;
            ServiceKind::FreeMonitorAccumulative(fm)
        }
        AccessoryKindConfig::DataHistory(c) => ServiceKind::DataHistory(c.build()),
        AccessoryKindConfig::RootDevice => ServiceKind::RootDevice,
    }
}

fn resolve_action_entries(index: ServiceIndex, entries: &mut ActionEntries) {
    for e in &mut entries.serv_manager {
        e.target_service = resolve_relative_index(index, e.target_service as i32);
    }
    for e in &mut entries.set_ch {
        e.source_service = resolve_relative_index(index, e.source_service as i32);
        e.target_service = resolve_relative_index(index, e.target_service as i32);
    }
}

/// Builds the runtime [`Registry`] from a parsed [`ConfigDocument`]
/// (spec.md §6, §9 "Runtime replacing the global singleton"). Every
/// cross-service reference (service-manager targets, set-ch source/
/// target, copy sources, iAirZoning zone membership) is resolved from
/// the relative encoding to an absolute index as each service's
/// absolute position becomes known.
pub fn build_registry(doc: &ConfigDocument) -> Result<Registry, ConfigError> {
    if doc.a.is_empty() {
        return Err(ConfigError::NoAccessories);
    }

    let mut registry = Registry::new();
    let mut zone_refs: Vec<(ServiceIndex, Vec<i32>)> = Vec::new();

    for group in &doc.a {
        let mut indices = Vec::with_capacity(group.services.len());
        for svc_config in &group.services {
            let kind = build_kind(svc_config.kind.clone());
            let index = registry.len();

            if let AccessoryKindConfig::IAirZoning(c) = &svc_config.kind {
                zone_refs.push((index, c.zones.clone()));
            }

            let mut service = Service::new(index, svc_config.name.clone(), kind);
            service.characteristics = characteristics_for(&service.kind);
            service.homekit_enabled = svc_config.homekit_enabled;
            service.ir_protocol = svc_config.ir_protocol.clone();
            service.actions.copy = svc_config.copy.clone();

            for (action_id, raw_entries) in &svc_config.actions {
                let id: i32 = action_id.parse().map_err(|_| ConfigError::Malformed(format!("non-numeric action key {action_id:?}")))?;
                let mut resolved = raw_entries.clone();
                resolve_action_entries(index, &mut resolved);
                service.actions.by_id.insert(id, resolved);
            }
            let mut slots: Vec<&String> = svc_config.wildcards.keys().collect();
            slots.sort();
            for key in slots {
                service.wildcard_actions.extend(svc_config.wildcards[key].iter().copied());
            }

            registry.push_service(service);
            indices.push(index);
        }
        registry.push_accessory(Accessory {
            name: group.name.clone(),
            services: indices,
            is_bridge: false,
            has_setup_options: false,
        });
    }

    for (index, zones) in zone_refs {
        let resolved: Vec<ServiceIndex> = zones.iter().map(|n| resolve_relative_index(index, *n)).collect();
        if let ServiceKind::IAirZoning(zoning) = &mut registry.service_mut(index).kind {
            *zoning = IAirZoning::new(resolved, zoning.close_before_open_delay_ms);
        }
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_index_rules_match_the_three_cases() {
        assert_eq!(resolve_relative_index(10, 7005), 15);
        assert_eq!(resolve_relative_index(10, 0), 10);
        assert_eq!(resolve_relative_index(10, -2), 8);
        assert_eq!(resolve_relative_index(10, 3), 3);
    }

    #[test]
    fn build_registry_rejects_an_empty_accessory_list() {
        let doc = ConfigDocument::default();
        assert!(matches!(build_registry(&doc), Err(ConfigError::NoAccessories)));
    }

    #[test]
    fn build_registry_constructs_one_service_per_accessory_entry() {
        let doc = ConfigDocument {
            c: GeneralConfig::default(),
            a: vec![AccessoryGroupConfig {
                name: "Kitchen".to_string(),
                services: vec![AccessoryServiceConfig {
                    name: "Light".to_string(),
                    kind: AccessoryKindConfig::Switch(crate::services::switch::Switch::default()),
                    actions: HashMap::new(),
                    copy: Vec::new(),
                    wildcards: Default::default(),
                    homekit_enabled: HomekitVisibility::Visible,
                    ir_protocol: None,
                }],
            }],
        };
        let registry = build_registry(&doc).expect("build");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.service(0).name, "Light");
        assert_eq!(registry.service(0).characteristics[0].value, Value::Bool(false));
    }
}
