//! The `Runtime` (spec.md §9 "Runtime replacing the global singleton"):
//! owns the [`Registry`], the [`Scheduler`], and every hardware/network/
//! persistence/RPC boundary, and drives one cooperative tick at a time.
//! Generalizes the teacher's `OpenSprinkler` main-config singleton plus
//! its `do_time_keeping`/`check_network`/`check_timetable`-style 1 Hz
//! main-loop bodies into a single struct with one `tick()` entry point.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use chrono::{DateTime, Datelike, Local, Timelike};
use tracing::{debug, warn};

use crate::action::{self, DispatchContext, PendingEffects, ScheduledTask, SharedEffects};
use crate::config::GeneralConfig;
use crate::errors::Result;
use crate::gpio::GpioDriver;
use crate::model::{Registry, ServiceIndex, ServiceKind, Value};
use crate::net::NetworkClient;
use crate::persistence::{KeyValueStore, PersistenceManager};
use crate::rpc::RpcTransport;
use crate::scheduler::Scheduler;
use crate::services::air_zoning::{IAirZoningAction, MainMode};
use crate::services::free_monitor::{Extraction, FreeMonitor, Operand, Source as FreeMonitorSource};
use crate::services::hysteresis::ThermoState;
use crate::services::thermostat::{TargetMode as ThermostatMode, Thermostat};

/// Process-lifecycle requests surfaced by a tick, drained by `main.rs`
/// (spec.md §4.1 step 4 / §9: the runtime itself never tears down the
/// process or restarts Wi-Fi, it only reports the request).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemRequests {
    pub enter_setup_mode: bool,
    pub start_ota_update: bool,
    pub reboot: bool,
    pub wifi_reconnect: bool,
}

impl SystemRequests {
    pub fn any(&self) -> bool {
        self.enter_setup_mode || self.start_ota_update || self.reboot || self.wifi_reconnect
    }
}

/// Owns the whole accessory model and every boundary it needs to run
/// (spec.md §9). One `Runtime` per process; built once at boot from a
/// [`crate::config::ConfigDocument`] and ticked forever after.
pub struct Runtime {
    registry: Registry,
    scheduler: Scheduler,
    gpio: Box<dyn GpioDriver>,
    network: Box<dyn NetworkClient>,
    store: Box<dyn KeyValueStore>,
    transport: Box<dyn RpcTransport>,
    persistence: PersistenceManager,
    pending: SharedEffects,
    general: GeneralConfig,

    /// The lone [`ServiceKind::RootDevice`] service, if the config
    /// declared one. Timetable matches have no per-entry `service`
    /// field (spec.md §6 timetable row only carries an `action_id`), so
    /// they dispatch against this service, mirroring the teacher's own
    /// timetable firing against its single global `os` config.
    root_device: Option<ServiceIndex>,

    last_state_tick: Option<Instant>,
    last_timetable_minute: Option<i64>,
    setup_toggle_count: u32,
    setup_toggle_last: Option<Instant>,
    system_requests: SystemRequests,

    /// Seed for the maths-source `Operand::Random` operand. This crate
    /// carries no `rand` dependency (unlike the onboard hardware TRNG
    /// the teacher firmware reads for the same operand); a xorshift64
    /// PRNG seeded once at boot is a documented simplification (see
    /// DESIGN.md) rather than a fabricated dependency.
    rng_state: Cell<u64>,
}

/// Dedicated auto-off and deadband timers tick once per second
/// (spec.md §4.4, §4.3 "periodic sensor timers" / debounced update).
const STATE_MACHINE_PERIOD: std::time::Duration = std::time::Duration::from_secs(1);

/// Setup-mode toggle re-arm window: if the next physical toggle doesn't
/// land within this window of the last one, the count resets instead of
/// accumulating (spec.md §4.11).
const SETUP_TOGGLE_WINDOW: std::time::Duration = std::time::Duration::from_secs(10);

impl Runtime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Registry,
        general: GeneralConfig,
        gpio: Box<dyn GpioDriver>,
        network: Box<dyn NetworkClient>,
        store: Box<dyn KeyValueStore>,
        transport: Box<dyn RpcTransport>,
    ) -> Self {
        let root_device = registry
            .services()
            .iter()
            .find(|svc| matches!(svc.kind, ServiceKind::RootDevice))
            .map(|svc| svc.index);

        if root_device.is_none() && !general.timetable.is_empty() {
            warn!("configuration declares a timetable but no root-device service; timetable actions have nowhere to dispatch");
        }

        Runtime {
            registry,
            scheduler: Scheduler::new(),
            gpio,
            network,
            store,
            transport,
            persistence: PersistenceManager::new(),
            pending: Rc::new(std::cell::RefCell::new(PendingEffects::default())),
            general,
            root_device,
            last_state_tick: None,
            last_timetable_minute: None,
            setup_toggle_count: 0,
            setup_toggle_last: None,
            system_requests: SystemRequests::default(),
            rng_state: Cell::new(0x9E3779B97F4A7C15),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Runs the seven-step dispatch contract against `service` (spec.md
    /// §4.1), then marks the model dirty for the persistence debounce.
    pub fn dispatch(&mut self, service: ServiceIndex, action_id: i32, now: Instant) {
        {
            let mut ctx = DispatchContext {
                registry: &mut self.registry,
                scheduler: &mut self.scheduler,
                gpio: self.gpio.as_mut(),
                pending: self.pending.clone(),
                now,
            };
            action::dispatch(&mut ctx, service, action_id);
        }
        self.persistence.mark_dirty(now);
    }

    /// One cooperative main-loop iteration (spec.md §9). `wall_clock` is
    /// passed in rather than read from `Local::now()` here so the
    /// timetable matcher and free-monitor clock operands stay testable.
    pub fn tick(&mut self, now: Instant, wall_clock: DateTime<Local>) -> Result<()> {
        self.scheduler.tick(now);
        self.run_timetable(&wall_clock, now);
        self.run_state_machines(now, &wall_clock);
        self.flush_gpio_writes();
        self.drain_worker_tasks(now);
        self.drain_notifications();
        self.persistence.tick(now, &self.registry, self.store.as_mut())?;
        Ok(())
    }

    /// Drains and clears every pending process-lifecycle request (spec.md
    /// §4.1 step 4); `main.rs` owns actually acting on them.
    pub fn take_system_requests(&mut self) -> SystemRequests {
        std::mem::take(&mut self.system_requests)
    }

    /// Forces setup mode on the next `take_system_requests` regardless of
    /// toggle count, for the CLI's `--force-setup` flag (spec.md §6
    /// "CLI/boot semantics").
    pub fn request_setup_mode(&mut self) {
        self.system_requests.enter_setup_mode = true;
    }

    /// Records one physical toggle of the configured setup-mode input
    /// (spec.md §4.11): `setup_toggle_count` toggles within
    /// [`SETUP_TOGGLE_WINDOW`] of each other request entry into setup mode.
    pub fn note_setup_toggle(&mut self, now: Instant) {
        let rearmed = match self.setup_toggle_last {
            Some(last) => now.duration_since(last) > SETUP_TOGGLE_WINDOW,
            None => false,
        };
        if rearmed {
            self.setup_toggle_count = 0;
        }
        self.setup_toggle_count += 1;
        self.setup_toggle_last = Some(now);

        if self.setup_toggle_count >= self.general.setup_toggle_count as u32 {
            self.setup_toggle_count = 0;
            self.system_requests.enter_setup_mode = true;
        }
    }

    fn flush_gpio_writes(&mut self) {
        let writes = std::mem::take(&mut self.pending.borrow_mut().gpio_writes);
        for (pin, high) in writes {
            self.gpio.write(pin, high);
        }
    }

    /// Runs every due network/IR-RF/UART worker task (spec.md §4.1 step
    /// 7, §3 reentrancy invariant): each task re-enters through
    /// [`crate::model::Service::try_enter_working`] so a worker task that
    /// fires back into its own owning service is silently dropped.
    fn drain_worker_tasks(&mut self, now: Instant) {
        let network_tasks = take_ready(&mut self.pending.borrow_mut().network, now);
        let irrf_tasks = take_ready(&mut self.pending.borrow_mut().irrf, now);
        let uart_tasks = take_ready(&mut self.pending.borrow_mut().uart, now);
        let system_tasks = std::mem::take(&mut self.pending.borrow_mut().system);

        for task in network_tasks {
            let service = task.service;
            let request = task.task.request;
            self.run_guarded(service, |rt| match rt.network.execute(&request) {
                Ok(bytes) => rt.apply_free_monitor_response(service, &bytes, true),
                Err(err) => warn!(service, error = %err, "network worker failed"),
            });
        }
        for task in irrf_tasks {
            let service = task.service;
            let job = task.task;
            self.run_guarded(service, move |rt| {
                rt.gpio.transmit_ir(&job.pulses_us, job.frequency_hz, job.repeat, job.inter_repeat_pause_ms);
            });
        }
        for task in uart_tasks {
            let service = task.service;
            let job = task.task;
            self.run_guarded(service, move |rt| match rt.gpio.uart_transfer(job.uart, &job.bytes) {
                Ok(bytes) => rt.apply_free_monitor_response(service, &bytes, false),
                Err(err) => warn!(service, error = %err, "uart worker failed"),
            });
        }

        for entry in system_tasks {
            match entry {
                crate::action::system::SystemEntry::EnterSetupMode => self.system_requests.enter_setup_mode = true,
                crate::action::system::SystemEntry::StartOtaUpdate => self.system_requests.start_ota_update = true,
                crate::action::system::SystemEntry::Reboot => self.system_requests.reboot = true,
                crate::action::system::SystemEntry::WifiReconnect => self.system_requests.wifi_reconnect = true,
            }
        }
    }

    /// Runs `body` against `self` guarded by `service`'s reentrancy flag
    /// (spec.md §3: "re-entry through the same service is silently
    /// dropped"). A service index with no matching service is a no-op.
    fn run_guarded(&mut self, service: ServiceIndex, body: impl FnOnce(&mut Runtime)) {
        let Some(svc) = self.registry.try_service_mut(service) else { return };
        if !svc.try_enter_working() {
            return;
        }
        body(self);
        if let Some(svc) = self.registry.try_service_mut(service) {
            svc.leave_working();
        }
    }

    /// Parses a network/UART worker task's response bytes through
    /// `service`'s free-monitor [`Extraction`], if it's configured with
    /// one for this kind of task (spec.md §4.6). `want_network` selects
    /// between [`FreeMonitorSource::Network`] (network task) and
    /// [`FreeMonitorSource::UartPattern`] (UART task) so a service
    /// configured for one doesn't get fed the other's bytes. A service
    /// with no free-monitor source, or the wrong one, is a no-op.
    fn apply_free_monitor_response(&mut self, service: ServiceIndex, bytes: &[u8], want_network: bool) {
        let extraction = match self.registry.try_service(service).map(|svc| &svc.kind) {
            Some(ServiceKind::FreeMonitor(fm)) | Some(ServiceKind::FreeMonitorAccumulative(fm)) => match &fm.source {
                FreeMonitorSource::Network { extraction } if want_network => Some(extraction.clone()),
                FreeMonitorSource::UartPattern { extraction } if !want_network => Some(extraction.clone()),
                _ => None,
            },
            _ => None,
        };
        let Some(extraction): Option<Extraction> = extraction else { return };

        let Some(raw) = extraction.extract(bytes) else {
            warn!(service, "free monitor pattern/offset extraction found no match in the response");
            return;
        };

        let svc = self.registry.service_mut(service);
        let value = match &mut svc.kind {
            ServiceKind::FreeMonitor(fm) | ServiceKind::FreeMonitorAccumulative(fm) => fm.post_process(raw),
            _ => None,
        };
        if let Some(value) = value {
            svc.set_characteristic(0, Value::Float(value as f64));
        }
    }

    fn drain_notifications(&mut self) {
        for index in 0..self.registry.len() {
            let notifications: Vec<(usize, Value)> = {
                let svc = self.registry.service_mut(index);
                let pending = svc.drain_pending_notifications();
                pending.into_iter().map(|ch| (ch, svc.characteristics[ch].value.clone())).collect()
            };
            for (ch, value) in notifications {
                self.transport.notify(index, ch, &value);
            }
        }
    }

    /// Matches the configured timetable against wall-clock time once per
    /// minute (spec.md §4.8), dispatching each matched action id against
    /// the [`ServiceKind::RootDevice`] service.
    fn run_timetable(&mut self, wall_clock: &DateTime<Local>, now: Instant) {
        let minute_key = wall_clock.num_seconds_from_midnight() as i64 / 60
            + wall_clock.num_days_from_ce() as i64 * 1440;
        if self.last_timetable_minute == Some(minute_key) {
            return;
        }
        self.last_timetable_minute = Some(minute_key);

        let Some(target) = self.root_device else { return };
        let action_ids: Vec<i32> = crate::scheduler::timetable::matching_actions(&self.general.timetable, wall_clock).collect();
        for action_id in action_ids {
            self.dispatch(target, action_id, now);
        }
    }

    /// Runs every 1 Hz-gated service state machine (spec.md §4.3, §4.4,
    /// §4.5, §4.8): auto-off countdowns, thermostat/humidifier hysteresis,
    /// door/cover position estimators, the security-alarm oscillator,
    /// power accumulation, free-monitor maths re-evaluation, and iAirZoning
    /// gating.
    fn run_state_machines(&mut self, now: Instant, wall_clock: &DateTime<Local>) {
        let due = match self.last_state_tick {
            Some(last) => now.duration_since(last) >= STATE_MACHINE_PERIOD,
            None => true,
        };
        if !due {
            return;
        }
        self.last_state_tick = Some(now);

        self.tick_switches_and_sensors(now);
        self.tick_thermostats_and_humidifiers(now);
        self.tick_doors_and_covers();
        self.tick_security_systems(now);
        self.tick_power_monitors();
        self.tick_free_monitors(wall_clock);
        self.tick_air_zoning(now);
        self.persistence.mark_dirty(now);
    }

    /// Auto-off countdowns for switch/outlet/water-valve and the binary
    /// sensor family (spec.md §4.4, §8 scenario 1).
    fn tick_switches_and_sensors(&mut self, now: Instant) {
        for index in 0..self.registry.len() {
            let expired = {
                let svc = self.registry.service_mut(index);
                match &mut svc.kind {
                    ServiceKind::Switch(sw) | ServiceKind::Outlet(sw) | ServiceKind::WaterValve(sw) => {
                        sw.auto_off_remaining.is_some().then(|| sw.tick_auto_off())
                    }
                    ServiceKind::ContactSensor(s)
                    | ServiceKind::OccupancySensor(s)
                    | ServiceKind::LeakSensor(s)
                    | ServiceKind::SmokeSensor(s)
                    | ServiceKind::CarbonMonoxideSensor(s)
                    | ServiceKind::CarbonDioxideSensor(s)
                    | ServiceKind::FilterChangeSensor(s)
                    | ServiceKind::MotionSensor(s) => s.auto_off_remaining.is_some().then(|| s.tick_auto_off()),
                    _ => None,
                }
            };
            if expired == Some(true) {
                self.sync_active_characteristic(index);
                self.persistence.mark_dirty(now);
            }
        }
    }

    /// Republishes a switch/sensor's `active` state onto characteristic 0
    /// after a state machine mutated it directly (bypassing set-ch/serv
    /// manager, which already call `set_characteristic` themselves).
    fn sync_active_characteristic(&mut self, index: ServiceIndex) {
        let svc = self.registry.service_mut(index);
        let active = match &svc.kind {
            ServiceKind::Switch(sw) | ServiceKind::Outlet(sw) | ServiceKind::WaterValve(sw) => Some(sw.active),
            ServiceKind::ContactSensor(s)
            | ServiceKind::OccupancySensor(s)
            | ServiceKind::LeakSensor(s)
            | ServiceKind::SmokeSensor(s)
            | ServiceKind::CarbonMonoxideSensor(s)
            | ServiceKind::CarbonDioxideSensor(s)
            | ServiceKind::FilterChangeSensor(s)
            | ServiceKind::MotionSensor(s) => Some(s.active),
            _ => None,
        };
        if let Some(active) = active {
            svc.set_characteristic(0, Value::Bool(active));
        }
    }

    /// Debounced thermostat/humidifier processing tick (spec.md §4.3);
    /// dispatches the resulting action id the same way
    /// [`crate::action::serv_manager::apply_dialect`] does for a
    /// manager-triggered transition.
    fn tick_thermostats_and_humidifiers(&mut self, now: Instant) {
        for index in 0..self.registry.len() {
            let action_id = {
                let svc = self.registry.service_mut(index);
                match &mut svc.kind {
                    ServiceKind::Thermostat(t) | ServiceKind::ThermostatWithHum(t) => {
                        t.process_tick().map(|a| a.action_id())
                    }
                    ServiceKind::Humidifier(h) | ServiceKind::HumidifierWithTemp(h) => {
                        h.process_tick().map(|a| a.action_id())
                    }
                    _ => None,
                }
            };
            self.sync_thermostat_characteristics(index);
            if let Some(action_id) = action_id {
                self.dispatch(index, action_id, now);
            }
        }
    }

    fn sync_thermostat_characteristics(&mut self, index: ServiceIndex) {
        let svc = self.registry.service_mut(index);
        match &svc.kind {
            ServiceKind::Thermostat(t) | ServiceKind::ThermostatWithHum(t) => {
                let (temp, hum, heater, cooler) =
                    (t.current_temp as f64, t.current_hum as f64, t.heater_threshold as f64, t.cooler_threshold as f64);
                svc.set_characteristic(0, Value::Float(temp));
                svc.set_characteristic(1, Value::Float(hum));
                svc.set_characteristic(2, Value::Float(heater));
                svc.set_characteristic(3, Value::Float(cooler));
            }
            ServiceKind::Humidifier(h) | ServiceKind::HumidifierWithTemp(h) => {
                let hum = h.current_hum as f64;
                svc.set_characteristic(0, Value::Float(hum));
            }
            _ => {}
        }
    }

    /// 1 Hz garage-door position estimator and window-cover travel-time
    /// tick (spec.md §4.4). Doors with no confirming sensors ignore the
    /// `sensor_confirmed` argument entirely; no config path wires a
    /// cross-service sensor reference for doors that do set
    /// `has_confirming_sensors`, so `true` is passed unconditionally —
    /// a documented simplification (see DESIGN.md).
    fn tick_doors_and_covers(&mut self) {
        for index in 0..self.registry.len() {
            let svc = self.registry.service_mut(index);
            match &mut svc.kind {
                ServiceKind::GarageDoor(door) => {
                    door.tick(1.0, true);
                    let code = door_state_code(door.state);
                    svc.set_characteristic(0, Value::UInt(code));
                }
                ServiceKind::WindowCover(cover) => {
                    cover.tick(1.0);
                    let position = cover.current_position.round().clamp(0.0, 100.0) as u64;
                    svc.set_characteristic(0, Value::UInt(position));
                }
                _ => {}
            }
        }
    }

    /// Alarm-chime oscillator (spec.md §4.5 recurrent-alarm timer).
    fn tick_security_systems(&mut self, _now: Instant) {
        for index in 0..self.registry.len() {
            let svc = self.registry.service_mut(index);
            if let ServiceKind::SecuritySystem(sec) = &mut svc.kind {
                sec.oscillate();
                let code = security_state_code(sec.current_state);
                svc.set_characteristic(0, Value::UInt(code));
            }
        }
    }

    /// Power accumulation at the 1 Hz state-machine rate, floored by
    /// [`crate::services::power_monitor::MIN_SAMPLE_PERIOD_MS`] (spec.md
    /// §4.8).
    fn tick_power_monitors(&mut self) {
        let period_ms = STATE_MACHINE_PERIOD.as_millis() as u32;
        for index in 0..self.registry.len() {
            let svc = self.registry.service_mut(index);
            if let ServiceKind::PowerMonitor(power) = &mut svc.kind {
                power.accumulate(period_ms);
                let (watts, voltage, amps) = (power.watts as f64, power.voltage as f64, power.current_amps as f64);
                svc.set_characteristic(0, Value::Float(watts));
                svc.set_characteristic(1, Value::Float(voltage));
                svc.set_characteristic(2, Value::Float(amps));
            }
        }
    }

    /// Re-evaluates every [`FreeMonitorSource::Maths`]-sourced free
    /// monitor (spec.md §4.6). `Network` and `UartPattern` sources don't
    /// poll here either, but for a different reason: they're driven by
    /// their own service's network/UART worker task completing, and
    /// parsed in [`Self::apply_free_monitor_response`] instead. `Adc`,
    /// `I2c`, `PulseFrequency` and `PulseTime` name no onboard ADC/I2C/
    /// pulse-counting acquisition loop in this model (e.g. `Source::Adc`
    /// is just `{ inverted: bool }`, with nothing driving a read) and
    /// stay externally driven through `serv_manager::apply_dialect`'s
    /// `post_process` call — a documented scope simplification (see
    /// DESIGN.md).
    fn tick_free_monitors(&mut self, wall_clock: &DateTime<Local>) {
        for index in 0..self.registry.len() {
            let ops = match &self.registry.service(index).kind {
                ServiceKind::FreeMonitor(fm) | ServiceKind::FreeMonitorAccumulative(fm) => match &fm.source {
                    FreeMonitorSource::Maths { ops } => Some(ops.clone()),
                    _ => None,
                },
                _ => None,
            };
            let Some(ops) = ops else { continue };

            let probe = FreeMonitor::new(FreeMonitorSource::Maths { ops });
            let raw = probe.evaluate_maths(|operand| self.resolve_operand(operand, wall_clock));
            let Some(raw) = raw else { continue };

            let svc = self.registry.service_mut(index);
            let value = match &mut svc.kind {
                ServiceKind::FreeMonitor(fm) | ServiceKind::FreeMonitorAccumulative(fm) => fm.post_process(raw),
                _ => None,
            };
            if let Some(value) = value {
                svc.set_characteristic(0, Value::Float(value as f64));
            }
        }
    }

    fn resolve_operand(&self, operand: Operand, wall_clock: &DateTime<Local>) -> f32 {
        match operand {
            Operand::Literal(v) => v,
            Operand::Characteristic(service) => self
                .registry
                .try_service(service)
                .and_then(|svc| svc.characteristics.first())
                .map(|ch| ch.value.as_f64() as f32)
                .unwrap_or(0.0),
            Operand::ClockSecond => wall_clock.second() as f32,
            Operand::ClockMinute => wall_clock.minute() as f32,
            Operand::ClockHour => wall_clock.hour() as f32,
            Operand::ClockDayOfWeek => wall_clock.weekday().num_days_from_sunday() as f32,
            Operand::Random => self.next_random() as f32 / u32::MAX as f32,
        }
    }

    fn next_random(&self) -> u32 {
        let mut x = self.rng_state.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state.set(x);
        (x >> 32) as u32
    }

    /// Runs the iAirZoning gate loop for every member (spec.md §4.3
    /// "iAirZoning"). The config carries no gate-pin field for the zones
    /// a unit opens/closes, so the resulting `to_open`/`to_close` lists
    /// are only logged, not wired to any GPIO — documented in DESIGN.md.
    fn tick_air_zoning(&mut self, now: Instant) {
        for index in 0..self.registry.len() {
            let zones = match &self.registry.service(index).kind {
                ServiceKind::IAirZoning(z) => Some(z.zones.clone()),
                _ => None,
            };
            let Some(zones) = zones else { continue };

            let mut states: Vec<(ThermoState, MainMode)> = Vec::with_capacity(zones.len());
            for &zone in &zones {
                let state = match self.registry.try_service(zone).map(|svc| &svc.kind) {
                    Some(ServiceKind::Thermostat(t)) | Some(ServiceKind::ThermostatWithHum(t)) => {
                        (t.current_state, thermostat_side_mode(t))
                    }
                    _ => (ThermoState::Off, MainMode::Off),
                };
                states.push(state);
            }

            let (to_close, to_open, fired) = {
                let svc = self.registry.service_mut(index);
                let ServiceKind::IAirZoning(zoning) = &mut svc.kind else { unreachable!() };
                zoning.tick(&mut states, now)
            };

            if !to_close.is_empty() || !to_open.is_empty() {
                debug!(service = index, ?to_close, ?to_open, "iAirZoning gate transition (no modeled gate GPIO)");
            }

            if let Some(action) = fired {
                let main_mode = match &self.registry.service(index).kind {
                    ServiceKind::IAirZoning(z) => z.main_mode,
                    _ => unreachable!(),
                };
                self.dispatch(index, iair_zoning_action_id(action, main_mode), now);
            }
        }
    }
}

/// HomeKit-convention door-state encoding (spec.md §4.4): 0 open, 1
/// closed, 2 opening, 3 closing, 4 stopped/obstructed (matching the
/// characteristic's bootstrap default of `1` in `config::characteristics_for`).
fn door_state_code(state: crate::services::door::DoorState) -> u64 {
    use crate::services::door::DoorState;
    match state {
        DoorState::Open => 0,
        DoorState::Closed => 1,
        DoorState::Opening => 2,
        DoorState::Closing => 3,
        DoorState::Stopped | DoorState::Obstructed => 4,
    }
}

/// Matches [`crate::services::security::decode_manager_value`]'s HomeKit
/// convention: 0 stay, 1 away, 2 night, 3 disarmed, 4 triggered.
fn security_state_code(state: crate::services::security::SecurityCurrentState) -> u64 {
    use crate::services::security::SecurityCurrentState;
    match state {
        SecurityCurrentState::StayArm => 0,
        SecurityCurrentState::AwayArm => 1,
        SecurityCurrentState::NightArm => 2,
        SecurityCurrentState::Disarmed => 3,
        SecurityCurrentState::AlarmTriggered => 4,
    }
}

/// Derives the side a thermostat is currently asking the shared unit to
/// drive, for iAirZoning's per-zone `(ThermoState, MainMode)` pairing.
/// There's no public accessor for the thermostat's private active side,
/// so `auto` mode re-derives it from the same midpoint rule
/// `Thermostat::select_side` uses internally.
fn thermostat_side_mode(t: &Thermostat) -> MainMode {
    match t.target_mode {
        ThermostatMode::Heater => MainMode::Heater,
        ThermostatMode::Cooler => MainMode::Cooler,
        ThermostatMode::Off => MainMode::Off,
        ThermostatMode::Auto => {
            if t.current_temp < (t.heater_threshold + t.cooler_threshold) / 2.0 {
                MainMode::Heater
            } else {
                MainMode::Cooler
            }
        }
    }
}

/// Maps [`IAirZoningAction`]'s four variants onto the three
/// `IAIRZONING_*` action ids (spec.md §6 only reserves
/// `ALL_OFF`/`HEATER`/`COOLER`): `AllIdle` collapses onto `AllOff` since
/// both mean "the shared unit itself has nothing to drive right now",
/// and `AnyOn`/`AllSoftOn` resolve through whichever side `main_mode`
/// landed on. A documented simplification (see DESIGN.md).
fn iair_zoning_action_id(action: IAirZoningAction, main_mode: MainMode) -> i32 {
    use crate::action::ids;
    match action {
        IAirZoningAction::AllOff | IAirZoningAction::AllIdle => ids::IAIRZONING_ALL_OFF,
        IAirZoningAction::AnyOn | IAirZoningAction::AllSoftOn => match main_mode {
            MainMode::Heater => ids::IAIRZONING_HEATER,
            MainMode::Cooler => ids::IAIRZONING_COOLER,
            MainMode::Off => ids::IAIRZONING_ALL_OFF,
        },
    }
}

/// Splits `tasks` into (ready, still-pending) by `ready_at`, keeping the
/// still-pending ones queued (spec.md §4.1 step 7 one-tick spacing).
fn take_ready<T>(tasks: &mut Vec<ScheduledTask<T>>, now: Instant) -> Vec<ScheduledTask<T>> {
    let mut ready = Vec::new();
    let mut pending = Vec::new();
    for task in tasks.drain(..) {
        if task.ready_at <= now {
            ready.push(task);
        } else {
            pending.push(task);
        }
    }
    *tasks = pending;
    ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccessoryGroupConfig, AccessoryKindConfig, AccessoryServiceConfig, ConfigDocument};
    use crate::gpio::MemoryGpio;
    use crate::model::service::HomekitVisibility;
    use crate::net::MockNetworkClient;
    use crate::persistence::MemoryStore;
    use crate::rpc::RecordingTransport;
    use crate::services::switch::Switch;
    use std::collections::HashMap;

    fn runtime_with(kind: AccessoryKindConfig) -> Runtime {
        let doc = ConfigDocument {
            c: GeneralConfig::default(),
            a: vec![AccessoryGroupConfig {
                name: "Test".to_string(),
                services: vec![AccessoryServiceConfig {
                    name: "svc".to_string(),
                    kind,
                    actions: HashMap::new(),
                    copy: Vec::new(),
                    wildcards: Default::default(),
                    homekit_enabled: HomekitVisibility::Visible,
                    ir_protocol: None,
                }],
            }],
        };
        let registry = crate::config::build_registry(&doc).expect("build");
        Runtime::new(
            registry,
            doc.c,
            Box::new(MemoryGpio::new()),
            Box::new(MockNetworkClient::default()),
            Box::new(MemoryStore::new()),
            Box::new(RecordingTransport::default()),
        )
    }

    #[test]
    fn switch_auto_off_expires_and_republishes_characteristic() {
        let mut rt = runtime_with(AccessoryKindConfig::Switch(Switch::default()));
        let now = Instant::now();
        rt.dispatch(0, crate::action::ids::TOTAL_OFF, now);
        {
            let svc = rt.registry.service_mut(0);
            let ServiceKind::Switch(sw) = &mut svc.kind else { unreachable!() };
            sw.apply(crate::services::switch::decode_manager_value(-1));
        }
        let wall_clock = Local::now();
        rt.tick(now + std::time::Duration::from_secs(2), wall_clock).unwrap();
        let ServiceKind::Switch(sw) = &rt.registry.service(0).kind else { unreachable!() };
        assert!(!sw.active);
        assert_eq!(rt.registry.service(0).characteristics[0].value, Value::Bool(false));
    }

    #[test]
    fn network_free_monitor_extracts_and_publishes_the_worker_response() {
        use crate::config::FreeMonitorConfig;
        use crate::services::free_monitor::{Extraction, Pattern};

        let extraction =
            Extraction { pattern: Some(Pattern::Text("t=".to_string())), offset: 0, width: 2, little_endian: true, signed: false };
        let kind = AccessoryKindConfig::FreeMonitor(FreeMonitorConfig {
            source: FreeMonitorSource::Network { extraction },
            factor: 1.0,
            offset: 0.0,
        });
        let mut rt = runtime_with(kind);

        rt.apply_free_monitor_response(0, b"t=\x64\x00", true);

        assert_eq!(rt.registry.service(0).characteristics[0].value, Value::Float(100.0));
    }

    #[test]
    fn uart_source_ignores_a_network_task_response() {
        use crate::config::FreeMonitorConfig;
        use crate::services::free_monitor::{Extraction, Pattern};

        let extraction = Extraction { pattern: Some(Pattern::Text("t=".to_string())), offset: 0, width: 2, little_endian: true, signed: false };
        let kind = AccessoryKindConfig::FreeMonitor(FreeMonitorConfig {
            source: FreeMonitorSource::UartPattern { extraction },
            factor: 1.0,
            offset: 0.0,
        });
        let mut rt = runtime_with(kind);

        rt.apply_free_monitor_response(0, b"t=\x64\x00", true);

        assert_eq!(rt.registry.service(0).characteristics[0].value, Value::Float(0.0));
    }

    #[test]
    fn iair_zoning_action_id_collapses_idle_onto_all_off() {
        assert_eq!(iair_zoning_action_id(IAirZoningAction::AllIdle, MainMode::Off), crate::action::ids::IAIRZONING_ALL_OFF);
        assert_eq!(iair_zoning_action_id(IAirZoningAction::AnyOn, MainMode::Cooler), crate::action::ids::IAIRZONING_COOLER);
    }

    #[test]
    fn door_and_security_codes_match_homekit_convention() {
        use crate::services::door::DoorState;
        use crate::services::security::SecurityCurrentState;
        assert_eq!(door_state_code(DoorState::Open), 0);
        assert_eq!(door_state_code(DoorState::Obstructed), 4);
        assert_eq!(security_state_code(SecurityCurrentState::Disarmed), 3);
        assert_eq!(security_state_code(SecurityCurrentState::AlarmTriggered), 4);
    }
}
