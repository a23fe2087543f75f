//! Persistence boundary (spec.md §4.10): a key-value store addressed by
//! `"<service_index*100 + ch_index>"`, a 500ms save-debounce, and
//! boot-time priming with per-characteristic init overrides.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::errors::PersistenceError;
use crate::model::characteristic::Value;
use crate::model::{Registry, ServiceIndex};

/// Time after the last mutation before the debounce timer actually
/// writes last-state records (spec.md §4.10).
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Persisted well-known keys (spec.md §6 "Persistent keys").
pub const KEY_SETUP_MODE: &str = "haa_setup_mode";
pub const KEY_WIFI_SSID: &str = "wifi_ssid";
pub const KEY_WIFI_PASSWORD: &str = "wifi_password";
pub const KEY_LAST_CONFIG_NUMBER: &str = "last_config_number";
pub const KEY_HOMEKIT_RE_PAIR: &str = "homekit_re_pair";
pub const KEY_TOTAL_SERVICES: &str = "total_services";

/// `"<service_index*100 + ch_index>"` (spec.md §4.10).
pub fn characteristic_key(service: ServiceIndex, ch: usize) -> String {
    (service * 100 + ch).to_string()
}

/// Typed key-value persistence boundary (spec.md §6.1, §4.10). Backed by
/// NVS/flash in the real firmware; [`MemoryStore`] is the test double.
pub trait KeyValueStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, PersistenceError>;
    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), PersistenceError>;
    fn get_i8(&self, key: &str) -> Result<Option<i8>, PersistenceError>;
    fn set_i8(&mut self, key: &str, value: i8) -> Result<(), PersistenceError>;
    fn get_i32(&self, key: &str) -> Result<Option<i32>, PersistenceError>;
    fn set_i32(&mut self, key: &str, value: i32) -> Result<(), PersistenceError>;
    fn get_string(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set_string(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone, PartialEq)]
enum StoredValue {
    Bool(bool),
    I8(i8),
    I32(i32),
    Str(String),
}

/// In-memory test double; the `demo` feature build also uses this as its
/// backend instead of real flash.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

fn type_mismatch(key: &str) -> PersistenceError {
    PersistenceError::TypeMismatch(key.to_string())
}

impl KeyValueStore for MemoryStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>, PersistenceError> {
        match self.entries.get(key) {
            Some(StoredValue::Bool(v)) => Ok(Some(*v)),
            Some(_) => Err(type_mismatch(key)),
            None => Ok(None),
        }
    }

    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), StoredValue::Bool(value));
        Ok(())
    }

    fn get_i8(&self, key: &str) -> Result<Option<i8>, PersistenceError> {
        match self.entries.get(key) {
            Some(StoredValue::I8(v)) => Ok(Some(*v)),
            Some(_) => Err(type_mismatch(key)),
            None => Ok(None),
        }
    }

    fn set_i8(&mut self, key: &str, value: i8) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), StoredValue::I8(value));
        Ok(())
    }

    fn get_i32(&self, key: &str) -> Result<Option<i32>, PersistenceError> {
        match self.entries.get(key) {
            Some(StoredValue::I32(v)) => Ok(Some(*v)),
            Some(_) => Err(type_mismatch(key)),
            None => Ok(None),
        }
    }

    fn set_i32(&mut self, key: &str, value: i32) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), StoredValue::I32(value));
        Ok(())
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match self.entries.get(key) {
            Some(StoredValue::Str(v)) => Ok(Some(v.clone())),
            Some(_) => Err(type_mismatch(key)),
            None => Ok(None),
        }
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), StoredValue::Str(value.to_string()));
        Ok(())
    }
}

/// Per-characteristic boot-time override (spec.md §4.10 "init = LAST /
/// INV_LAST / fixed-0 / fixed-1 / ...").
#[derive(Debug, Clone, PartialEq)]
pub enum CharacteristicInit {
    /// Prime from the persisted record verbatim.
    Last,
    /// Prime from the persisted record, inverted (`!bool`, `-numeric`).
    InvLast,
    /// Always boot to this fixed value, ignoring any persisted record.
    Fixed(Value),
}

/// Writes a characteristic's current value into the store under its
/// `characteristic_key`.
fn write_value(store: &mut dyn KeyValueStore, key: &str, value: &Value) -> Result<(), PersistenceError> {
    match value {
        Value::Bool(b) => store.set_bool(key, *b),
        Value::Int(i) => store.set_i32(key, (*i).clamp(i32::MIN as i64, i32::MAX as i64) as i32),
        Value::UInt(u) => store.set_i32(key, (*u).min(i32::MAX as u64) as i32),
        Value::Float(f) => store.set_i32(key, (*f * 100.0) as i32),
        Value::Str(s) => store.set_string(key, s),
        Value::Bytes(_) => Ok(()),
    }
}

/// Reads a value back out of the store, matching `template`'s variant so
/// the right typed accessor is used.
fn read_value(store: &dyn KeyValueStore, key: &str, template: &Value) -> Result<Option<Value>, PersistenceError> {
    Ok(match template {
        Value::Bool(_) => store.get_bool(key)?.map(Value::Bool),
        Value::Int(_) => store.get_i32(key)?.map(|v| Value::Int(v as i64)),
        Value::UInt(_) => store.get_i32(key)?.map(|v| Value::UInt(v.max(0) as u64)),
        Value::Float(_) => store.get_i32(key)?.map(|v| Value::Float(v as f64 / 100.0)),
        Value::Str(_) => store.get_string(key)?.map(Value::Str),
        Value::Bytes(_) => None,
    })
}

fn invert(value: Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(!b),
        Value::Int(i) => Value::Int(-i),
        Value::UInt(u) => Value::UInt(u),
        Value::Float(f) => Value::Float(-f),
        other => other,
    }
}

/// Primes every characteristic named in `inits` from the store at boot
/// (spec.md §4.10 "Boot reads the same records to prime characteristic
/// defaults"). Characteristics with no entry in `inits` keep whatever
/// default their config/service constructor already set.
pub fn prime_registry(
    registry: &mut Registry,
    store: &dyn KeyValueStore,
    inits: &HashMap<(ServiceIndex, usize), CharacteristicInit>,
) -> Result<(), PersistenceError> {
    for (&(service, ch), init) in inits {
        let Some(svc) = registry.try_service_mut(service) else { continue };
        let Some(characteristic) = svc.characteristics.get_mut(ch) else { continue };
        let key = characteristic_key(service, ch);
        let primed = match init {
            CharacteristicInit::Fixed(v) => Some(v.clone()),
            CharacteristicInit::Last => read_value(store, &key, &characteristic.value)?,
            CharacteristicInit::InvLast => read_value(store, &key, &characteristic.value)?.map(invert),
        };
        if let Some(value) = primed {
            characteristic.value = value;
        }
    }
    Ok(())
}

/// Drives the 500ms save-debounce timer (spec.md §4.10). The runtime
/// calls [`Self::mark_dirty`] from every characteristic setter and
/// [`Self::tick`] once per main-loop iteration; the actual flush only
/// happens once mutations have been quiet for [`SAVE_DEBOUNCE`].
#[derive(Debug, Default)]
pub struct PersistenceManager {
    dirty_since: Option<Instant>,
}

impl PersistenceManager {
    pub fn new() -> Self {
        PersistenceManager::default()
    }

    pub fn mark_dirty(&mut self, now: Instant) {
        self.dirty_since = Some(now);
    }

    /// Flushes every characteristic's current value if the debounce
    /// window has elapsed since the last mutation, clearing the dirty
    /// flag either way it wasn't already idle.
    pub fn tick(&mut self, now: Instant, registry: &Registry, store: &mut dyn KeyValueStore) -> Result<bool, PersistenceError> {
        let Some(dirty_since) = self.dirty_since else { return Ok(false) };
        if now.duration_since(dirty_since) < SAVE_DEBOUNCE {
            return Ok(false);
        }
        for service in registry.services() {
            for (ch, characteristic) in service.characteristics.iter().enumerate() {
                let key = characteristic_key(service.index, ch);
                write_value(store, &key, &characteristic.value)?;
            }
        }
        self.dirty_since = None;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::service::{Service, ServiceKind};
    use crate::model::Characteristic;
    use crate::services::switch::Switch;

    #[test]
    fn key_format_matches_service_times_100_plus_ch() {
        assert_eq!(characteristic_key(3, 2), "302");
        assert_eq!(characteristic_key(0, 0), "0");
    }

    #[test]
    fn debounce_only_flushes_after_quiet_period() {
        let mut registry = Registry::new();
        let mut svc = Service::new(0, "sw", ServiceKind::Switch(Switch::default()));
        svc.characteristics.push(Characteristic::new("on", Value::Bool(true)));
        registry.push_service(svc);

        let mut store = MemoryStore::new();
        let mut mgr = PersistenceManager::new();
        let start = Instant::now();

        mgr.mark_dirty(start);
        assert!(!mgr.tick(start + Duration::from_millis(100), &registry, &mut store).unwrap());
        assert!(mgr.tick(start + Duration::from_millis(600), &registry, &mut store).unwrap());
        assert_eq!(store.get_bool("0").unwrap(), Some(true));
    }

    #[test]
    fn inv_last_flips_the_persisted_boolean() {
        let mut registry = Registry::new();
        let mut svc = Service::new(0, "sw", ServiceKind::Switch(Switch::default()));
        svc.characteristics.push(Characteristic::new("on", Value::Bool(false)));
        registry.push_service(svc);

        let mut store = MemoryStore::new();
        store.set_bool("0", true).unwrap();

        let mut inits = HashMap::new();
        inits.insert((0usize, 0usize), CharacteristicInit::InvLast);
        prime_registry(&mut registry, &store, &inits).unwrap();

        assert_eq!(registry.service(0).characteristics[0].value, Value::Bool(false));
    }

    #[test]
    fn fixed_override_ignores_the_persisted_record() {
        let mut registry = Registry::new();
        let mut svc = Service::new(0, "sw", ServiceKind::Switch(Switch::default()));
        svc.characteristics.push(Characteristic::new("on", Value::Bool(false)));
        registry.push_service(svc);

        let store = MemoryStore::new();
        let mut inits = HashMap::new();
        inits.insert((0usize, 0usize), CharacteristicInit::Fixed(Value::Bool(true)));
        prime_registry(&mut registry, &store, &inits).unwrap();

        assert_eq!(registry.service(0).characteristics[0].value, Value::Bool(true));
    }
}
