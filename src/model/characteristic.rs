use serde::{Deserialize, Serialize};

/// Wire format of a characteristic's value.
///
/// Mirrors the closed set in spec.md §3: bool, signed/unsigned integers,
/// float, string, and opaque bytes (used by data-history blocks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Canonical numeric coercion used by set-ch actions (spec.md §4.1 step 6):
    /// bool -> 0/1, int/uint -> int, float -> float.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Bool(b) => if *b { 1.0 } else { 0.0 },
            Value::Int(i) => *i as f64,
            Value::UInt(u) => *u as f64,
            Value::Float(f) => *f,
            Value::Str(_) | Value::Bytes(_) => 0.0,
        }
    }

    /// Render as ASCII for network template substitution (spec.md §6):
    /// "true"/"false" for bool, decimal for integers, %1.7g for floats.
    pub fn to_ascii(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::Float(f) => format_g7(*f),
            Value::Str(s) => s.clone(),
            Value::Bytes(b) => b.iter().map(|byte| format!("{:02x}", byte)).collect(),
        }
    }
}

/// Approximates C's `%1.7g`: up to 7 significant digits, trailing zeros trimmed.
fn format_g7(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let digits = value.abs().log10().floor() as i32;
    let decimals = (6 - digits).max(0) as usize;
    let s = format!("{:.*}", decimals, value);
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// Min/max/step/enum constraints for numeric characteristics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NumericConstraints {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub valid_values: Option<Vec<i64>>,
}

impl NumericConstraints {
    pub fn clamp(&self, value: f64) -> f64 {
        let mut v = value;
        if let Some(min) = self.min {
            v = v.max(min);
        }
        if let Some(max) = self.max {
            v = v.min(max);
        }
        v
    }
}

/// Read/write/notify permission bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
}

impl Permissions {
    pub const READ_ONLY: Permissions = Permissions { read: true, write: false, notify: true };
    pub const READ_WRITE: Permissions = Permissions { read: true, write: true, notify: true };
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::READ_WRITE
    }
}

/// A typed, named, RPC-exposed value owned by exactly one [`super::service::Service`].
///
/// The setter hook is invoked on external writes and may be re-entered by
/// internal code paths (e.g. a service-manager action writing into another
/// service's characteristic). Characteristics are allocated once at config
/// load and never freed (spec.md §3 Lifecycle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Characteristic {
    pub name: &'static str,
    pub value: Value,
    pub constraints: NumericConstraints,
    pub permissions: Permissions,
    /// Whether a notification is pending for this tick (coalesced, spec.md §5).
    #[serde(skip)]
    pub notify_pending: bool,
}

impl Characteristic {
    pub fn new(name: &'static str, value: Value) -> Self {
        Characteristic {
            name,
            value,
            constraints: NumericConstraints::default(),
            permissions: Permissions::default(),
            notify_pending: false,
        }
    }

    pub fn with_constraints(mut self, constraints: NumericConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Set the value, returning `true` if it actually changed.
    ///
    /// Mutations to the same characteristic within a tick collapse into one
    /// notification event (spec.md §5 Ordering guarantees); callers drain
    /// `notify_pending` once per tick.
    pub fn set(&mut self, value: Value) -> bool {
        let changed = self.value != value;
        self.value = value;
        if changed {
            self.notify_pending = true;
        }
        changed
    }

    pub fn take_notify_pending(&mut self) -> bool {
        std::mem::replace(&mut self.notify_pending, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_only_marks_pending_on_change() {
        let mut ch = Characteristic::new("on", Value::Bool(false));
        assert!(!ch.take_notify_pending());
        assert!(ch.set(Value::Bool(true)));
        assert!(ch.take_notify_pending());
        // draining clears the flag
        assert!(!ch.take_notify_pending());

        assert!(!ch.set(Value::Bool(true)));
        assert!(!ch.take_notify_pending());
    }

    #[test]
    fn ascii_rendering_matches_template_rules() {
        assert_eq!(Value::Bool(true).to_ascii(), "true");
        assert_eq!(Value::Bool(false).to_ascii(), "false");
        assert_eq!(Value::Int(-42).to_ascii(), "-42");
    }

    #[test]
    fn numeric_constraints_clamp() {
        let c = NumericConstraints { min: Some(0.0), max: Some(100.0), step: None, valid_values: None };
        assert_eq!(c.clamp(-5.0), 0.0);
        assert_eq!(c.clamp(150.0), 100.0);
        assert_eq!(c.clamp(50.0), 50.0);
    }
}
