use core::fmt;
use std::error::Error;

pub type Result<T> = core::result::Result<T, RuntimeError>;

/// Per-subsystem error kinds, in the teacher's flat `SetupError` idiom
/// (one enum per crate-wide failure surface rather than per-function
/// `thiserror` types).
#[derive(Debug)]
pub enum RuntimeError {
	Config(ConfigError),
	Dispatch(DispatchError),
	Persistence(PersistenceError),
	IrEncode(IrEncodeError),
}

impl From<ConfigError> for RuntimeError {
	fn from(err: ConfigError) -> Self {
		RuntimeError::Config(err)
	}
}

impl From<DispatchError> for RuntimeError {
	fn from(err: DispatchError) -> Self {
		RuntimeError::Dispatch(err)
	}
}

impl From<PersistenceError> for RuntimeError {
	fn from(err: PersistenceError) -> Self {
		RuntimeError::Persistence(err)
	}
}

impl From<IrEncodeError> for RuntimeError {
	fn from(err: IrEncodeError) -> Self {
		RuntimeError::IrEncode(err)
	}
}

impl fmt::Display for RuntimeError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RuntimeError::Config(err) => write!(f, "configuration error: {}", err),
			RuntimeError::Dispatch(err) => write!(f, "dispatch error: {}", err),
			RuntimeError::Persistence(err) => write!(f, "persistence error: {}", err),
			RuntimeError::IrEncode(err) => write!(f, "IR/RF encode error: {}", err),
		}
	}
}

impl Error for RuntimeError {}

/// spec.md §7 "Configuration error at load time".
#[derive(Debug)]
pub enum ConfigError {
	NoAccessories,
	Malformed(String),
	PersistenceRefused,
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::NoAccessories => write!(f, "configuration declares zero accessories"),
			ConfigError::Malformed(detail) => write!(f, "malformed configuration: {}", detail),
			ConfigError::PersistenceRefused => write!(f, "persistence store refused the configuration"),
		}
	}
}

impl Error for ConfigError {}

/// Dispatch-time resolution failures (spec.md §4.1); these are recoverable,
/// logged, and never propagate past a single `dispatch()` call.
#[derive(Debug)]
pub enum DispatchError {
	UnknownService(usize),
	UnknownCharacteristic { service: usize, ch: usize },
	NetworkBusy,
}

impl fmt::Display for DispatchError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DispatchError::UnknownService(index) => write!(f, "no service at index {}", index),
			DispatchError::UnknownCharacteristic { service, ch } => {
				write!(f, "service {} has no characteristic {}", service, ch)
			}
			DispatchError::NetworkBusy => write!(f, "network worker mutex is held"),
		}
	}
}

impl Error for DispatchError {}

/// spec.md §4.10 persistence failures.
#[derive(Debug)]
pub enum PersistenceError {
	KeyNotFound(String),
	TypeMismatch(String),
	Backend(String),
}

impl fmt::Display for PersistenceError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PersistenceError::KeyNotFound(key) => write!(f, "key not found: {}", key),
			PersistenceError::TypeMismatch(key) => write!(f, "stored value type mismatch for key: {}", key),
			PersistenceError::Backend(detail) => write!(f, "persistence backend error: {}", detail),
		}
	}
}

impl Error for PersistenceError {}

/// spec.md §4.9 IR/RF protocol string decoding failures.
#[derive(Debug)]
pub enum IrEncodeError {
	InvalidDigit(char),
	UnsupportedFamily(usize),
	EmptyProtocol,
}

impl fmt::Display for IrEncodeError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			IrEncodeError::InvalidDigit(c) => write!(f, "invalid base-83 digit: {:?}", c),
			IrEncodeError::UnsupportedFamily(len) => write!(f, "protocol string length {} matches no known family", len),
			IrEncodeError::EmptyProtocol => write!(f, "protocol string is empty"),
		}
	}
}

impl Error for IrEncodeError {}
