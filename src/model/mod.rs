pub mod accessory;
pub mod characteristic;
pub mod service;

pub use accessory::{Accessory, Registry};
pub use characteristic::{Characteristic, Value};
pub use service::{Service, ServiceIndex, ServiceKind, ServiceType};
