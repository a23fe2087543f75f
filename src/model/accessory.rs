use serde::{Deserialize, Serialize};

use super::service::{Service, ServiceIndex};

/// A grouping of services exposed as one RPC unit (spec.md §3 "Accessory").
///
/// The first accessory is the bridge when the exposed service count exceeds
/// [`BRIDGE_THRESHOLD`]. Exactly one accessory carries the hidden "setup
/// options" service; one service per accessory carries device-info
/// characteristics.
#[derive(Serialize, Deserialize)]
pub struct Accessory {
    pub name: String,
    pub services: Vec<ServiceIndex>,
    pub is_bridge: bool,
    pub has_setup_options: bool,
}

/// Above this many exposed services, the first accessory becomes a bridge
/// rather than exposing every service directly (spec.md §3).
pub const BRIDGE_THRESHOLD: usize = 1;

/// Owns every [`Service`] and [`Accessory`] for the process lifetime.
/// Allocated once during config load and never freed (spec.md §3
/// Lifecycle). Lookup is by service index or by contained characteristic.
#[derive(Serialize, Deserialize, Default)]
pub struct Registry {
    services: Vec<Service>,
    accessories: Vec<Accessory>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn push_service(&mut self, service: Service) -> ServiceIndex {
        let index = self.services.len();
        self.services.push(service);
        index
    }

    pub fn push_accessory(&mut self, accessory: Accessory) {
        self.accessories.push(accessory);
    }

    pub fn service(&self, index: ServiceIndex) -> &Service {
        &self.services[index]
    }

    pub fn service_mut(&mut self, index: ServiceIndex) -> &mut Service {
        &mut self.services[index]
    }

    pub fn try_service(&self, index: ServiceIndex) -> Option<&Service> {
        self.services.get(index)
    }

    pub fn try_service_mut(&mut self, index: ServiceIndex) -> Option<&mut Service> {
        self.services.get_mut(index)
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut [Service] {
        &mut self.services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn accessories(&self) -> &[Accessory] {
        &self.accessories
    }

    /// Two mutable borrows into the arena at once, used by cross-service
    /// propagation (set-ch, service-manager). Panics if `a == b`, matching
    /// the precondition every call site already guarantees by construction.
    pub fn service_pair_mut(&mut self, a: ServiceIndex, b: ServiceIndex) -> (&mut Service, &mut Service) {
        assert_ne!(a, b, "service_pair_mut requires distinct indices");
        if a < b {
            let (left, right) = self.services.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.services.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::service::ServiceKind;
    use crate::services::switch::Switch;

    #[test]
    fn indices_are_dense_and_assigned_in_order() {
        let mut registry = Registry::new();
        let a = registry.push_service(Service::new(0, "a", ServiceKind::Switch(Switch::default())));
        let b = registry.push_service(Service::new(0, "b", ServiceKind::Switch(Switch::default())));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn service_pair_mut_returns_both_ends() {
        let mut registry = Registry::new();
        registry.push_service(Service::new(0, "a", ServiceKind::Switch(Switch::default())));
        registry.push_service(Service::new(1, "b", ServiceKind::Switch(Switch::default())));
        let (a, b) = registry.service_pair_mut(0, 1);
        a.name.push('!');
        b.name.push('?');
        assert_eq!(registry.service(0).name, "a!");
        assert_eq!(registry.service(1).name, "b?");
    }
}
