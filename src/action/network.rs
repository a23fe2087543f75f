use serde::{Deserialize, Serialize};

use crate::model::{Registry, ServiceIndex};
use crate::net::NetworkRequest;

use super::template::{self, Segment};

/// Network action entry (spec.md §6 "Network"): an HTTP(S)-style call or
/// a raw TCP/UDP send, with a body that may embed `#IaaCc` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NetworkEntry {
    Http { method: String, url: String, body_template: String },
    RawTcp { host: String, port: u16, body_template: String },
    RawUdp { host: String, port: u16, body_template: String },
}

/// A network request with its body already rendered, ready for a worker
/// to hand to [`crate::net::NetworkClient::execute`].
#[derive(Debug, Clone)]
pub struct NetworkRequestTask {
    pub request: NetworkRequest,
}

fn render(template_src: &str, registry: &Registry, source: ServiceIndex) -> String {
    let segments: Vec<Segment> = template::parse(template_src);
    template::render(&segments, registry, source)
}

/// Renders the entry's placeholders against the dispatching service
/// (spec.md §6: "replaced, at dispatch time, with the ASCII rendering of
/// the referenced characteristic's current value").
pub fn build_task(registry: &Registry, source: ServiceIndex, entry: &NetworkEntry) -> NetworkRequestTask {
    let request = match entry {
        NetworkEntry::Http { method, url, body_template } => NetworkRequest::Http {
            method: method.clone(),
            url: url.clone(),
            body: render(body_template, registry, source),
        },
        NetworkEntry::RawTcp { host, port, body_template } => NetworkRequest::RawTcp {
            host: host.clone(),
            port: *port,
            body: render(body_template, registry, source).into_bytes(),
        },
        NetworkEntry::RawUdp { host, port, body_template } => NetworkRequest::RawUdp {
            host: host.clone(),
            port: *port,
            body: render(body_template, registry, source).into_bytes(),
        },
    };
    NetworkRequestTask { request }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::characteristic::{Characteristic, Value};
    use crate::model::service::Service;
    use crate::model::ServiceKind;
    use crate::services::switch::Switch;

    #[test]
    fn renders_placeholder_into_the_http_body_at_build_time() {
        let mut registry = Registry::new();
        let mut source = Service::new(0, "sw", ServiceKind::Switch(Switch::default()));
        source.characteristics.push(Characteristic::new("on", Value::Bool(true)));
        registry.push_service(source);

        let entry = NetworkEntry::Http {
            method: "POST".to_string(),
            url: "http://example/hook".to_string(),
            body_template: "on=#I00C00".to_string(),
        };
        let task = build_task(&registry, 0, &entry);
        match task.request {
            NetworkRequest::Http { body, .. } => assert_eq!(body, "on=true"),
            _ => panic!("expected Http request"),
        }
    }
}
