use serde::{Deserialize, Serialize};

use crate::model::{Registry, ServiceIndex};

/// One piece of a parsed network-body template (spec.md §9 Design Notes:
/// "parse once into a template `Vec<Segment>`").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Literal(String),
    /// `#IaaCcc` placeholder (spec.md §6): `aa` is a two-digit signed
    /// offset from the dispatching service, `cc` a two-digit
    /// characteristic index.
    CharacteristicRef { service_offset: i32, ch: usize },
}

/// Parses `#IaaCcc` placeholders out of a raw network body (spec.md §6
/// "Network-action placeholders"). Non-matching `#` characters, and any
/// malformed placeholder (non-digit where a digit is required), are kept
/// as literal text.
pub fn parse(content: &str) -> Vec<Segment> {
    let bytes = content.as_bytes();
    let mut segments = Vec::new();
    let mut literal: Vec<u8> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if let Some((segment, consumed)) = try_parse_placeholder(bytes, i) {
            if !literal.is_empty() {
                segments.push(Segment::Literal(String::from_utf8_lossy(&literal).into_owned()));
                literal.clear();
            }
            segments.push(segment);
            i += consumed;
        } else {
            literal.push(bytes[i]);
            i += 1;
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(String::from_utf8_lossy(&literal).into_owned()));
    }
    segments
}

fn try_parse_placeholder(bytes: &[u8], i: usize) -> Option<(Segment, usize)> {
    if i + 7 > bytes.len() {
        return None;
    }
    if bytes[i] != b'#' || bytes[i + 1] != b'I' || bytes[i + 4] != b'C' {
        return None;
    }
    let digits = |a: u8, b: u8| -> Option<i32> {
        if a.is_ascii_digit() && b.is_ascii_digit() {
            Some(((a - b'0') as i32) * 10 + (b - b'0') as i32)
        } else {
            None
        }
    };
    let offset = digits(bytes[i + 2], bytes[i + 3])?;
    let ch = digits(bytes[i + 5], bytes[i + 6])?;
    Some((Segment::CharacteristicRef { service_offset: offset, ch: ch as usize }, 7))
}

/// Renders a parsed template against the live registry, relative to the
/// dispatching service (spec.md §6: replaced "with the ASCII rendering of
/// the referenced characteristic's current value"). A reference to a
/// missing service or characteristic renders as an empty string rather
/// than failing the whole body.
pub fn render(segments: &[Segment], registry: &Registry, current_service: ServiceIndex) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::CharacteristicRef { service_offset, ch } => {
                let target = current_service as i64 + *service_offset as i64;
                if target < 0 {
                    continue;
                }
                if let Some(value) = registry
                    .try_service(target as usize)
                    .and_then(|svc| svc.characteristics.get(*ch))
                {
                    out.push_str(&value.value.to_ascii());
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::characteristic::{Characteristic, Value};
    use crate::model::service::Service;
    use crate::model::ServiceKind;
    use crate::services::switch::Switch;

    #[test]
    fn parses_placeholder_surrounded_by_literal_text() {
        let segments = parse("hello #I05C12 world");
        assert_eq!(
            segments,
            vec![
                Segment::Literal("hello ".to_string()),
                Segment::CharacteristicRef { service_offset: 5, ch: 12 },
                Segment::Literal(" world".to_string()),
            ]
        );
    }

    #[test]
    fn malformed_placeholder_is_kept_literal() {
        let segments = parse("#IxxCyy");
        assert_eq!(segments, vec![Segment::Literal("#IxxCyy".to_string())]);
    }

    #[test]
    fn renders_against_a_service_offset_from_the_dispatcher() {
        let mut registry = Registry::new();
        registry.push_service(Service::new(0, "a", ServiceKind::Switch(Switch::default())));
        let mut target = Service::new(1, "b", ServiceKind::Switch(Switch::default()));
        target.characteristics.push(Characteristic::new("on", Value::Bool(true)));
        registry.push_service(target);

        let segments = parse("state=#I01C00");
        assert_eq!(render(&segments, &registry, 0), "state=true");
    }
}
