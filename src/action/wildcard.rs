use serde::{Deserialize, Serialize};

/// A threshold-indexed action, fired when an observed value crosses it
/// (spec.md §4.1 "Wildcard dispatch", GLOSSARY "Wildcard action").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WildcardAction {
    /// Which observation channel this entry applies to (e.g. 0=temp,
    /// 1=hum, 2=target-heat, 3=target-cool for a thermostat).
    pub index: usize,
    pub threshold: f64,
    pub target_action: i32,
    /// Fire every time the threshold is selected, even if it's the same
    /// one that fired last time.
    pub repeat: bool,
}

/// `fire_wildcard(service, index, value)`: walks the wildcard list; among
/// entries whose `index` matches, selects the one with the greatest
/// threshold `<= value` (ties broken by last in list). If
/// `last_wildcard[index]` differs from that threshold, OR the entry has
/// `repeat=true`, updates `last_wildcard[index]` and returns the entry's
/// `target_action` for the caller to dispatch.
pub fn fire_wildcard(
    actions: &[WildcardAction],
    last_wildcard: &mut Vec<Option<f64>>,
    index: usize,
    value: f64,
) -> Option<i32> {
    let mut best: Option<&WildcardAction> = None;
    for entry in actions {
        if entry.index != index || entry.threshold > value {
            continue;
        }
        best = match best {
            Some(b) if entry.threshold < b.threshold => Some(b),
            _ => Some(entry),
        };
    }
    let entry = best?;

    if last_wildcard.len() <= index {
        last_wildcard.resize(index + 1, None);
    }
    let unchanged = last_wildcard[index] == Some(entry.threshold);
    if unchanged && !entry.repeat {
        return None;
    }
    last_wildcard[index] = Some(entry.threshold);
    Some(entry.target_action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<WildcardAction> {
        vec![
            WildcardAction { index: 0, threshold: 10.0, target_action: 1, repeat: false },
            WildcardAction { index: 0, threshold: 20.0, target_action: 2, repeat: false },
            WildcardAction { index: 0, threshold: 20.0, target_action: 3, repeat: false },
            WildcardAction { index: 1, threshold: 0.0, target_action: 9, repeat: false },
        ]
    }

    #[test]
    fn selects_greatest_threshold_leq_value() {
        let mut last = Vec::new();
        assert_eq!(fire_wildcard(&entries(), &mut last, 0, 15.0), Some(1));
    }

    #[test]
    fn ties_broken_by_last_in_list() {
        let mut last = Vec::new();
        assert_eq!(fire_wildcard(&entries(), &mut last, 0, 25.0), Some(3));
    }

    #[test]
    fn below_every_threshold_fires_nothing() {
        let mut last = Vec::new();
        assert_eq!(fire_wildcard(&entries(), &mut last, 0, 5.0), None);
    }

    #[test]
    fn repeat_false_only_fires_on_change() {
        let mut last = Vec::new();
        assert_eq!(fire_wildcard(&entries(), &mut last, 0, 15.0), Some(1));
        assert_eq!(fire_wildcard(&entries(), &mut last, 0, 15.0), None);
        assert_eq!(fire_wildcard(&entries(), &mut last, 0, 25.0), Some(3));
    }

    #[test]
    fn repeat_true_fires_every_time() {
        let actions = vec![WildcardAction { index: 0, threshold: 10.0, target_action: 1, repeat: true }];
        let mut last = Vec::new();
        assert_eq!(fire_wildcard(&actions, &mut last, 0, 15.0), Some(1));
        assert_eq!(fire_wildcard(&actions, &mut last, 0, 15.0), Some(1));
    }
}
