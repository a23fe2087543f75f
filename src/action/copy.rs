use serde::{Deserialize, Serialize};

use super::ActionList;

/// Copy indirection entry: rewrites `action` to `new_action` before the
/// rest of dispatch runs (spec.md §4.1 step 1, GLOSSARY "Copy action").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CopyEntry {
    pub action: i32,
    pub new_action: i32,
}

/// Walks the copy list; the first entry whose `action` matches
/// `action_id` wins and stops the walk (spec.md §4.1: "only one
/// substitution per dispatch").
pub fn resolve(actions: &ActionList, action_id: i32) -> i32 {
    for entry in &actions.copy {
        if entry.action == action_id {
            return entry.new_action;
        }
    }
    action_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_entry_wins_and_walk_stops() {
        let mut actions = ActionList::default();
        actions.copy.push(CopyEntry { action: 5, new_action: 10 });
        actions.copy.push(CopyEntry { action: 5, new_action: 99 });
        assert_eq!(resolve(&actions, 5), 10);
    }

    #[test]
    fn unmatched_id_passes_through_unchanged() {
        let actions = ActionList::default();
        assert_eq!(resolve(&actions, 7), 7);
    }

    #[test]
    fn dispatch_after_copy_matches_direct_dispatch_of_target() {
        // spec.md §8 universal invariant: dispatch(s, A) after copy(A->B)
        // behaves exactly as dispatch(s, B) would have.
        let mut actions = ActionList::default();
        actions.copy.push(CopyEntry { action: 1, new_action: 2 });
        assert_eq!(resolve(&actions, 1), resolve(&actions, 2));
    }
}
