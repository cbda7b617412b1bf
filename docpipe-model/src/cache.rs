use std::collections::{HashMap, HashSet};

use once_cell::sync::OnceCell;

use crate::state::StateLike;
use crate::transition::Transition;

/// Memoized index from state name to outgoing transitions, plus the set of
/// final state names, derived from a [`crate::DocumentType`]'s transition
/// list (spec.md §4.1).
///
/// Built on first access; invalidated (by simply replacing the `TransitionCache`
/// in its owner) whenever the owning `DocumentType`'s transitions are replaced.
#[derive(Default)]
pub struct TransitionCache {
    by_state: OnceCell<HashMap<String, Vec<Transition>>>,
    final_states: OnceCell<HashSet<String>>,
}

impl TransitionCache {
    /// An empty, not-yet-populated cache.
    pub fn new() -> TransitionCache {
        TransitionCache {
            by_state: OnceCell::new(),
            final_states: OnceCell::new(),
        }
    }

    fn by_state(&self, transitions: &[Transition]) -> &HashMap<String, Vec<Transition>> {
        self.by_state.get_or_init(|| {
            let mut map: HashMap<String, Vec<Transition>> = HashMap::new();
            for transition in transitions {
                map.entry(transition.from_state.name().to_string())
                    .or_default()
                    .push(transition.clone());
            }
            map
        })
    }

    /// Outgoing transitions for the given state (accepts either a [`crate::State`]
    /// value or a bare name string); empty if none.
    pub fn transitions_from(&self, transitions: &[Transition], state: impl StateLike) -> Vec<Transition> {
        self.by_state(transitions)
            .get(state.state_name())
            .cloned()
            .unwrap_or_default()
    }

    /// Names of states with no outgoing transition.
    pub fn final_state_names(&self, states: &[crate::state::State], transitions: &[Transition]) -> HashSet<String> {
        self.final_states
            .get_or_init(|| {
                let by_state = self.by_state(transitions);
                states
                    .iter()
                    .map(|s| s.name().to_string())
                    .filter(|name| !by_state.contains_key(name.as_str()))
                    .collect()
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::transition::ProcessingFailure;

    fn noop_transition(from: &str, to: &str) -> Transition {
        Transition::new(from, to, |doc: Document| async move { Ok::<_, ProcessingFailure>(doc) })
    }

    #[test]
    fn transitions_from_is_empty_for_unknown_state() {
        let cache = TransitionCache::new();
        let transitions = vec![noop_transition("a", "b")];
        assert!(cache.transitions_from(&transitions, "z").is_empty());
        assert_eq!(cache.transitions_from(&transitions, "a").len(), 1);
    }

    #[test]
    fn final_state_names_excludes_states_with_outgoing_transitions() {
        let cache = TransitionCache::new();
        let states = vec!["a".into(), "b".into(), "c".into()];
        let transitions = vec![noop_transition("a", "b"), noop_transition("b", "c")];
        let finals = cache.final_state_names(&states, &transitions);
        assert_eq!(finals, ["c".to_string()].iter().cloned().collect());
    }
}
