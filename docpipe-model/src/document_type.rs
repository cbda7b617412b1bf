use std::collections::HashSet;

use crate::cache::TransitionCache;
use crate::error::ConfigError;
use crate::state::{State, StateLike};
use crate::transition::Transition;

/// A user-declared document state machine: its vertices and the transitions
/// that move documents between them (spec.md §3, `DocumentType`).
///
/// Construction validates that every transition's `from_state`/`to_state` is
/// among `states`; this is the "configuration error" class of spec.md §7.
pub struct DocumentType {
    states: Vec<State>,
    transitions: Vec<Transition>,
    cache: TransitionCache,
}

impl std::fmt::Debug for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentType")
            .field("states", &self.states)
            .field("transitions", &self.transitions)
            .finish()
    }
}

impl DocumentType {
    /// Builds a document type, validating that every transition references
    /// only declared states.
    pub fn new(states: Vec<State>, transitions: Vec<Transition>) -> Result<DocumentType, ConfigError> {
        Self::validate(&states, &transitions)?;
        Ok(DocumentType {
            states,
            transitions,
            cache: TransitionCache::new(),
        })
    }

    fn validate(states: &[State], transitions: &[Transition]) -> Result<(), ConfigError> {
        for transition in transitions {
            if !states.contains(&transition.from_state) {
                return Err(ConfigError::UnknownFromState(
                    transition.from_state.name().to_string(),
                ));
            }
            if !states.contains(&transition.to_state) {
                return Err(ConfigError::UnknownToState(
                    transition.to_state.name().to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The declared states.
    pub fn states(&self) -> &[State] {
        self.states.as_slice()
    }

    /// `true` iff `name` is a declared state of this document type.
    pub fn has_state(&self, name: &str) -> bool {
        self.states.iter().any(|s| s.name() == name)
    }

    /// Outgoing transitions for the given state (a [`State`] value or a bare
    /// name string; possibly empty).
    pub fn transitions_from(&self, state: impl StateLike) -> Vec<Transition> {
        self.cache.transitions_from(&self.transitions, state)
    }

    /// Names of states with no outgoing transition.
    pub fn final_state_names(&self) -> HashSet<String> {
        self.cache.final_state_names(&self.states, &self.transitions)
    }

    /// `true` iff the named state has no outgoing transitions.
    pub fn is_final(&self, state: impl StateLike) -> bool {
        self.transitions_from(state).is_empty()
    }

    /// Replaces the transition list, revalidates, and invalidates the caches.
    ///
    /// Forbidden while `next`/`finish` are in progress per spec.md §6 —
    /// callers reach this only through `DocStore::set_document_type`, which
    /// enforces that.
    pub fn set_transitions(&mut self, transitions: Vec<Transition>) -> Result<(), ConfigError> {
        Self::validate(&self.states, &transitions)?;
        self.transitions = transitions;
        self.cache = TransitionCache::new();
        Ok(())
    }
}
