use thiserror::Error;

/// Errors raised while building or mutating the in-process state-machine model.
///
/// These are configuration errors: they are raised synchronously from the
/// call that caused them (construction of a [`crate::DocumentType`], or an
/// attempt to add a document in an unknown state), never from a background
/// task.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A transition references a `from_state` that isn't declared in the
    /// document type's `states` list.
    #[error("transition references unknown state '{0}' as its source")]
    UnknownFromState(String),
    /// A transition references a `to_state` that isn't declared in the
    /// document type's `states` list.
    #[error("transition references unknown state '{0}' as its destination")]
    UnknownToState(String),
}
