use docpipe_model::ConfigError as ModelConfigError;
use docpipe_storage::Error as StorageError;
use thiserror::Error;

/// The error type for the orchestrator.
///
/// Follows `crates/alexandrie/src/error.rs`'s convention: a `thiserror` enum
/// wrapping each sibling crate's own error type behind `#[from]`, plus a
/// handful of variants for the orchestrator's own configuration/operational
/// errors (spec.md §7).
#[derive(Error, Debug)]
pub enum Error {
    /// The document-type/state-machine construction or mutation failed.
    #[error("document type error: {0}")]
    ConfigError(#[from] ModelConfigError),
    /// A persistence-layer fault (spec.md §7, "persistence errors"), including
    /// the case where `get`/`update`/`delete`/`stream_content` referenced a
    /// document that doesn't exist (`StorageError::NotFound`).
    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),
    /// `Add` was called with a state not declared in the configured document type.
    #[error("cannot add a document in undeclared state '{0}'")]
    UnknownState(String),
    /// `SetDocumentType` was called while `next`/`finish` was in progress.
    #[error("cannot replace the document type while operations are in progress")]
    Busy,
    /// No document type has been configured yet.
    #[error("no document type configured")]
    NoDocumentType,
}
