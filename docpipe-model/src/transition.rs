use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::document::Document;
use crate::state::State;

/// Carries what a processing function raised, captured instead of propagated
/// (spec.md §4.4.1 step 2f, §7 "Processing errors").
///
/// `kind` corresponds to the error's "exception type" and `message` to its
/// display text; both are copied verbatim into the synthesized error
/// document's metadata as `error_type` and `error`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ProcessingFailure {
    /// A short, stable label for the kind of failure (e.g. a Rust error
    /// type's name, or a caller-chosen tag).
    pub kind: String,
    /// The human-readable failure description.
    pub message: String,
}

impl ProcessingFailure {
    /// Builds a failure from an explicit kind and message.
    pub fn new<K: Into<String>, M: Into<String>>(kind: K, message: M) -> ProcessingFailure {
        ProcessingFailure {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl ProcessingFailure {
    /// Captures a standard error's type name as `kind` and its `Display` as `message`.
    pub fn from_error<E: std::error::Error>(err: &E) -> ProcessingFailure {
        ProcessingFailure::new(std::any::type_name::<E>(), err.to_string())
    }
}

/// One document in, one-or-more documents out.
///
/// Modeled as a boxed, cloneable async closure rather than a trait object
/// per transition, mirroring how `alexandrie-index`'s `Indexer::alter_record`
/// takes a plain `FnOnce` for its mutation callback, generalized here to an
/// async, multi-output function carried by reference through the in-memory
/// transition table (spec.md §9, "user-supplied callable as a first-class
/// field").
pub type ProcessFn =
    Arc<dyn Fn(Document) -> BoxFuture<'static, Result<Vec<Document>, ProcessingFailure>> + Send + Sync>;

/// An edge of the state machine, binding a source and destination state to
/// the processing function that advances documents along it.
#[derive(Clone)]
pub struct Transition {
    /// The originating state.
    pub from_state: State,
    /// The destination state.
    pub to_state: State,
    /// The user-supplied processing function.
    pub process_func: ProcessFn,
}

impl Transition {
    /// Builds a transition whose process function returns exactly one document.
    pub fn new<F, Fut>(from_state: impl Into<State>, to_state: impl Into<State>, process_func: F) -> Transition
    where
        F: Fn(Document) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Document, ProcessingFailure>> + Send + 'static,
    {
        let func = Arc::new(process_func);
        Transition {
            from_state: from_state.into(),
            to_state: to_state.into(),
            process_func: Arc::new(move |doc| {
                let func = Arc::clone(&func);
                Box::pin(async move { func(doc).await.map(|d| vec![d]) })
            }),
        }
    }

    /// Builds a transition whose process function may fan out into several documents.
    pub fn fan_out<F, Fut>(from_state: impl Into<State>, to_state: impl Into<State>, process_func: F) -> Transition
    where
        F: Fn(Document) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Vec<Document>, ProcessingFailure>> + Send + 'static,
    {
        let func = Arc::new(process_func);
        Transition {
            from_state: from_state.into(),
            to_state: to_state.into(),
            process_func: Arc::new(move |doc| {
                let func = Arc::clone(&func);
                Box::pin(func(doc))
            }),
        }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("from_state", &self.from_state)
            .field("to_state", &self.to_state)
            .field("process_func", &"<fn>")
            .finish()
    }
}
