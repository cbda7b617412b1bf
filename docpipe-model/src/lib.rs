//! The document and state-machine model for `docpipe`.
//!
//! This crate is pure and side-effect-free: [`Document`], [`State`],
//! [`Transition`] and [`DocumentType`] carry no I/O, pools, or handles. The
//! orchestrator crate (`docpipe`) and the persistence crate
//! (`docpipe-storage`) both depend on it.

mod cache;
mod document;
mod document_type;
mod error;
mod state;
mod transition;

pub use cache::TransitionCache;
pub use document::{Document, DEFAULT_MEDIA_TYPE};
pub use document_type::DocumentType;
pub use error::ConfigError;
pub use state::{State, StateLike};
pub use transition::{ProcessFn, ProcessingFailure, Transition};
