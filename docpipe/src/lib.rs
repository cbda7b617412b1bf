//! A persistent, concurrent document-processing pipeline engine.
//!
//! Built atop [`docpipe_model`] (the state-machine value types) and
//! [`docpipe_storage`] (the persistence port and its SQLite implementation);
//! see [`DocStore`] for the public façade.

pub mod config;
mod error;
mod gate;
pub mod logs;
mod orchestrator;

pub use config::{Config, DatabaseConfig, GeneralConfig, PipelineConfig};
pub use docpipe_model::{Document, DocumentType, ProcessFn, ProcessingFailure, State, StateLike, Transition};
pub use docpipe_storage::{ListFilter, UpdatePatch};
pub use error::Error;
pub use gate::{ConcurrencyGate, ConcurrencyPermit};
pub use orchestrator::DocStore;
