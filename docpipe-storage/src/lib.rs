//! The persistence port and reference relational implementation for `docpipe`.
//!
//! [`Store`] is the abstract CRUD + lineage port (spec.md §4.2); [`SqliteStore`]
//! is the one concrete implementation, backed by Diesel + r2d2 over SQLite —
//! `alexandrie`'s own default backend choice.

#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;

pub mod error;
mod models;
mod port;
mod repo;
mod schema;
mod sqlite_store;

pub use error::Error;
pub use port::{ContentStream, ListFilter, Store, UpdatePatch};
pub use repo::PoolConfig;
pub use sqlite_store::SqliteStore;
