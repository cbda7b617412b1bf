use thiserror::Error;

/// Errors raised by the persistence port and its relational implementation.
///
/// Mirrors the per-crate error convention used by `alexandrie-storage` and
/// `alexandrie-index`: one `thiserror` enum per sibling crate, wrapped into
/// the orchestrator's own `Error` via `#[from]`.
#[derive(Error, Debug)]
pub enum Error {
    /// No document with the given id exists.
    #[error("no document found with id '{0}'")]
    NotFound(uuid::Uuid),
    /// An `insert` was attempted with an id that already exists.
    #[error("a document with id '{0}' already exists")]
    Conflict(uuid::Uuid),
    /// The named document has no content to stream.
    #[error("document '{0}' has no content")]
    NoContent(uuid::Uuid),
    /// A malformed UUID was read back from storage.
    #[error("invalid id stored: {0}")]
    InvalidId(#[from] uuid::Error),
    /// Failure (de)serializing the `cmetadata` JSON column.
    #[error("metadata (de)serialization error: {0}")]
    JSONError(#[from] json::Error),
    /// A Diesel query failed.
    #[error("SQL error: {0}")]
    SQLError(#[from] diesel::result::Error),
    /// The connection pool couldn't hand out a connection.
    #[error("connection pool error: {0}")]
    PoolError(#[from] diesel::r2d2::PoolError),
    /// Diesel's embedded migrations failed to run.
    #[error("migration error: {0}")]
    MigrationError(#[from] diesel_migrations::RunMigrationsError),
}
