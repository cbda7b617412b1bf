use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use docpipe_model::Document;
use futures::Stream;
use json::Value;
use uuid::Uuid;

use crate::error::Error;

/// Filters accepted by [`Store::list`] (spec.md §4.2's `list` operation).
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Restrict to documents in this state.
    pub state: Option<String>,
    /// Restrict to documents with no children.
    pub leaf_only: bool,
    /// Conjunction of equality predicates over `metadata` keys.
    pub metadata_filter: HashMap<String, Value>,
    /// Whether to populate `content` on the returned documents.
    pub include_content: bool,
}

/// The fields an [`Store::update`] call is allowed to touch: metadata and
/// appended children. `id`, `parent_id` and `state` are immutable once a
/// document is persisted (spec.md §4.4.4).
#[derive(Debug, Clone, Default)]
pub struct UpdatePatch {
    /// When set, replaces the document's metadata map.
    pub metadata: Option<json::Map<String, Value>>,
    /// Child ids to append (idempotently) to the document's children list.
    pub append_children: Vec<Uuid>,
}

/// A finite, lazily-produced sequence of content chunks, each of bounded
/// size, covering a document's full `content` (spec.md §4.4.3).
pub type ContentStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

/// The abstract CRUD + lineage persistence port (spec.md §4.2).
///
/// One concrete implementation is provided: [`crate::SqliteStore`], backed by
/// Diesel + r2d2 over SQLite, matching `alexandrie`'s own default backend
/// feature. The trait itself carries no backend assumptions so a future
/// implementation (Postgres, MySQL, an in-memory fake for tests) can be
/// dropped in without touching the orchestrator.
#[async_trait]
pub trait Store: Send + Sync {
    /// Ensures the backing schema exists. Idempotent.
    async fn initialize(&self) -> Result<(), Error>;
    /// Releases pooled resources. Idempotent.
    async fn dispose(&self) -> Result<(), Error>;

    /// Persists a new document. Errors with [`Error::Conflict`] if its id
    /// already exists.
    async fn insert(&self, doc: Document) -> Result<Uuid, Error>;
    /// Persists several new documents; all-or-nothing on partial failure.
    async fn insert_many(&self, docs: Vec<Document>) -> Result<Vec<Uuid>, Error>;

    /// Atomically inserts `children` and links them under `parent_id`, in a
    /// single transaction, so a concurrent reader either sees none of them
    /// or all of them fully linked (spec.md §4.2's atomicity guarantee, and
    /// the "hard engineering" call-out of spec.md §1). This is the primitive
    /// `DocStore::next` uses for fan-out; `insert`/`append_children` remain
    /// available standalone for `Add` and re-parenting use cases.
    async fn insert_children(&self, parent_id: Uuid, children: Vec<Document>) -> Result<Vec<Uuid>, Error>;

    /// Fetches a document by id.
    async fn get(&self, id: Uuid, include_content: bool) -> Result<Option<Document>, Error>;
    /// Fetches every document currently in the given state.
    async fn get_by_state(&self, state: &str, include_content: bool) -> Result<Vec<Document>, Error>;
    /// Fetches documents by id in one round trip; missing ids are omitted,
    /// found ones preserve input order.
    async fn get_batch(&self, ids: &[Uuid]) -> Result<Vec<Document>, Error>;
    /// Lists documents matching the given filter.
    async fn list(&self, filter: ListFilter) -> Result<Vec<Document>, Error>;

    /// Applies a partial update (metadata replacement and/or appended
    /// children) and returns the updated document.
    async fn update(&self, id: Uuid, patch: UpdatePatch) -> Result<Document, Error>;
    /// Links an existing child under a parent; a no-op if already linked.
    async fn append_child(&self, parent_id: Uuid, child_id: Uuid) -> Result<(), Error>;
    /// Links several existing children under a parent in one round trip.
    async fn append_children(&self, parent_id: Uuid, child_ids: &[Uuid]) -> Result<(), Error>;

    /// Deletes a document and cascades to every transitive descendant
    /// (invariant I3).
    async fn delete(&self, id: Uuid) -> Result<(), Error>;
    /// Counts documents, optionally restricted to a state.
    async fn count(&self, state: Option<&str>) -> Result<u64, Error>;

    /// Streams a document's content in chunks of approximately `chunk_size`
    /// characters.
    async fn stream_content(&self, id: Uuid, chunk_size: usize) -> Result<ContentStream, Error>;
}
