use std::sync::atomic::{AtomicUsize, Ordering};

use async_std::sync::RwLock;
use docpipe_model::{Document, DocumentType, ProcessingFailure};
use docpipe_storage::{ContentStream, ListFilter, SqliteStore, Store, UpdatePatch};
use uuid::Uuid;

use crate::config::{DatabaseConfig, PipelineConfig};
use crate::error::Error;
use crate::gate::ConcurrencyGate;

/// The public façade (spec.md §2, component 5; §4.4; §6).
///
/// Owns the persistence port, the in-memory state machine, and the
/// concurrency gate, and exposes the operations listed in spec.md §4.4 and
/// §6. Mirrors the role `alexandrie_index::Indexer` plays for
/// `alexandrie_storage::Store` in the teacher repo: a stateful façade wired
/// atop a swappable backend trait object, here `Box<dyn Store>`.
pub struct DocStore {
    store: Box<dyn Store>,
    document_type: RwLock<Option<DocumentType>>,
    gate: ConcurrencyGate,
    error_state: String,
    /// Count of `next`/`finish` calls currently in flight, so
    /// `set_document_type` can refuse to run concurrently with them
    /// (spec.md §6, "forbidden while next/finish in progress").
    in_flight: AtomicUsize,
}

impl DocStore {
    /// Builds a `DocStore` over the reference SQLite-backed persistence
    /// implementation (spec.md §4.4's construction parameter table).
    pub async fn new(database: &DatabaseConfig, pipeline: &PipelineConfig) -> Result<DocStore, Error> {
        let pool_config = docpipe_storage::PoolConfig::from(database);
        let store = SqliteStore::new(&database.url, &pool_config).map_err(docpipe_storage::Error::from)?;
        Ok(DocStore {
            store: Box::new(store),
            document_type: RwLock::new(None),
            gate: ConcurrencyGate::new(pipeline.max_concurrency),
            error_state: pipeline.error_state.clone(),
            in_flight: AtomicUsize::new(0),
        })
    }

    /// Builds a `DocStore` over an arbitrary persistence backend — used by
    /// tests and by callers supplying a non-default `Store` implementation.
    pub fn with_store(store: Box<dyn Store>, document_type: Option<DocumentType>, error_state: impl Into<String>, max_concurrency: usize) -> DocStore {
        DocStore {
            store,
            document_type: RwLock::new(document_type),
            gate: ConcurrencyGate::new(max_concurrency),
            error_state: error_state.into(),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Idempotent; creates schema (spec.md §6).
    pub async fn initialize(&self) -> Result<(), Error> {
        self.store.initialize().await.map_err(Error::from)
    }

    /// Idempotent; releases pooled resources (spec.md §6).
    pub async fn dispose(&self) -> Result<(), Error> {
        self.store.dispose().await.map_err(Error::from)
    }

    /// Replaces the state machine, invalidating its caches. Forbidden while
    /// `next`/`finish` is in progress (spec.md §6).
    pub async fn set_document_type(&self, document_type: DocumentType) -> Result<(), Error> {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return Err(Error::Busy);
        }
        *self.document_type.write().await = Some(document_type);
        Ok(())
    }

    /// The set of states with no outgoing transition in the current document type.
    pub async fn final_state_names(&self) -> Result<std::collections::HashSet<String>, Error> {
        let guard = self.document_type.read().await;
        let dt = guard.as_ref().ok_or(Error::NoDocumentType)?;
        Ok(dt.final_state_names())
    }

    /// Persists root documents (spec.md §4.4.4). Assigns ids to documents
    /// lacking one (`Document::new` already does, so this mainly validates
    /// that each document's state is declared).
    pub async fn add(&self, docs: Vec<Document>) -> Result<Vec<Document>, Error> {
        {
            let guard = self.document_type.read().await;
            if let Some(dt) = guard.as_ref() {
                for doc in &docs {
                    if !dt.has_state(&doc.state) {
                        return Err(Error::UnknownState(doc.state.clone()));
                    }
                }
            }
        }
        self.store.insert_many(docs.clone()).await.map_err(Error::from)?;
        Ok(docs)
    }

    /// Fetches a document by id (spec.md §4.4.4 `get(id)` mode).
    pub async fn get(&self, id: Uuid, include_content: bool) -> Result<Option<Document>, Error> {
        self.store.get(id, include_content).await.map_err(Error::from)
    }

    /// Fetches every document in the given state (spec.md §4.4.4 `get(state)` mode).
    pub async fn get_by_state(&self, state: &str, include_content: bool) -> Result<Vec<Document>, Error> {
        self.store.get_by_state(state, include_content).await.map_err(Error::from)
    }

    /// Fetches documents by id in one round trip (spec.md §4.4.4 `get_batch`).
    pub async fn get_batch(&self, ids: &[Uuid]) -> Result<Vec<Document>, Error> {
        self.store.get_batch(ids).await.map_err(Error::from)
    }

    /// Lists documents matching the given filter (spec.md §4.2, §4.4.4 `list`).
    pub async fn list(&self, filter: ListFilter) -> Result<Vec<Document>, Error> {
        self.store.list(filter).await.map_err(Error::from)
    }

    /// Cascading delete (spec.md §4.4.4 `delete`, invariant I3).
    pub async fn delete(&self, id: Uuid) -> Result<(), Error> {
        self.store.delete(id).await.map_err(Error::from)
    }

    /// Partial update of metadata and/or appended children (spec.md §4.4.4 `update`).
    pub async fn update(&self, id: Uuid, patch: UpdatePatch) -> Result<Document, Error> {
        self.store.update(id, patch).await.map_err(Error::from)
    }

    /// Counts documents, optionally restricted to a state (spec.md §4.4.4 `count`).
    pub async fn count(&self, state: Option<&str>) -> Result<u64, Error> {
        self.store.count(state).await.map_err(Error::from)
    }

    /// Streams a document's content in chunks (spec.md §4.4.3).
    pub async fn stream_content(&self, id: Uuid, chunk_size: usize) -> Result<ContentStream, Error> {
        self.store.stream_content(id, chunk_size).await.map_err(Error::from)
    }

    /// Advances one or more documents by exactly one hop each (spec.md §4.4.1).
    pub async fn next(&self, docs: Vec<Document>) -> Result<Vec<Document>, Error> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = self.next_inner(docs).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn next_inner(&self, docs: Vec<Document>) -> Result<Vec<Document>, Error> {
        let guard = self.document_type.read().await;
        let dt = guard.as_ref().ok_or(Error::NoDocumentType)?;

        // Collect the (parent, transition) pairs to run concurrently, bounded
        // by the gate; each produces the children it persisted and links.
        let mut hops = Vec::new();
        for doc in &docs {
            for transition in dt.transitions_from(&doc.state) {
                hops.push((doc.clone(), transition));
            }
        }
        drop(guard);

        let mut tasks = Vec::with_capacity(hops.len());
        for (doc, transition) in hops {
            tasks.push(self.run_hop(doc, transition));
        }
        let results = futures::future::join_all(tasks).await;

        let mut produced = Vec::new();
        for result in results {
            produced.extend(result?);
        }
        Ok(produced)
    }

    /// Runs a single transition on a single document (spec.md §4.4.1, step 2):
    /// acquire a permit, invoke the processing function, persist and link
    /// whatever it produced (or a synthesized error document on failure),
    /// release the permit.
    async fn run_hop(&self, doc: Document, transition: docpipe_model::Transition) -> Result<Vec<Document>, Error> {
        let permit = self.gate.acquire().await;
        let outcome = (transition.process_func)(doc.clone()).await;
        drop(permit);

        match outcome {
            Ok(children) => {
                let mut prepared = Vec::with_capacity(children.len());
                for mut child in children {
                    if child.state.is_empty() {
                        child.state = transition.to_state.name().to_string();
                    }
                    child.parent_id = Some(doc.id);
                    prepared.push(child);
                }
                let persisted = self
                    .store
                    .insert_children(doc.id, prepared)
                    .await
                    .map_err(Error::from)?;
                self.get_batch(&persisted).await
            }
            Err(failure) => {
                let error_doc = self.synthesize_error_document(&doc, &transition, &failure);
                let persisted = self
                    .store
                    .insert_children(doc.id, vec![error_doc])
                    .await
                    .map_err(Error::from)?;
                self.get_batch(&persisted).await
            }
        }
    }

    fn synthesize_error_document(&self, doc: &Document, transition: &docpipe_model::Transition, failure: &ProcessingFailure) -> Document {
        let mut metadata = doc.metadata.clone();
        metadata.insert("error".to_string(), json::Value::String(failure.message.clone()));
        metadata.insert("error_type".to_string(), json::Value::String(failure.kind.clone()));
        metadata.insert(
            "failed_transition".to_string(),
            json::Value::String(format!("{}→{}", transition.from_state, transition.to_state)),
        );
        Document::new(self.error_state.clone())
            .with_content(failure.message.clone())
            .with_metadata(metadata)
    }

    /// Drives each input document to the transitive closure of its
    /// descendants in final states (spec.md §4.4.2).
    pub async fn finish(&self, docs: Vec<Document>) -> Result<Vec<Document>, Error> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = self.finish_inner(docs).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn finish_inner(&self, docs: Vec<Document>) -> Result<Vec<Document>, Error> {
        let mut worklist = docs;
        let mut collected = Vec::new();

        while !worklist.is_empty() {
            let is_final = {
                let guard = self.document_type.read().await;
                let dt = guard.as_ref().ok_or(Error::NoDocumentType)?;
                dt.final_state_names()
            };

            let mut active = Vec::new();
            for doc in worklist {
                if is_final.contains(&doc.state) {
                    collected.push(doc);
                } else {
                    active.push(doc);
                }
            }

            worklist = self.next_inner(active).await?;
        }

        Ok(collected)
    }
}
