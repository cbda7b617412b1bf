use std::sync::Arc;

use async_std::sync::Mutex;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use docpipe_model::Document;
use futures::stream;
use uuid::Uuid;

use crate::error::Error;
use crate::models::DocumentRow;
use crate::port::{ContentStream, ListFilter, Store, UpdatePatch};
use crate::repo::{PoolConfig, Repo};
use crate::schema::documents;

embed_migrations!("migrations");

/// The reference relational implementation of [`Store`], backed by Diesel +
/// r2d2 over SQLite — `alexandrie`'s own default backend choice
/// (`default = ["frontend", "sqlite"]`).
#[derive(Clone)]
pub struct SqliteStore {
    repo: Repo,
    /// SQLite allows only one writer at a time; rather than let concurrent
    /// hops fight over `SQLITE_BUSY` across pooled connections, writes are
    /// serialized in-process. Reads still run concurrently over the pool.
    write_lock: Arc<Mutex<()>>,
}

impl SqliteStore {
    /// Opens (but does not yet initialize) a store at the given connection string.
    pub fn new(connection_string: &str, pool_config: &PoolConfig) -> Result<SqliteStore, Error> {
        Ok(SqliteStore {
            repo: Repo::new(connection_string, pool_config)?,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn children_of(conn: &SqliteConnection, parent: &str) -> Result<Vec<Uuid>, Error> {
        let ids: Vec<String> = documents::table
            .filter(documents::parent_id.eq(parent))
            .order(documents::seq.asc())
            .select(documents::id)
            .load(conn)?;
        ids.iter()
            .map(|id| Uuid::parse_str(id).map_err(Error::from))
            .collect()
    }

    fn row_to_document(conn: &SqliteConnection, row: DocumentRow, include_content: bool) -> Result<Document, Error> {
        let children = Self::children_of(conn, row.id.as_str())?;
        row.into_document(children, include_content)
    }

    fn fetch_one(conn: &SqliteConnection, id: Uuid, include_content: bool) -> Result<Option<Document>, Error> {
        let row = documents::table
            .find(id.to_string())
            .first::<DocumentRow>(conn)
            .optional()?;
        row.map(|row| Self::row_to_document(conn, row, include_content))
            .transpose()
    }

    fn insert_row(conn: &SqliteConnection, repo: &Repo, doc: &Document) -> Result<(), Error> {
        let exists: i64 = documents::table
            .filter(documents::id.eq(doc.id.to_string()))
            .count()
            .get_result(conn)?;
        if exists > 0 {
            return Err(Error::Conflict(doc.id));
        }
        let row = DocumentRow::from_document(doc, repo.next_seq())?;
        diesel::insert_into(documents::table).values(&row).execute(conn)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn initialize(&self) -> Result<(), Error> {
        self.repo
            .run(|conn| embedded_migrations::run(conn).map_err(Error::from))
            .await?;
        let high_water_mark: Option<i64> = self
            .repo
            .run(|conn| {
                documents::table
                    .select(diesel::dsl::max(documents::seq))
                    .first(conn)
                    .map_err(Error::from)
            })
            .await?;
        self.repo.seed_next_seq(high_water_mark.unwrap_or(-1));
        Ok(())
    }

    async fn dispose(&self) -> Result<(), Error> {
        self.repo.dispose().await;
        Ok(())
    }

    async fn insert(&self, doc: Document) -> Result<Uuid, Error> {
        let _guard = self.write_lock.lock().await;
        let repo = self.repo.clone();
        let id = doc.id;
        self.repo
            .run(move |conn| {
                conn.transaction(|| Self::insert_row(conn, &repo, &doc))?;
                Ok(id)
            })
            .await
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<Vec<Uuid>, Error> {
        let _guard = self.write_lock.lock().await;
        let repo = self.repo.clone();
        self.repo
            .run(move |conn| {
                conn.transaction(|| {
                    let mut ids = Vec::with_capacity(docs.len());
                    for doc in &docs {
                        Self::insert_row(conn, &repo, doc)?;
                        ids.push(doc.id);
                    }
                    Ok(ids)
                })
            })
            .await
    }

    async fn insert_children(&self, parent_id: Uuid, mut children: Vec<Document>) -> Result<Vec<Uuid>, Error> {
        let _guard = self.write_lock.lock().await;
        for child in &mut children {
            child.parent_id = Some(parent_id);
        }
        let repo = self.repo.clone();
        self.repo
            .run(move |conn| {
                conn.transaction(|| {
                    let exists: i64 = documents::table
                        .filter(documents::id.eq(parent_id.to_string()))
                        .count()
                        .get_result(conn)?;
                    if exists == 0 {
                        return Err(Error::NotFound(parent_id));
                    }
                    let mut ids = Vec::with_capacity(children.len());
                    for child in &children {
                        Self::insert_row(conn, &repo, child)?;
                        ids.push(child.id);
                    }
                    Ok(ids)
                })
            })
            .await
    }

    async fn get(&self, id: Uuid, include_content: bool) -> Result<Option<Document>, Error> {
        self.repo.run(move |conn| Self::fetch_one(conn, id, include_content)).await
    }

    async fn get_by_state(&self, state: &str, include_content: bool) -> Result<Vec<Document>, Error> {
        let state = state.to_string();
        self.repo
            .run(move |conn| {
                let rows: Vec<DocumentRow> = documents::table
                    .filter(documents::state.eq(state.as_str()))
                    .order(documents::seq.asc())
                    .load(conn)?;
                rows.into_iter()
                    .map(|row| Self::row_to_document(conn, row, include_content))
                    .collect()
            })
            .await
    }

    async fn get_batch(&self, ids: &[Uuid]) -> Result<Vec<Document>, Error> {
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        self.repo
            .run(move |conn| {
                let rows: Vec<DocumentRow> = documents::table.filter(documents::id.eq_any(&ids)).load(conn)?;
                let mut by_id: std::collections::HashMap<String, DocumentRow> =
                    rows.into_iter().map(|row| (row.id.clone(), row)).collect();
                ids.iter()
                    .filter_map(|id| by_id.remove(id))
                    .map(|row| Self::row_to_document(conn, row, true))
                    .collect()
            })
            .await
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<Document>, Error> {
        self.repo
            .run(move |conn| {
                let mut query = documents::table.into_boxed();
                if let Some(state) = filter.state.as_deref() {
                    query = query.filter(documents::state.eq(state.to_string()));
                }
                let rows: Vec<DocumentRow> = query.order(documents::seq.asc()).load(conn)?;
                let mut docs = Vec::with_capacity(rows.len());
                for row in rows {
                    let children = Self::children_of(conn, row.id.as_str())?;
                    if filter.leaf_only && !children.is_empty() {
                        continue;
                    }
                    let doc = row.into_document(children, filter.include_content)?;
                    if filter
                        .metadata_filter
                        .iter()
                        .all(|(k, v)| doc.metadata.get(k) == Some(v))
                    {
                        docs.push(doc);
                    }
                }
                Ok(docs)
            })
            .await
    }

    async fn update(&self, id: Uuid, patch: UpdatePatch) -> Result<Document, Error> {
        let _guard = self.write_lock.lock().await;
        self.repo
            .run(move |conn| {
                conn.transaction(|| {
                    let id_str = id.to_string();
                    let exists: i64 = documents::table
                        .filter(documents::id.eq(id_str.as_str()))
                        .count()
                        .get_result(conn)?;
                    if exists == 0 {
                        return Err(Error::NotFound(id));
                    }
                    if let Some(metadata) = patch.metadata {
                        let encoded = json::to_string(&metadata)?;
                        diesel::update(documents::table.filter(documents::id.eq(id_str.as_str())))
                            .set(documents::cmetadata.eq(encoded))
                            .execute(conn)?;
                    }
                    for child_id in &patch.append_children {
                        let child_str = child_id.to_string();
                        diesel::update(
                            documents::table
                                .filter(documents::id.eq(child_str.as_str()))
                                .filter(documents::parent_id.is_null()),
                        )
                        .set(documents::parent_id.eq(id_str.as_str()))
                        .execute(conn)?;
                    }
                    Self::fetch_one(conn, id, true)?.ok_or(Error::NotFound(id))
                })
            })
            .await
    }

    async fn append_child(&self, parent_id: Uuid, child_id: Uuid) -> Result<(), Error> {
        self.append_children(parent_id, &[child_id]).await
    }

    async fn append_children(&self, parent_id: Uuid, child_ids: &[Uuid]) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        let parent_str = parent_id.to_string();
        let child_strs: Vec<String> = child_ids.iter().map(Uuid::to_string).collect();
        self.repo
            .run(move |conn| {
                conn.transaction(|| {
                    let exists: i64 = documents::table
                        .filter(documents::id.eq(parent_str.as_str()))
                        .count()
                        .get_result(conn)?;
                    if exists == 0 {
                        return Err(Error::NotFound(parent_id));
                    }
                    for child_str in &child_strs {
                        diesel::update(
                            documents::table
                                .filter(documents::id.eq(child_str.as_str()))
                                .filter(documents::parent_id.is_null()),
                        )
                        .set(documents::parent_id.eq(parent_str.as_str()))
                        .execute(conn)?;
                    }
                    Ok(())
                })
            })
            .await
    }

    async fn delete(&self, id: Uuid) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        self.repo
            .run(move |conn| {
                let affected = diesel::delete(documents::table.filter(documents::id.eq(id.to_string()))).execute(conn)?;
                if affected == 0 {
                    return Err(Error::NotFound(id));
                }
                Ok(())
            })
            .await
    }

    async fn count(&self, state: Option<&str>) -> Result<u64, Error> {
        let state = state.map(str::to_string);
        self.repo
            .run(move |conn| {
                let count: i64 = match state.as_deref() {
                    Some(state) => documents::table
                        .filter(documents::state.eq(state.to_string()))
                        .count()
                        .get_result(conn)?,
                    None => documents::table.count().get_result(conn)?,
                };
                Ok(count as u64)
            })
            .await
    }

    async fn stream_content(&self, id: Uuid, chunk_size: usize) -> Result<ContentStream, Error> {
        let content = self
            .repo
            .run(move |conn| {
                // Distinguishes "no such document" (`NotFound`) from "document
                // exists but has no content" (`NoContent`) per spec.md §4.4.3.
                let row: Option<Option<String>> = documents::table
                    .find(id.to_string())
                    .select(documents::content)
                    .first(conn)
                    .optional()?;
                match row {
                    None => Err(Error::NotFound(id)),
                    Some(None) => Err(Error::NoContent(id)),
                    Some(Some(content)) => Ok(content),
                }
            })
            .await?;

        let chunk_size = chunk_size.max(1);
        let chars: Vec<char> = content.chars().collect();
        let stream = stream::unfold((chars, 0usize), move |(chars, offset)| async move {
            if offset >= chars.len() {
                return None;
            }
            let end = (offset + chunk_size).min(chars.len());
            let chunk: String = chars[offset..end].iter().collect();
            Some((Ok(chunk), (chars, end)))
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use tempfile::TempDir;

    use super::*;

    async fn new_store(dir: &TempDir, name: &str) -> SqliteStore {
        let path = dir.path().join(name);
        let store = SqliteStore::new(path.to_str().unwrap(), &PoolConfig::default()).unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[async_std::test]
    async fn round_trips_through_add_and_get() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir, "db.sqlite").await;

        let mut metadata = json::Map::new();
        metadata.insert("k".to_string(), json::Value::String("v".to_string()));
        let doc = Document::new("a")
            .with_content("hello")
            .with_metadata(metadata);
        let id = doc.id;
        store.insert(doc.clone()).await.unwrap();

        let fetched = store.get(id, true).await.unwrap().unwrap();
        assert_eq!(fetched, doc);

        let without_content = store.get(id, false).await.unwrap().unwrap();
        assert_eq!(without_content.content, None);
        assert_eq!(without_content.state, doc.state);
        assert_eq!(without_content.metadata, doc.metadata);
    }

    #[async_std::test]
    async fn insert_duplicate_id_conflicts() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir, "db.sqlite").await;

        let doc = Document::new("a");
        store.insert(doc.clone()).await.unwrap();
        let err = store.insert(doc.clone()).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(id) if id == doc.id));
    }

    #[async_std::test]
    async fn append_child_is_idempotent_once_linked() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir, "db.sqlite").await;

        let parent = Document::new("a");
        let child = Document::new("b");
        store.insert(parent.clone()).await.unwrap();
        store.insert(child.clone()).await.unwrap();

        store.append_child(parent.id, child.id).await.unwrap();
        store.append_child(parent.id, child.id).await.unwrap();

        let linked = store.get(parent.id, false).await.unwrap().unwrap();
        assert_eq!(linked.children, vec![child.id]);
    }

    #[async_std::test]
    async fn update_delete_stream_content_error_on_missing_id() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir, "db.sqlite").await;
        let missing = Uuid::new_v4();

        let err = store.update(missing, UpdatePatch::default()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id == missing));

        let err = store.delete(missing).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id == missing));

        let err = match store.stream_content(missing, 8).await {
            Err(err) => err,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, Error::NotFound(id) if id == missing));
    }

    #[async_std::test]
    async fn stream_content_not_found_vs_no_content() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir, "db.sqlite").await;

        let doc = Document::new("a");
        store.insert(doc.clone()).await.unwrap();
        let err = match store.stream_content(doc.id, 8).await {
            Err(err) => err,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, Error::NoContent(id) if id == doc.id));

        let with_content = Document::new("a").with_content("abcdef");
        store.insert(with_content.clone()).await.unwrap();
        let mut stream = store.stream_content(with_content.id, 4).await.unwrap();
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
        }
        assert_eq!(chunks.concat(), "abcdef");
    }

    #[async_std::test]
    async fn get_batch_preserves_order_and_skips_missing() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir, "db.sqlite").await;

        let a = Document::new("a");
        let b = Document::new("a");
        let c = Document::new("a");
        store.insert(a.clone()).await.unwrap();
        store.insert(b.clone()).await.unwrap();
        store.insert(c.clone()).await.unwrap();
        let missing = Uuid::new_v4();

        let fetched = store.get_batch(&[b.id, missing, a.id, c.id]).await.unwrap();
        let ids: Vec<Uuid> = fetched.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![b.id, a.id, c.id]);
    }

    #[async_std::test]
    async fn next_seq_survives_a_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.sqlite");

        let first = SqliteStore::new(path.to_str().unwrap(), &PoolConfig::default()).unwrap();
        first.initialize().await.unwrap();
        let parent = Document::new("a");
        let child = Document::new("b");
        first.insert(parent.clone()).await.unwrap();
        first
            .insert_children(parent.id, vec![child.clone()])
            .await
            .unwrap();
        first.dispose().await.unwrap();
        drop(first);

        let second = SqliteStore::new(path.to_str().unwrap(), &PoolConfig::default()).unwrap();
        second.initialize().await.unwrap();
        let grandchild = Document::new("c");
        second
            .insert_children(parent.id, vec![grandchild.clone()])
            .await
            .unwrap();

        let reloaded = second.get(parent.id, false).await.unwrap().unwrap();
        assert_eq!(reloaded.children, vec![child.id, grandchild.id]);
    }
}
