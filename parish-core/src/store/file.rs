//! Directory-backed document store.
//!
//! Each collection is a directory and each document a JSON file named after
//! its id: `<root>/<collection>/<id>.json`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Change, ChangeFeed, ChangeStream, Document, DocumentStore, Query};
use crate::error::{ParishError, ParishResult};

/// A [`DocumentStore`] persisting documents as JSON files.
///
/// Writes are serialized through one lock so change notifications go out in
/// the order writes hit the disk. Only writes made through this instance are
/// notified.
pub struct FileStore {
    root: PathBuf,
    feed: ChangeFeed,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore {
            root: root.into(),
            feed: ChangeFeed::new(),
            write_lock: Mutex::new(()),
        }
    }

    fn collection_dir(&self, collection: &str) -> ParishResult<PathBuf> {
        Ok(self.root.join(path_segment(collection)?))
    }

    fn document_path(&self, collection: &str, id: &str) -> ParishResult<PathBuf> {
        Ok(self
            .collection_dir(collection)?
            .join(format!("{}.json", path_segment(id)?)))
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn create(&self, collection: &str, doc: Document) -> ParishResult<String> {
        let id = Uuid::new_v4().to_string();
        let path = self.document_path(collection, &id)?;

        let _guard = self.write_lock.lock().await;
        let body = doc.clone();
        blocking(move || write_document(&path, &body)).await?;
        self.feed.publish(collection, Change::Upserted { id: id.clone(), doc });

        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> ParishResult<Option<Document>> {
        let path = self.document_path(collection, id)?;
        blocking(move || read_document(&path)).await
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> ParishResult<Vec<(String, Document)>> {
        let dir = self.collection_dir(collection)?;
        let docs = blocking(move || list_documents(&dir)).await?;
        Ok(query.apply(docs))
    }

    async fn set(&self, collection: &str, id: &str, doc: Document) -> ParishResult<()> {
        let path = self.document_path(collection, id)?;

        let _guard = self.write_lock.lock().await;
        let body = doc.clone();
        let (c, i) = (collection.to_string(), id.to_string());
        blocking(move || {
            if !path.exists() {
                return Err(ParishError::not_found(&c, &i));
            }
            write_document(&path, &body)
        })
        .await?;
        self.feed.publish(collection, Change::Upserted { id: id.to_string(), doc });

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> ParishResult<()> {
        let path = self.document_path(collection, id)?;

        let _guard = self.write_lock.lock().await;
        let (c, i) = (collection.to_string(), id.to_string());
        blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ParishError::not_found(&c, &i)),
            Err(e) => Err(e.into()),
        })
        .await?;
        self.feed.publish(collection, Change::Removed { id: id.to_string() });

        Ok(())
    }

    async fn subscribe(&self, collection: &str) -> ParishResult<ChangeStream> {
        let dir = self.collection_dir(collection)?;

        let _guard = self.write_lock.lock().await;
        let existing = blocking(move || list_documents(&dir)).await?;
        Ok(self.feed.subscribe(collection, existing))
    }
}

/// Run blocking filesystem work off the async executor.
async fn blocking<T, F>(work: F) -> ParishResult<T>
where
    F: FnOnce() -> ParishResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ParishError::StoreUnavailable(format!("Store task failed: {}", e)))?
}

/// Collection names and ids become path components, so keep them to one.
fn path_segment(name: &str) -> ParishResult<&str> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && name != "..";

    if valid {
        Ok(name)
    } else {
        Err(ParishError::ValidationFailed(format!(
            "'{}' is not a valid collection name or document id",
            name
        )))
    }
}

fn read_document(path: &Path) -> ParishResult<Option<Document>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let doc = serde_json::from_str(&content).map_err(|e| {
        ParishError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    Ok(Some(doc))
}

/// Write through a temp file and rename, so readers never see a torn document.
fn write_document(path: &Path, doc: &Document) -> ParishResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| ParishError::StoreUnavailable(format!("No parent for {}", path.display())))?;
    std::fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    let content = serde_json::to_string_pretty(doc)?;
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

fn list_documents(dir: &Path) -> ParishResult<Vec<(String, Document)>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut docs = Vec::new();

    for entry in entries {
        let path = entry?.path();

        let Some(id) = document_id(&path) else {
            continue;
        };

        match read_document(&path) {
            Ok(Some(doc)) => docs.push((id, doc)),
            // removed between read_dir and read
            Ok(None) => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable document"),
        }
    }

    Ok(docs)
}

fn document_id(path: &Path) -> Option<String> {
    if path.extension().is_none_or(|e| e != "json") {
        return None;
    }

    let stem = path.file_stem()?.to_str()?;
    if stem.starts_with('.') {
        return None;
    }
    Some(stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Direction, FilterOp};
    use futures::StreamExt;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_documents_are_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let id = store.create("events", doc(json!({ "title": "Mass" }))).await.unwrap();

        let path = dir.path().join("events").join(format!("{}.json", id));
        assert!(path.exists());

        let on_disk: Document =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, doc(json!({ "title": "Mass" })));
    }

    #[tokio::test]
    async fn test_roundtrip_and_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert_eq!(store.get("events", "missing").await.unwrap(), None);
        assert!(matches!(
            store.set("events", "missing", Document::new()).await,
            Err(ParishError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("events", "missing").await,
            Err(ParishError::NotFound { .. })
        ));

        let id = store.create("events", doc(json!({ "n": 1 }))).await.unwrap();
        store.set("events", &id, doc(json!({ "n": 2 }))).await.unwrap();
        assert_eq!(store.get("events", &id).await.unwrap(), Some(doc(json!({ "n": 2 }))));

        store.delete("events", &id).await.unwrap();
        assert_eq!(store.get("events", &id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        for n in [30, 10, 20] {
            store.create("events", doc(json!({ "startTime": n }))).await.unwrap();
        }

        let results = store
            .query(
                "events",
                &Query::all()
                    .filter("startTime", FilterOp::Gte, 20)
                    .order_by("startTime", Direction::Ascending),
            )
            .await
            .unwrap();

        let times: Vec<_> = results.iter().map(|(_, d)| d["startTime"].clone()).collect();
        assert_eq!(times, vec![json!(20), json!(30)]);
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert!(matches!(
            store.get("events", "../secrets").await,
            Err(ParishError::ValidationFailed(_))
        ));
        assert!(matches!(
            store.query("../etc", &Query::all()).await,
            Err(ParishError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_subscription_sees_existing_and_new_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let first = store.create("events", doc(json!({ "n": 1 }))).await.unwrap();

        let mut stream = store.subscribe("events").await.unwrap();
        let second = store.create("events", doc(json!({ "n": 2 }))).await.unwrap();

        assert_eq!(stream.next().await.map(|c| c.id().to_string()), Some(first));
        assert_eq!(stream.next().await.map(|c| c.id().to_string()), Some(second));
    }

    #[tokio::test]
    async fn test_skips_temp_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.create("events", doc(json!({ "n": 1 }))).await.unwrap();

        let events_dir = dir.path().join("events");
        std::fs::write(events_dir.join(".half-written.json.tmp"), "{").unwrap();
        std::fs::write(events_dir.join("notes.txt"), "hello").unwrap();
        std::fs::write(events_dir.join("broken.json"), "{ not json").unwrap();

        let results = store.query("events", &Query::all()).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
