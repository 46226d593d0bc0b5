//! A keyed document collection that pushes its full contents to subscribers
//! on every change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use super::TodoBackend;
use crate::core::todo::Todo;
use crate::error::{Result, TodoError};

/// A stored entry, keyed by its push id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub text: String,
    /// Epoch milliseconds. Assigned by the collection when left unset.
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

type Entries = BTreeMap<String, Entry>;

fn to_todos(entries: &Entries) -> Vec<Todo> {
    entries
        .iter()
        .map(|(key, entry)| {
            let created_at = entry
                .created_at
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .unwrap_or_else(Utc::now);
            Todo::new(key.clone(), entry.text.clone(), created_at)
        })
        .collect()
}

fn load_entries(path: &Path) -> Entries {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable store {}: {}", path.display(), e);
            Entries::new()
        }),
        Err(_) => Entries::new(),
    }
}

fn save_entries(path: &Path, entries: &Entries) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::error!("Failed to create {}: {}", parent.display(), e);
            return;
        }
    }
    match serde_json::to_string_pretty(entries) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                log::error!("Failed to save realtime store: {}", e);
            }
        }
        Err(e) => log::error!("Failed to serialize realtime store: {}", e),
    }
}

/// Keyed collection. Every mutation publishes the whole map and, when the
/// collection was opened from a file, writes it back.
pub struct MemoryCollection {
    tx: watch::Sender<Entries>,
    store: Option<PathBuf>,
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCollection {
    /// A collection that lives only as long as the process.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Entries::new());
        Self { tx, store: None }
    }

    /// A collection backed by a JSON file. A missing or corrupt file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path);
        log::debug!("Loaded {} entries from {}", entries.len(), path.display());
        let (tx, _rx) = watch::channel(entries);
        Self {
            tx,
            store: Some(path),
        }
    }

    fn persist(&self) {
        if let Some(path) = &self.store {
            save_entries(path, &self.tx.borrow());
        }
    }

    /// Insert under a fresh key and return the key.
    pub fn push(&self, mut entry: Entry) -> String {
        let key = Uuid::new_v4().simple().to_string();
        if entry.created_at.is_none() {
            entry.created_at = Some(Utc::now().timestamp_millis());
        }
        self.tx.send_modify(|entries| {
            entries.insert(key.clone(), entry);
        });
        self.persist();
        key
    }

    pub fn set_text(&self, key: &str, text: &str) -> Result<()> {
        let found = self.tx.send_if_modified(|entries| match entries.get_mut(key) {
            Some(entry) => {
                entry.text = text.to_string();
                true
            }
            None => false,
        });
        if found {
            self.persist();
            Ok(())
        } else {
            Err(TodoError::NotFound(key.to_string()))
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let found = self
            .tx
            .send_if_modified(|entries| entries.remove(key).is_some());
        if found {
            self.persist();
            Ok(())
        } else {
            Err(TodoError::NotFound(key.to_string()))
        }
    }

    pub fn snapshot(&self) -> Vec<Todo> {
        to_todos(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> Subscription {
        let mut rx = self.tx.subscribe();
        // The current contents count as the first emission.
        rx.mark_changed();
        Subscription { rx }
    }
}

/// A standing view of a collection. Each emission is the full collection.
pub struct Subscription {
    rx: watch::Receiver<Entries>,
}

impl Subscription {
    /// True when a snapshot newer than the last one taken is waiting.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Take the latest snapshot and mark it seen.
    pub fn snapshot(&mut self) -> Vec<Todo> {
        to_todos(&self.rx.borrow_and_update())
    }

    /// Wait for the next change. `None` once the collection is gone.
    pub async fn next(&mut self) -> Option<Vec<Todo>> {
        self.rx.changed().await.ok()?;
        Some(self.snapshot())
    }

    pub fn into_stream(self) -> impl Stream<Item = Vec<Todo>> {
        futures::stream::unfold(self, |mut sub| async move {
            let snapshot = sub.next().await?;
            Some((snapshot, sub))
        })
    }
}

/// The realtime strategy: mutations go to the collection and the list
/// arrives through the subscription.
pub struct RealtimeBackend {
    collection: Arc<MemoryCollection>,
}

impl RealtimeBackend {
    pub fn new(collection: Arc<MemoryCollection>) -> Self {
        Self { collection }
    }
}

#[async_trait]
impl TodoBackend for RealtimeBackend {
    fn describe(&self) -> String {
        match &self.collection.store {
            Some(path) => format!("realtime collection at {}", path.display()),
            None => "in-process realtime collection".to_string(),
        }
    }

    async fn list(&self) -> Result<Vec<Todo>> {
        Ok(self.collection.snapshot())
    }

    async fn create(&self, text: &str) -> Result<()> {
        let key = self.collection.push(Entry {
            text: text.to_string(),
            created_at: None,
        });
        log::info!("Pushed todo {}", key);
        Ok(())
    }

    async fn update(&self, id: &str, text: &str) -> Result<()> {
        self.collection.set_text(id, text)?;
        log::info!("Updated todo {}", id);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.collection.remove(id)?;
        log::info!("Removed todo {}", id);
        Ok(())
    }

    fn subscribe(&self) -> Option<Subscription> {
        Some(self.collection.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn entry(text: &str, ms: i64) -> Entry {
        Entry {
            text: text.into(),
            created_at: Some(ms),
        }
    }

    #[test]
    fn push_assigns_key_and_timestamp() {
        let collection = MemoryCollection::new();
        let before = Utc::now().timestamp_millis();
        let key = collection.push(Entry {
            text: "buy milk".into(),
            created_at: None,
        });
        let snapshot = collection.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, key);
        assert!(snapshot[0].created_at.timestamp_millis() >= before);
    }

    #[test]
    fn missing_keys_are_not_found() {
        let collection = MemoryCollection::new();
        assert!(matches!(collection.set_text("nope", "x"), Err(TodoError::NotFound(_))));
        assert!(matches!(collection.remove("nope"), Err(TodoError::NotFound(_))));
    }

    #[test]
    fn subscription_sees_current_contents_first() {
        let collection = MemoryCollection::new();
        collection.push(entry("already here", 1));
        let mut sub = collection.subscribe();
        assert!(sub.has_changed());
        assert_eq!(sub.snapshot().len(), 1);
        assert!(!sub.has_changed());
    }

    #[test]
    fn failed_mutation_does_not_emit() {
        let collection = MemoryCollection::new();
        let mut sub = collection.subscribe();
        sub.snapshot();
        let _ = collection.remove("nope");
        assert!(!sub.has_changed());
    }

    #[tokio::test]
    async fn every_change_emits_the_full_collection() {
        let collection = Arc::new(MemoryCollection::new());
        let mut stream = Box::pin(collection.subscribe().into_stream());
        assert!(stream.next().await.unwrap().is_empty());

        let a = collection.push(entry("a", 1));
        assert_eq!(stream.next().await.unwrap().len(), 1);

        collection.push(entry("b", 2));
        assert_eq!(stream.next().await.unwrap().len(), 2);

        collection.set_text(&a, "a2").unwrap();
        let snapshot = stream.next().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().any(|t| t.id == a && t.text == "a2"));

        collection.remove(&a).unwrap();
        let snapshot = stream.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].text, "b");
    }

    #[test]
    fn reopened_store_keeps_entries() {
        let dir = std::env::temp_dir().join(format!("vibetodo-realtime-{}", Uuid::new_v4()));
        let path = dir.join("realtime.json");

        let collection = MemoryCollection::open(&path);
        assert!(collection.snapshot().is_empty());
        let kept = collection.push(entry("kept", 10));
        let gone = collection.push(entry("gone", 20));
        collection.set_text(&kept, "kept, edited").unwrap();
        collection.remove(&gone).unwrap();
        drop(collection);

        let reopened = MemoryCollection::open(&path);
        let snapshot = reopened.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, kept);
        assert_eq!(snapshot[0].text, "kept, edited");
        assert_eq!(snapshot[0].created_at.timestamp_millis(), 10);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(MemoryCollection::open(&path).snapshot().is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn entry_wire_shape() {
        let json = serde_json::to_value(entry("x", 5)).unwrap();
        assert_eq!(json, serde_json::json!({ "text": "x", "createdAt": 5 }));
        let parsed: Entry = serde_json::from_str(r#"{ "text": "y" }"#).unwrap();
        assert_eq!(parsed.created_at, None);
    }
}
