//! Persistent collection of saved insights.

use crate::cache;
use crate::insight::VerseInsight;
use crate::observable::StateCell;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

pub trait InsightStore: Send + Sync {
    fn save(&self, insight: VerseInsight);

    /// Newest first.
    fn insights(&self) -> Vec<VerseInsight>;

    fn remove(&self, id: &str) -> bool;

    fn clear(&self);

    fn subscribe(&self) -> Receiver<Vec<VerseInsight>>;
}

/// Ordering and de-duplication shared by the store implementations.
#[derive(Debug, Default)]
struct Collection {
    items: StateCell<Vec<VerseInsight>>,
}

impl Collection {
    fn with_items(mut items: Vec<VerseInsight>) -> Self {
        items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        let mut seen = HashSet::new();
        items.retain(|item| seen.insert(item.id().to_string()));
        Self {
            items: StateCell::new(items),
        }
    }

    fn insert(&mut self, insight: VerseInsight) {
        let mut items = self.items.get().clone();
        items.retain(|existing| existing.id() != insight.id());
        items.insert(0, insight);
        self.items.set(items);
    }

    fn remove(&mut self, id: &str) -> bool {
        let mut items = self.items.get().clone();
        let before = items.len();
        items.retain(|existing| existing.id() != id);
        if items.len() == before {
            return false;
        }
        self.items.set(items);
        true
    }

    fn clear(&mut self) {
        self.items.set(Vec::new());
    }
}

#[derive(Debug, Default)]
pub struct MemoryInsightStore {
    collection: Mutex<Collection>,
}

impl MemoryInsightStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InsightStore for MemoryInsightStore {
    fn save(&self, insight: VerseInsight) {
        lock(&self.collection).insert(insight);
    }

    fn insights(&self) -> Vec<VerseInsight> {
        lock(&self.collection).items.get().clone()
    }

    fn remove(&self, id: &str) -> bool {
        lock(&self.collection).remove(id)
    }

    fn clear(&self) {
        lock(&self.collection).clear();
    }

    fn subscribe(&self) -> Receiver<Vec<VerseInsight>> {
        lock(&self.collection).items.subscribe()
    }
}

/// Insights persisted as pretty JSON under the cache directory.
#[derive(Debug)]
pub struct JsonInsightStore {
    path: PathBuf,
    collection: Mutex<Collection>,
}

impl JsonInsightStore {
    pub fn open(cache_dir: &Path) -> Self {
        let path = cache::insights_path(cache_dir);
        let items = match load_insights(&path) {
            Ok(items) => {
                info!(path = %path.display(), count = items.len(), "Loaded saved insights");
                items
            }
            Err(err) => {
                warn!(path = %path.display(), "Starting with empty insight store: {err:#}");
                Vec::new()
            }
        };
        Self {
            path,
            collection: Mutex::new(Collection::with_items(items)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &[VerseInsight]) {
        if let Err(err) = write_insights(&self.path, items) {
            warn!(path = %self.path.display(), "Failed to persist insights: {err:#}");
        } else {
            debug!(path = %self.path.display(), count = items.len(), "Persisted insights");
        }
    }
}

impl InsightStore for JsonInsightStore {
    fn save(&self, insight: VerseInsight) {
        let mut collection = lock(&self.collection);
        collection.insert(insight);
        self.persist(collection.items.get());
    }

    fn insights(&self) -> Vec<VerseInsight> {
        lock(&self.collection).items.get().clone()
    }

    fn remove(&self, id: &str) -> bool {
        let mut collection = lock(&self.collection);
        let removed = collection.remove(id);
        if removed {
            self.persist(collection.items.get());
        }
        removed
    }

    fn clear(&self) {
        let mut collection = lock(&self.collection);
        collection.clear();
        self.persist(collection.items.get());
    }

    fn subscribe(&self) -> Receiver<Vec<VerseInsight>> {
        lock(&self.collection).items.subscribe()
    }
}

fn lock(collection: &Mutex<Collection>) -> std::sync::MutexGuard<'_, Collection> {
    collection.lock().unwrap_or_else(|e| e.into_inner())
}

fn load_insights(path: &Path) -> Result<Vec<VerseInsight>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

fn write_insights(path: &Path, items: &[VerseInsight]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(items)?;
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}
