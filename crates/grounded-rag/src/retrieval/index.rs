//! In-memory embedding index of named collections

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::embeddings::{cosine_similarity, SharedEmbedder};
use crate::error::{Error, Result};
use crate::ingestion::validate_collection_name;
use crate::types::{CollectionSummary, RetrievalResult, RetrievedUnit, Unit};

/// One stored unit
#[derive(Debug, Clone)]
struct StoredUnit {
    embedding: Vec<f32>,
    text: String,
    metadata: HashMap<String, String>,
    /// Insertion order, used to break score ties
    position: usize,
}

#[derive(Debug, Default)]
struct Collection {
    /// Fixed by the first non-empty upsert
    dimensions: Option<usize>,
    units: HashMap<String, StoredUnit>,
    next_position: usize,
}

impl Collection {
    fn summary(&self, name: &str) -> CollectionSummary {
        CollectionSummary {
            name: name.to_string(),
            units: self.units.len(),
            dimensions: self.dimensions,
        }
    }
}

/// Named collections of embedded units.
///
/// Each collection has its own lock: one writer or many readers, while different
/// collections proceed independently. Embeddings are computed before a write lock
/// is taken.
pub struct EmbeddingIndex {
    embedder: SharedEmbedder,
    collections: DashMap<String, Arc<RwLock<Collection>>>,
}

impl EmbeddingIndex {
    pub fn new(embedder: SharedEmbedder) -> Self {
        Self {
            embedder,
            collections: DashMap::new(),
        }
    }

    pub fn embedder(&self) -> &SharedEmbedder {
        &self.embedder
    }

    /// Create an empty collection if it does not exist yet
    pub async fn create_collection(&self, name: &str) -> Result<CollectionSummary> {
        let handle = self.handle_or_create(name)?;
        let collection = handle.read().await;
        Ok(collection.summary(name))
    }

    /// Remove a collection; returns whether it existed
    pub fn delete_collection(&self, name: &str) -> bool {
        let removed = self.collections.remove(name).is_some();
        if removed {
            tracing::info!("Deleted collection {}", name);
        }
        removed
    }

    /// Summaries of all collections, sorted by name
    pub async fn list_collections(&self) -> Vec<CollectionSummary> {
        let handles: Vec<(String, Arc<RwLock<Collection>>)> = self
            .collections
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            summaries.push(handle.read().await.summary(&name));
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Number of units in a collection, `None` if it does not exist
    pub async fn collection_len(&self, name: &str) -> Option<usize> {
        let handle = self.handle(name)?;
        let len = handle.read().await.units.len();
        Some(len)
    }

    /// Insert or replace units by id, creating the collection if missing
    pub async fn upsert(&self, name: &str, units: &[Unit]) -> Result<CollectionSummary> {
        self.write(name, units, false).await
    }

    /// Upsert `units` and drop every other unit in the collection
    pub async fn replace(&self, name: &str, units: &[Unit]) -> Result<CollectionSummary> {
        self.write(name, units, true).await
    }

    async fn write(&self, name: &str, units: &[Unit], prune: bool) -> Result<CollectionSummary> {
        self.handle_or_create(name)?;

        let embeddings = if units.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != units.len() {
                return Err(Error::embedding(format!(
                    "{} returned {} embeddings for {} units",
                    self.embedder.name(),
                    embeddings.len(),
                    units.len()
                )));
            }
            embeddings
        };

        // A concurrent delete may drop the entry while we embed; write into
        // whichever collection is registered under `name` once the lock is held.
        let mut guard = loop {
            let handle = self.handle_or_create(name)?;
            let guard = Arc::clone(&handle).write_owned().await;
            if self.is_current(name, &handle) {
                break guard;
            }
        };
        let collection = &mut *guard;

        let expected = collection
            .dimensions
            .or_else(|| embeddings.first().map(Vec::len));
        if let Some(expected) = expected {
            if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
                return Err(Error::index(format!(
                    "Collection '{}' holds {}-dimensional embeddings, got {}",
                    name,
                    expected,
                    bad.len()
                )));
            }
            collection.dimensions = Some(expected);
        }

        for (unit, embedding) in units.iter().zip(embeddings) {
            let metadata = HashMap::from([("source".to_string(), unit.source_ref.clone())]);
            let existing = collection.units.get(&unit.id).map(|u| u.position);
            let position = match existing {
                Some(position) => position,
                None => {
                    let next = collection.next_position;
                    collection.next_position += 1;
                    next
                }
            };
            collection.units.insert(
                unit.id.clone(),
                StoredUnit {
                    embedding,
                    text: unit.text.clone(),
                    metadata,
                    position,
                },
            );
        }

        if prune {
            let keep: HashSet<&str> = units.iter().map(|u| u.id.as_str()).collect();
            let before = collection.units.len();
            collection.units.retain(|id, _| keep.contains(id.as_str()));
            let pruned = before - collection.units.len();
            if pruned > 0 {
                tracing::debug!("Pruned {} stale units from {}", pruned, name);
            }
        }

        tracing::debug!(
            "Upserted {} units into {} ({} total)",
            units.len(),
            name,
            collection.units.len()
        );
        Ok(collection.summary(name))
    }

    /// The `k` units nearest to `question`, most similar first.
    ///
    /// Ties are broken by insertion position. `k` larger than the collection is
    /// clamped; `k == 0` yields an empty result.
    pub async fn query(&self, name: &str, question: &str, k: usize) -> Result<RetrievalResult> {
        let handle = self
            .handle(name)
            .ok_or_else(|| Error::EmptyCollection(name.to_string()))?;

        if handle.read().await.units.is_empty() {
            return Err(Error::EmptyCollection(name.to_string()));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        // Embed without holding the lock so writers are not queued behind the model
        let query = self.embedder.embed(question).await?;

        let collection = handle.read().await;
        if collection.units.is_empty() {
            return Err(Error::EmptyCollection(name.to_string()));
        }
        if let Some(dims) = collection.dimensions {
            if dims != query.len() {
                return Err(Error::index(format!(
                    "Question embedding has {} dimensions, collection '{}' has {}",
                    query.len(),
                    name,
                    dims
                )));
            }
        }

        let mut scored: Vec<(f32, usize, &String, &StoredUnit)> = collection
            .units
            .iter()
            .map(|(id, unit)| {
                let score = cosine_similarity(&query, &unit.embedding);
                // NaN sorts last instead of poisoning the order
                let score = if score.is_nan() { f32::NEG_INFINITY } else { score };
                (score, unit.position, id, unit)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, _, id, unit)| RetrievedUnit {
                id: id.clone(),
                text: unit.text.clone(),
                score,
                distance: 1.0 - score,
            })
            .collect())
    }

    /// Metadata stored with a unit
    pub async fn unit_metadata(&self, name: &str, id: &str) -> Option<HashMap<String, String>> {
        let handle = self.handle(name)?;
        let collection = handle.read().await;
        collection.units.get(id).map(|u| u.metadata.clone())
    }

    fn handle(&self, name: &str) -> Option<Arc<RwLock<Collection>>> {
        self.collections.get(name).map(|entry| Arc::clone(entry.value()))
    }

    fn is_current(&self, name: &str, handle: &Arc<RwLock<Collection>>) -> bool {
        self.collections
            .get(name)
            .map(|entry| Arc::ptr_eq(entry.value(), handle))
            .unwrap_or(false)
    }

    fn handle_or_create(&self, name: &str) -> Result<Arc<RwLock<Collection>>> {
        if let Some(handle) = self.handle(name) {
            return Ok(handle);
        }
        validate_collection_name(name)?;
        let entry = self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!("Created collection {}", name);
                Arc::new(RwLock::new(Collection::default()))
            });
        Ok(Arc::clone(entry.value()))
    }
}
