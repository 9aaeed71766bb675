//! In-process liveness store with sorted-set semantics.
//!
//! Each peer holds a single score: the time of its latest announce in unix
//! milliseconds. Announcing again replaces the score, so a range query
//! naturally returns every peer at most once.
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::LivenessStore;
use crate::error::Result;
use crate::peer_id::PeerId;
use crate::store_error;

#[derive(Debug, Default)]
struct ScoreIndex {
    scores: HashMap<PeerId, i64>,
    by_score: BTreeSet<(i64, PeerId)>,
}

impl ScoreIndex {
    fn insert(&mut self, score: i64, peer_id: &PeerId) {
        if let Some(previous) = self.scores.insert(peer_id.clone(), score) {
            self.by_score.remove(&(previous, peer_id.clone()));
        }
        self.by_score.insert((score, peer_id.clone()));
    }

    fn range(&self, min: i64, max: i64) -> Vec<PeerId> {
        if min > max {
            return Vec::new();
        }
        // "" sorts before every id, so this starts at the first entry scored `min`
        self.by_score
            .range((min, PeerId::from(""))..)
            .take_while(|(score, _)| *score <= max)
            .map(|(_, peer_id)| peer_id.clone())
            .collect()
    }

    fn remove_until(&mut self, until: i64) -> usize {
        let expired: Vec<(i64, PeerId)> = self
            .by_score
            .iter()
            .take_while(|(score, _)| *score <= until)
            .cloned()
            .collect();
        for entry in &expired {
            self.by_score.remove(entry);
            self.scores.remove(&entry.1);
        }
        expired.len()
    }
}

/// A single namespace of liveness entries
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: RwLock<ScoreIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, now: DateTime<Utc>, peer_id: &PeerId) -> Result<()> {
        let mut index = self
            .index
            .write()
            .map_err(|_| store_error!("liveness index lock poisoned"))?;
        index.insert(now.timestamp_millis(), peer_id);
        Ok(())
    }

    pub fn range(&self, min: DateTime<Utc>, max: DateTime<Utc>) -> Result<Vec<PeerId>> {
        let index = self
            .index
            .read()
            .map_err(|_| store_error!("liveness index lock poisoned"))?;
        Ok(index.range(min.timestamp_millis(), max.timestamp_millis()))
    }

    /// Remove entries at or before `until`, returning how many were dropped
    pub fn remove_until(&self, until: DateTime<Utc>) -> Result<usize> {
        let mut index = self
            .index
            .write()
            .map_err(|_| store_error!("liveness index lock poisoned"))?;
        let removed = index.remove_until(until.timestamp_millis());
        debug!(removed, until = %until, "Pruned liveness entries");
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.index.read().map(|i| i.scores.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LivenessStore for MemoryStore {
    async fn announce(&self, now: DateTime<Utc>, peer_id: &PeerId) -> Result<()> {
        self.insert(now, peer_id)
    }

    async fn discover(&self, min: DateTime<Utc>, max: DateTime<Utc>) -> Result<Vec<PeerId>> {
        self.range(min, max)
    }

    async fn cleanup(&self, until: DateTime<Utc>) -> Result<()> {
        self.remove_until(until).map(|_| ())
    }
}

/// Many independent namespaces, created by the first announce into them
#[derive(Debug, Default)]
pub struct Registry {
    namespaces: RwLock<HashMap<String, Arc<MemoryStore>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a namespace without creating it
    pub fn get(&self, name: &str) -> Result<Option<Arc<MemoryStore>>> {
        Ok(self
            .namespaces
            .read()
            .map_err(|_| store_error!("registry lock poisoned"))?
            .get(name)
            .cloned())
    }

    pub fn get_or_create(&self, name: &str) -> Result<Arc<MemoryStore>> {
        if let Some(store) = self.get(name)? {
            return Ok(store);
        }
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|_| store_error!("registry lock poisoned"))?;
        Ok(namespaces
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new()))
            .clone())
    }

    pub fn namespace_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .namespaces
            .read()
            .map(|n| n.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}
