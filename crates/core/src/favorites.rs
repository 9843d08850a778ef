//! Saved trials, persisted as one blob in an external key-value store

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::MatchError;
use crate::trial::TrialRecord;

/// Key under which the favorites list is stored
pub const FAVORITES_KEY: &str = "trialscribe.favorites";

/// String key-value persistence
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, MatchError>;

    /// Overwrite the value stored under `key`.
    async fn set(&self, key: &str, value: String) -> Result<(), MatchError>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), MatchError> {
        Ok(())
    }
}

/// In-process store, used when no database is configured
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, MatchError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| MatchError::Storage(format!("Memory store poisoned: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), MatchError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| MatchError::Storage(format!("Memory store poisoned: {}", e)))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Favorite trials keyed by NCT id, in insertion order
///
/// Every mutation writes the whole set back before returning.
pub struct FavoritesStore {
    store: Arc<dyn KeyValueStore>,
    trials: Vec<TrialRecord>,
}

impl FavoritesStore {
    /// Load the persisted set. Unparseable data is discarded and treated as empty.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, MatchError> {
        let trials = match store.get(FAVORITES_KEY).await? {
            Some(blob) => match serde_json::from_str::<Vec<TrialRecord>>(&blob) {
                Ok(trials) => dedupe(trials),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding corrupt favorites data");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        tracing::debug!(count = trials.len(), "Favorites loaded");
        Ok(Self { store, trials })
    }

    pub fn contains(&self, nct_id: &str) -> bool {
        self.trials.iter().any(|t| t.nct_id == nct_id)
    }

    pub fn list(&self) -> &[TrialRecord] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Add the trial if absent, remove it if present.
    ///
    /// Returns whether the trial is a favorite afterwards. If persisting
    /// fails, the in-memory set is left as it was.
    pub async fn toggle(&mut self, trial: TrialRecord) -> Result<bool, MatchError> {
        let previous = self.trials.clone();
        let favorited = match self.trials.iter().position(|t| t.nct_id == trial.nct_id) {
            Some(index) => {
                self.trials.remove(index);
                false
            }
            None => {
                self.trials.push(trial);
                true
            }
        };

        if let Err(e) = self.persist().await {
            self.trials = previous;
            return Err(e);
        }
        Ok(favorited)
    }

    async fn persist(&self) -> Result<(), MatchError> {
        let blob = serde_json::to_string(&self.trials)
            .map_err(|e| MatchError::Storage(format!("Failed to serialize favorites: {}", e)))?;
        self.store.set(FAVORITES_KEY, blob).await
    }
}

fn dedupe(trials: Vec<TrialRecord>) -> Vec<TrialRecord> {
    let mut out: Vec<TrialRecord> = Vec::with_capacity(trials.len());
    for trial in trials {
        if !out.iter().any(|t| t.nct_id == trial.nct_id) {
            out.push(trial);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::trial;

    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, MatchError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: String) -> Result<(), MatchError> {
            Err(MatchError::Storage("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn toggle_twice_restores_membership() {
        let mut favorites = FavoritesStore::load(Arc::new(MemoryStore::new()))
            .await
            .unwrap();
        let t = trial(7);

        assert!(!favorites.contains(&t.nct_id));
        assert!(favorites.toggle(t.clone()).await.unwrap());
        assert!(favorites.contains(&t.nct_id));
        assert!(!favorites.toggle(t.clone()).await.unwrap());
        assert!(!favorites.contains(&t.nct_id));
    }

    #[tokio::test]
    async fn mutations_are_persisted_in_insertion_order() {
        let store = Arc::new(MemoryStore::new());
        let mut favorites = FavoritesStore::load(store.clone()).await.unwrap();
        favorites.toggle(trial(3)).await.unwrap();
        favorites.toggle(trial(1)).await.unwrap();
        favorites.toggle(trial(2)).await.unwrap();
        favorites.toggle(trial(1)).await.unwrap();

        let reloaded = FavoritesStore::load(store).await.unwrap();
        let ids: Vec<&str> = reloaded.list().iter().map(|t| t.nct_id.as_str()).collect();
        assert_eq!(ids, vec!["NCT00000003", "NCT00000002"]);
    }

    #[tokio::test]
    async fn corrupt_blob_loads_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(FAVORITES_KEY, "{not json".to_string())
            .await
            .unwrap();

        let mut favorites = FavoritesStore::load(store.clone()).await.unwrap();
        assert!(favorites.is_empty());

        // the next write replaces the corrupt data
        favorites.toggle(trial(9)).await.unwrap();
        let blob = store.get(FAVORITES_KEY).await.unwrap().unwrap();
        let saved: Vec<TrialRecord> = serde_json::from_str(&blob).unwrap();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn failed_write_rolls_back() {
        let mut favorites = FavoritesStore::load(Arc::new(FailingStore)).await.unwrap();
        let err = favorites.toggle(trial(4)).await.unwrap_err();
        assert!(matches!(err, MatchError::Storage(_)));
        assert!(favorites.is_empty());
    }
}
