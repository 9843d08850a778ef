//! Shared application state

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use trialscribe_core::{
    FavoritesStore, KeyValueStore, MatchError, MatchingPipeline, MemoryStore, PatientExtractor,
    QueryBuilder, RefinementSession, TrialRegistry,
};
use uuid::Uuid;

use crate::ai::{ClaudeClient, ClaudeExtractor};
use crate::config::Config;
use crate::db::{self, PostgresStore};
use crate::registry::ClinicalTrialsClient;

/// A session guarded so only one task works on it at a time
pub type SharedSession = Arc<Mutex<RefinementSession>>;

struct Entry {
    session: SharedSession,
    last_used: Instant,
}

/// Open refinement sessions keyed by id
///
/// Sessions idle for longer than the TTL are evicted on insert, and the least
/// recently used one makes room when the store is full.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<StdMutex<HashMap<Uuid, Entry>>>,
    ttl: Duration,
    capacity: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            sessions: Arc::default(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new session and return its id
    pub fn insert(&self, session: RefinementSession) -> Uuid {
        let mut map = self.map();
        let now = Instant::now();

        let before = map.len();
        map.retain(|_, entry| now.duration_since(entry.last_used) <= self.ttl);
        while map.len() >= self.capacity {
            let oldest = map
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => map.remove(&id),
                None => break,
            };
        }
        if map.len() < before {
            tracing::info!(evicted = before - map.len(), "Evicted idle sessions");
        }

        let id = Uuid::new_v4();
        map.insert(
            id,
            Entry {
                session: Arc::new(Mutex::new(session)),
                last_used: now,
            },
        );
        id
    }

    /// Look up a session and mark it as used
    pub fn get(&self, id: Uuid) -> Option<SharedSession> {
        let mut map = self.map();
        let entry = map.get_mut(&id)?;
        entry.last_used = Instant::now();
        Some(entry.session.clone())
    }

    /// Discard a session; returns whether it existed
    pub fn remove(&self, id: Uuid) -> bool {
        self.map().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything a request handler needs
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MatchingPipeline>,
    /// `None` when no LLM is configured
    pub extractor: Option<Arc<dyn PatientExtractor>>,
    pub claude: Option<ClaudeClient>,
    pub sessions: SessionStore,
    pub favorites: Arc<Mutex<FavoritesStore>>,
    pub store: Arc<dyn KeyValueStore>,
}

impl AppState {
    /// Assemble state from explicit collaborators
    pub async fn new(
        registry: Arc<dyn TrialRegistry>,
        extractor: Option<Arc<dyn PatientExtractor>>,
        claude: Option<ClaudeClient>,
        store: Arc<dyn KeyValueStore>,
        config: &Config,
    ) -> Result<Self, MatchError> {
        let pipeline = MatchingPipeline::new(
            registry,
            QueryBuilder::new(config.registry_page_size),
            config.filter_policy(),
        );
        let favorites = FavoritesStore::load(store.clone()).await?;

        Ok(Self {
            pipeline: Arc::new(pipeline),
            extractor,
            claude,
            sessions: SessionStore::new(
                Duration::from_secs(config.session_ttl_secs),
                config.max_sessions,
            ),
            favorites: Arc::new(Mutex::new(favorites)),
            store,
        })
    }

    /// Build the production collaborators described by `config`
    pub async fn from_config(config: &Config) -> Result<Self, MatchError> {
        let registry = Arc::new(ClinicalTrialsClient::new(
            config.registry_base_url.clone(),
            Duration::from_secs(config.registry_timeout_secs),
        ));

        let claude = config.anthropic_api_key.as_ref().map(|key| {
            let client = ClaudeClient::new(key.clone());
            match &config.anthropic_model {
                Some(model) => client.with_model(model.clone()),
                None => client,
            }
        });
        let extractor = claude
            .clone()
            .map(|client| Arc::new(ClaudeExtractor::new(client)) as Arc<dyn PatientExtractor>);

        let store: Arc<dyn KeyValueStore> = match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url)
                    .map_err(|e| MatchError::Storage(format!("Failed to create pool: {}", e)))?;
                let store = PostgresStore::new(pool);
                store.ensure_schema().await?;
                Arc::new(store)
            }
            None => Arc::new(MemoryStore::new()),
        };

        Self::new(registry, extractor, claude, store, config).await
    }

    /// Look up a session or fail with 404
    pub fn session(&self, id: Uuid) -> Result<SharedSession, crate::error::AppError> {
        self.sessions
            .get(id)
            .ok_or_else(|| crate::error::AppError::NotFound(format!("Session {} not found", id)))
    }
}
