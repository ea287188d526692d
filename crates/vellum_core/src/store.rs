//! The document store: orchestration of live map, indexes, versions, and
//! persistence under one consistency discipline.

use crate::config::Config;
use crate::dir::StoreDir;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::index::IndexManager;
use crate::persist::Persistence;
use crate::query::Filter;
use crate::value::Fields;
use crate::version::VersionLog;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// In-memory store for schemaless entities with automatic indexing,
/// version history, and optional WAL + snapshot persistence.
///
/// Every mutation runs to completion before the next one begins: mutating
/// methods take `&mut self`, so the single-writer model is enforced at
/// compile time. Each mutation obtains one timestamp and routes through
/// the index manager, the version log, and (when persistent) the WAL, in
/// that order; a WAL I/O error propagates after the in-memory change has
/// taken effect, and replay is idempotent for the final state.
#[derive(Debug)]
pub struct DocumentStore {
    live: BTreeMap<String, Entity>,
    indexes: IndexManager,
    versions: VersionLog,
    persistence: Option<Persistence>,
    last_timestamp: i64,
}

impl DocumentStore {
    /// Creates a purely in-memory store: no WAL, no snapshot.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            live: BTreeMap::new(),
            indexes: IndexManager::new(),
            versions: VersionLog::new(),
            persistence: None,
            last_timestamp: 0,
        }
    }

    /// Opens a persistent store in `base_dir` with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or locked, or if
    /// the persisted state cannot be read.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_config(Config::new().base_dir(base_dir))
    }

    /// Opens a store per `config`.
    ///
    /// With a base directory set this loads the snapshot and WAL,
    /// bootstraps the version history from the replay feed, and re-indexes
    /// every recovered entity. Without one the store is in-memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or locked, or if
    /// the persisted state cannot be read.
    pub fn open_with_config(config: Config) -> Result<Self> {
        let mut store = Self::in_memory();
        let Some(base_dir) = &config.base_dir else {
            return Ok(store);
        };

        let dir = StoreDir::open(base_dir, config.create_if_missing)?;
        let persistence = Persistence::new(dir, config.sync_on_append);
        let state = persistence.load()?;

        store.versions.bootstrap(&state.feed);
        store.last_timestamp = state.feed.last().map_or(0, |record| record.timestamp);
        for (id, fields) in state.entities {
            let entity = Entity::new(id, fields);
            store.indexes.index(&entity);
            store.live.insert(entity.id().to_string(), entity);
        }
        store.persistence = Some(persistence);
        info!(
            path = %base_dir.display(),
            entities = store.live.len(),
            "opened document store"
        );
        Ok(store)
    }

    /// Inserts an entity, overwriting any existing entity with the same id.
    ///
    /// The store owns the entity after insert; the previous state (if any)
    /// is de-indexed first, and the mutation is recorded in history and
    /// the WAL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty id, or the I/O
    /// error of the WAL append (the in-memory state is already updated).
    pub fn insert(&mut self, entity: Entity) -> Result<()> {
        if entity.id().is_empty() {
            return Err(Error::invalid_argument("entity id must be non-empty"));
        }
        let timestamp = self.next_timestamp();
        if let Some(old) = self.live.remove(entity.id()) {
            self.indexes.remove(&old);
        }
        self.indexes.index(&entity);
        self.versions.record_insert(&entity, timestamp);
        let id = entity.id().to_string();
        self.live.insert(id.clone(), entity);
        if let (Some(persistence), Some(entity)) = (&self.persistence, self.live.get(&id)) {
            persistence.append_insert(entity, timestamp)?;
        }
        Ok(())
    }

    /// Replaces the fields of `id` entirely (creating it if absent).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty id, or the I/O
    /// error of the WAL append.
    pub fn update(&mut self, id: &str, fields: Fields) -> Result<()> {
        if id.is_empty() {
            return Err(Error::invalid_argument("entity id must be non-empty"));
        }
        let timestamp = self.next_timestamp();
        if let Some(old) = self.live.remove(id) {
            self.indexes.remove(&old);
        }
        let entity = Entity::new(id, fields);
        self.indexes.index(&entity);
        self.versions.record_update(id, entity.fields(), timestamp);
        self.live.insert(id.to_string(), entity);
        if let (Some(persistence), Some(entity)) = (&self.persistence, self.live.get(id)) {
            persistence.append_update(id, entity.fields(), timestamp)?;
        }
        Ok(())
    }

    /// Merges `delta` into the current fields of `id` (delta wins per key)
    /// and applies the result as a full update.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty id, or the I/O
    /// error of the WAL append.
    pub fn update_partial(&mut self, id: &str, delta: Fields) -> Result<()> {
        if id.is_empty() {
            return Err(Error::invalid_argument("entity id must be non-empty"));
        }
        let mut merged = self
            .live
            .get(id)
            .map(|entity| entity.fields().clone())
            .unwrap_or_default();
        for (key, value) in delta {
            merged.insert(key, value);
        }
        self.update(id, merged)
    }

    /// Deletes `id` if live; deleting an unknown id succeeds and records
    /// nothing.
    ///
    /// History is never pruned: a later insert of the same id appends to
    /// the existing history rather than replacing it.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the WAL append.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let Some(entity) = self.live.remove(id) else {
            return Ok(());
        };
        let timestamp = self.next_timestamp();
        self.indexes.remove(&entity);
        self.versions.record_delete(id, timestamp);
        if let Some(persistence) = &self.persistence {
            persistence.append_delete(id, timestamp)?;
        }
        Ok(())
    }

    /// Evaluates a filter and returns the matching live entities, in
    /// unspecified order.
    #[must_use]
    pub fn query(&self, filter: &Filter) -> Vec<&Entity> {
        let ids = filter.evaluate(&self.indexes, self);
        ids.iter().filter_map(|id| self.live.get(id)).collect()
    }

    /// Returns the live entity with the given id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.live.get(id)
    }

    /// Iterates over all live entities.
    pub fn find_all(&self) -> impl Iterator<Item = &Entity> {
        self.live.values()
    }

    /// Iterates over all live entity ids.
    pub fn all_ids(&self) -> impl Iterator<Item = &str> {
        self.live.keys().map(String::as_str)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns true if no entities are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Returns the index manager, for evaluating pre-built filters.
    #[must_use]
    pub fn indexes(&self) -> &IndexManager {
        &self.indexes
    }

    /// Returns the entity state of `id` as of `timestamp`, or `None` if it
    /// did not exist or was deleted at that time.
    #[must_use]
    pub fn get_at(&self, id: &str, timestamp: i64) -> Option<Entity> {
        self.versions
            .get_at(id, timestamp)
            .map(|fields| Entity::new(id, fields))
    }

    /// Returns every entity live at `timestamp`, reconstructed from
    /// history.
    #[must_use]
    pub fn snapshot_at(&self, timestamp: i64) -> Vec<Entity> {
        self.versions
            .snapshot_at(timestamp)
            .into_iter()
            .map(|(id, fields)| Entity::new(id, fields))
            .collect()
    }

    /// Returns the full version history of `id`, each version annotated
    /// with `_timestamp` and `_deleted`.
    #[must_use]
    pub fn history(&self, id: &str) -> Vec<Fields> {
        self.versions.history(id)
    }

    /// Writes the live map to the snapshot file and truncates the WAL.
    ///
    /// A no-op for in-memory stores.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the snapshot write or WAL unlink.
    pub fn save_snapshot(&self) -> Result<()> {
        if let Some(persistence) = &self.persistence {
            persistence.save_snapshot(self.live.values())?;
        }
        Ok(())
    }

    /// One timestamp per mutation, clamped so successive mutations are
    /// non-decreasing even if the wall clock steps backwards. The same
    /// value goes to both the version log and the WAL.
    fn next_timestamp(&mut self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0);
        self.last_timestamp = self.last_timestamp.max(now);
        self.last_timestamp
    }
}
