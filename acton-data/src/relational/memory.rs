//! In-memory relational store
//!
//! [`MemoryDatabase`] holds the committed rows of one table and can be shared
//! by many [`MemoryContext`] sessions. Each session stages its own changes,
//! keeps an identity map of tracked entities, and applies its registered
//! global filters to every query unless the plan bypasses them.
//!
//! # Example
//!
//! ```rust,ignore
//! let database = MemoryDatabase::<Customer>::new();
//! let context = database
//!     .context("customers")
//!     .with_global_filter(Predicate::eq("is_deleted", false));
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde_json::Value;
use tracing::debug;

use super::store::{Change, QueryPlan, RelationalStore};
use crate::entity::Entity;
use crate::query::SortOrder;
use crate::repository::{Predicate, RepositoryError, RepositoryOperation, RepositoryResult};
use crate::value;

type Rows<E> = BTreeMap<<E as Entity>::Key, E>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Committed rows of one in-memory table
pub struct MemoryDatabase<E: Entity> {
    rows: Arc<RwLock<Rows<E>>>,
}

impl<E: Entity> Clone for MemoryDatabase<E> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<E: Entity> Default for MemoryDatabase<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> MemoryDatabase<E> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Create a table pre-filled with committed rows
    pub fn seeded<I: IntoIterator<Item = E>>(rows: I) -> Self {
        let rows = rows.into_iter().map(|e| (e.id().clone(), e)).collect();
        Self {
            rows: Arc::new(RwLock::new(rows)),
        }
    }

    /// Open a session against this table
    pub fn context(&self, name: impl Into<String>) -> MemoryContext<E> {
        MemoryContext {
            name: name.into(),
            database: self.clone(),
            pending: Mutex::new(Vec::new()),
            tracked: Mutex::new(BTreeMap::new()),
            global_filters: Vec::new(),
            last_plan: Mutex::new(None),
        }
    }

    /// Number of committed rows
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the table holds no committed rows
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Committed row by key
    pub fn get(&self, key: &E::Key) -> Option<E> {
        self.read().get(key).cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Rows<E>> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Rows<E>> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Session over a [`MemoryDatabase`]
pub struct MemoryContext<E: Entity> {
    name: String,
    database: MemoryDatabase<E>,
    pending: Mutex<Vec<Change<E>>>,
    tracked: Mutex<Rows<E>>,
    global_filters: Vec<Predicate>,
    last_plan: Mutex<Option<QueryPlan>>,
}

impl<E: Entity> MemoryContext<E> {
    /// Register a predicate applied to every query unless bypassed
    #[must_use]
    pub fn with_global_filter(mut self, filter: Predicate) -> Self {
        self.global_filters.push(filter);
        self
    }

    /// The plan of the most recent `fetch`, `count` or `any`
    pub fn last_plan(&self) -> Option<QueryPlan> {
        lock(&self.last_plan).clone()
    }

    /// Number of changes waiting for commit
    pub fn pending_changes(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Whether an entity is held in the identity map
    pub fn is_tracked(&self, key: &E::Key) -> bool {
        lock(&self.tracked).contains_key(key)
    }

    /// Number of entities held in the identity map
    pub fn tracked_count(&self) -> usize {
        lock(&self.tracked).len()
    }

    fn track(&self, entities: &[E]) {
        let mut tracked = lock(&self.tracked);
        for entity in entities {
            tracked.insert(entity.id().clone(), entity.clone());
        }
    }

    fn effective_predicate(&self, plan: &QueryPlan) -> Option<Predicate> {
        let mut parts = Vec::new();
        if !plan.ignore_global_filters {
            parts.extend(self.global_filters.iter().cloned());
        }
        parts.extend(plan.predicate.clone());
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Predicate::And(parts)),
        }
    }

    fn matching(&self, plan: &QueryPlan) -> RepositoryResult<Vec<(E, Value)>> {
        *lock(&self.last_plan) = Some(plan.clone());
        let predicate = self.effective_predicate(plan);
        let rows = self.database.read();
        let mut matched = Vec::new();
        for entity in rows.values() {
            let record = serde_json::to_value(entity).map_err(|e| {
                RepositoryError::serialization(RepositoryOperation::List, e.to_string())
                    .with_entity(E::ENTITY_NAME, entity.id().to_string())
            })?;
            if predicate.as_ref().map_or(true, |p| p.matches(&record)) {
                matched.push((entity.clone(), record));
            }
        }
        Ok(matched)
    }

    fn staged(&self, key: &E::Key) -> Option<Option<E>> {
        lock(&self.pending)
            .iter()
            .rev()
            .find_map(|change| match change {
                Change::Insert(e) | Change::Update(e) if e.id() == key => Some(Some(e.clone())),
                Change::Delete(k) if k == key => Some(None),
                _ => None,
            })
    }
}

impl<E: Entity> RelationalStore for MemoryContext<E> {
    type Entity = E;

    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, key: &E::Key, tracking: bool) -> RepositoryResult<Option<E>> {
        let found = match self.staged(key) {
            Some(staged) => staged,
            None => self.database.get(key),
        };
        if tracking {
            if let Some(entity) = &found {
                self.track(std::slice::from_ref(entity));
            }
        }
        Ok(found)
    }

    async fn fetch(&self, plan: &QueryPlan) -> RepositoryResult<Vec<E>> {
        let mut matched = self.matching(plan)?;
        if let Some((field, order)) = &plan.sort {
            matched.sort_by(|(_, a), (_, b)| {
                let ordering = value::sort_order(value::lookup(a, field), value::lookup(b, field));
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }
        let skip = usize::try_from(plan.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let take = plan
            .take
            .map_or(usize::MAX, |t| usize::try_from(t).unwrap_or(usize::MAX));
        let entities: Vec<E> = matched
            .into_iter()
            .map(|(entity, _)| entity)
            .skip(skip)
            .take(take)
            .collect();
        if plan.tracking {
            self.track(&entities);
        }
        debug!(
            store = %self.name,
            rows = entities.len(),
            tracking = plan.tracking,
            split_query = plan.split_query,
            "memory fetch"
        );
        Ok(entities)
    }

    async fn count(&self, plan: &QueryPlan) -> RepositoryResult<u64> {
        Ok(self.matching(plan)?.len() as u64)
    }

    async fn any(&self, plan: &QueryPlan) -> RepositoryResult<bool> {
        Ok(!self.matching(plan)?.is_empty())
    }

    fn stage(&self, change: Change<E>) {
        lock(&self.pending).push(change);
    }

    async fn save_changes(&self) -> RepositoryResult<u64> {
        let mut pending = lock(&self.pending);
        if pending.is_empty() {
            return Ok(0);
        }
        let mut rows = self.database.write();
        let mut next = rows.clone();
        let mut affected = 0_u64;
        for change in pending.iter() {
            match change {
                Change::Insert(entity) => {
                    if next.contains_key(entity.id()) {
                        return Err(RepositoryError::store(
                            RepositoryOperation::Save,
                            "duplicate key",
                        )
                        .with_entity(E::ENTITY_NAME, entity.id().to_string()));
                    }
                    next.insert(entity.id().clone(), entity.clone());
                }
                Change::Update(entity) => {
                    if next.insert(entity.id().clone(), entity.clone()).is_none() {
                        return Err(RepositoryError::store(
                            RepositoryOperation::Save,
                            "updated record does not exist",
                        )
                        .with_entity(E::ENTITY_NAME, entity.id().to_string()));
                    }
                }
                Change::Delete(key) => {
                    if next.remove(key).is_none() {
                        return Err(RepositoryError::store(
                            RepositoryOperation::Save,
                            "deleted record does not exist",
                        )
                        .with_entity(E::ENTITY_NAME, key.to_string()));
                    }
                    lock(&self.tracked).remove(key);
                }
            }
            affected += 1;
        }
        *rows = next;
        pending.clear();
        debug!(store = %self.name, affected, "memory save");
        Ok(affected)
    }
}
