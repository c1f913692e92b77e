//! Relational store capability
//!
//! A [`RelationalStore`] is one session against a tabular store: it executes
//! [`QueryPlan`]s and collects staged [`Change`]s until
//! [`save_changes`](RelationalStore::save_changes) commits them.

use std::future::Future;

use crate::entity::Entity;
use crate::query::{QueryConfiguration, SortOrder};
use crate::repository::{Predicate, RepositoryResult};

/// Everything a store needs to execute one query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPlan {
    /// AND-composed caller predicates; `None` matches everything
    pub predicate: Option<Predicate>,
    /// Track returned entities
    pub tracking: bool,
    /// Load related collections in separate round-trips
    pub split_query: bool,
    /// Bypass the store's global filters
    pub ignore_global_filters: bool,
    /// Sort field and direction
    pub sort: Option<(String, SortOrder)>,
    /// Records to skip
    pub skip: Option<u64>,
    /// Maximum records to return
    pub take: Option<u64>,
}

impl QueryPlan {
    /// Plan reflecting a configuration snapshot, without paging
    pub fn from_config(config: &QueryConfiguration, predicate: Option<Predicate>) -> Self {
        Self {
            predicate,
            tracking: !config.no_tracking,
            split_query: config.split_query,
            ignore_global_filters: config.ignore_global_filter,
            sort: config
                .sort_field()
                .map(|(field, order)| (field.to_string(), order)),
            skip: None,
            take: None,
        }
    }

    /// Apply the configuration's skip/take window
    #[must_use]
    pub fn paged(mut self, config: &QueryConfiguration) -> Self {
        self.skip = config.skip();
        self.take = config.take();
        self
    }

    /// Limit the number of returned records
    #[must_use]
    pub fn limit(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }
}

/// A staged modification
#[derive(Debug, Clone, PartialEq)]
pub enum Change<E: Entity> {
    /// New record
    Insert(E),
    /// Full replacement of an existing record
    Update(E),
    /// Removal by key
    Delete(E::Key),
}

/// One session against a relational store
///
/// Reads execute immediately; writes are staged and only reach the store on
/// [`save_changes`](Self::save_changes).
pub trait RelationalStore: Send + Sync {
    /// Entity type stored in this table
    type Entity: Entity;

    /// Name of the table, used in logs and cache keys
    fn name(&self) -> &str;

    /// Keyed lookup
    fn find(
        &self,
        key: &<Self::Entity as Entity>::Key,
        tracking: bool,
    ) -> impl Future<Output = RepositoryResult<Option<Self::Entity>>> + Send;

    /// Execute a query
    fn fetch(
        &self,
        plan: &QueryPlan,
    ) -> impl Future<Output = RepositoryResult<Vec<Self::Entity>>> + Send;

    /// Count records matching a plan; sort and paging are ignored
    fn count(&self, plan: &QueryPlan) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Whether any record matches a plan
    fn any(&self, plan: &QueryPlan) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// Stage a change for the next commit
    fn stage(&self, change: Change<Self::Entity>);

    /// Commit staged changes, returning the number of affected records
    fn save_changes(&self) -> impl Future<Output = RepositoryResult<u64>> + Send;
}
