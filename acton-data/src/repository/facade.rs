//! Repository façade
//!
//! A [`Repository`] pairs one shared adapter with an immutable
//! [`QueryConfiguration`]. Every toggle returns a new façade and leaves the
//! receiver untouched, so a base repository can be handed to concurrent
//! callers and configured per query:
//!
//! ```rust,ignore
//! let customers: RelationalRepository<_> = Repository::new(adapter);
//!
//! let page = customers
//!     .as_no_tracking()
//!     .as_paging(2, 20)
//!     .list(vec![Predicate::eq("status", "active")], &cancel)
//!     .await?;
//!
//! // `customers` still has the default configuration
//! let all = customers.count_all(&cancel).await?;
//! ```
//!
//! A configured façade keeps its configuration across executions; use
//! [`reset`](Repository::reset) to get back to the defaults.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::predicate::Predicate;
use super::traits::RepositoryResult;
use crate::document::{DocumentAdapter, DocumentCollection, DocumentFilter};
use crate::entity::Entity;
use crate::query::{
    PagedResult, QueryConfiguration, RequestParameters, SortOrder, SortParameters,
    SortedRequestParameters,
};
use crate::relational::{RelationalAdapter, RelationalStore};

/// Façade over a relational store session
pub type RelationalRepository<S> = Repository<RelationalAdapter<S>>;

/// Façade over a document collection
pub type DocumentRepository<C> = Repository<DocumentAdapter<C>>;

type EntityOf<S> = <S as RelationalStore>::Entity;
type KeyOf<S> = <<S as RelationalStore>::Entity as Entity>::Key;
type DocumentOf<C> = <C as DocumentCollection>::Document;

/// An adapter plus the configuration applied to its queries
pub struct Repository<A> {
    adapter: Arc<A>,
    config: QueryConfiguration,
}

impl<A> Clone for Repository<A> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            config: self.config.clone(),
        }
    }
}

impl<A> Repository<A> {
    /// Façade with the default configuration
    pub fn new(adapter: A) -> Self {
        Self::shared(Arc::new(adapter))
    }

    /// Façade over an adapter already shared elsewhere
    pub fn shared(adapter: Arc<A>) -> Self {
        Self {
            adapter,
            config: QueryConfiguration::default(),
        }
    }

    /// The wrapped adapter
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The configuration applied to this façade's queries
    pub fn configuration(&self) -> &QueryConfiguration {
        &self.config
    }

    fn with(&self, change: impl FnOnce(QueryConfiguration) -> QueryConfiguration) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            config: change(self.config.clone()),
        }
    }

    /// Returned entities are not tracked
    #[must_use]
    pub fn as_no_tracking(&self) -> Self {
        self.with(QueryConfiguration::as_no_tracking)
    }

    /// Returned entities are tracked
    #[must_use]
    pub fn as_tracking(&self) -> Self {
        self.with(QueryConfiguration::as_tracking)
    }

    /// Load related collections in separate round-trips
    #[must_use]
    pub fn as_split_query(&self) -> Self {
        self.with(QueryConfiguration::as_split_query)
    }

    /// Load related collections in one round-trip
    #[must_use]
    pub fn as_single_query(&self) -> Self {
        self.with(QueryConfiguration::as_single_query)
    }

    /// Bypass the store's global filters
    #[must_use]
    pub fn ignore_global_filters(&self) -> Self {
        self.with(QueryConfiguration::ignore_global_filters)
    }

    /// Apply the store's global filters
    #[must_use]
    pub fn include_global_filter(&self) -> Self {
        self.with(QueryConfiguration::include_global_filter)
    }

    /// Return page `page_number` (1-based) of `page_size` records
    #[must_use]
    pub fn as_paging(&self, page_number: u32, page_size: u32) -> Self {
        self.with(|config| config.as_paging(page_number, page_size))
    }

    /// Page according to request parameters
    #[must_use]
    pub fn as_paging_with(&self, params: &RequestParameters) -> Self {
        self.with(|config| config.as_paging_with(params))
    }

    /// Return every matching record
    #[must_use]
    pub fn without_paging(&self) -> Self {
        self.with(QueryConfiguration::without_paging)
    }

    /// Sort by `by` in `order`; without a field no sort is applied
    #[must_use]
    pub fn as_sorting(&self, order: SortOrder, by: Option<String>) -> Self {
        self.with(|config| config.as_sorting(order, by))
    }

    /// Sort according to request parameters
    #[must_use]
    pub fn as_sorting_with(&self, params: &SortParameters) -> Self {
        let by = params.sort_order_by().map(str::to_string);
        self.with(|config| config.as_sorting(params.sort_order(), by))
    }

    /// Back to the default configuration
    #[must_use]
    pub fn reset(&self) -> Self {
        self.with(|_| QueryConfiguration::default())
    }
}

impl<S: RelationalStore> Repository<RelationalAdapter<S>> {
    /// See [`RelationalAdapter::add`]
    pub async fn add(
        &self,
        entity: EntityOf<S>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<EntityOf<S>> {
        self.adapter.add(entity, cancel).await
    }

    /// See [`RelationalAdapter::add_range`]
    pub async fn add_range(
        &self,
        entities: Vec<EntityOf<S>>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<()> {
        self.adapter.add_range(entities, cancel).await
    }

    /// See [`RelationalAdapter::get_by_id`]
    pub async fn get_by_id(
        &self,
        key: &KeyOf<S>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<EntityOf<S>>> {
        self.adapter.get_by_id(&self.config, key, cancel).await
    }

    /// See [`RelationalAdapter::get_first`]
    pub async fn get_first(
        &self,
        predicates: Vec<Predicate>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<EntityOf<S>>> {
        self.adapter.get_first(&self.config, predicates, cancel).await
    }

    /// See [`RelationalAdapter::get_single`]
    pub async fn get_single(
        &self,
        predicates: Vec<Predicate>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<EntityOf<S>>> {
        self.adapter.get_single(&self.config, predicates, cancel).await
    }

    /// See [`RelationalAdapter::list`]
    pub async fn list(
        &self,
        predicates: Vec<Predicate>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<EntityOf<S>>> {
        self.adapter.list(&self.config, predicates, cancel).await
    }

    /// See [`RelationalAdapter::list_paged`]
    pub async fn list_paged(
        &self,
        predicates: Vec<Predicate>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<PagedResult<EntityOf<S>>> {
        self.adapter.list_paged(&self.config, predicates, cancel).await
    }

    /// See [`RelationalAdapter::update`]
    pub async fn update(
        &self,
        entity: EntityOf<S>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<EntityOf<S>> {
        self.adapter.update(entity, cancel).await
    }

    /// See [`RelationalAdapter::update_range`]
    pub async fn update_range(
        &self,
        entities: Vec<EntityOf<S>>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<()> {
        self.adapter.update_range(entities, cancel).await
    }

    /// See [`RelationalAdapter::update_and_save`]
    pub async fn update_and_save(
        &self,
        entity: EntityOf<S>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<EntityOf<S>> {
        self.adapter.update_and_save(entity, cancel).await
    }

    /// See [`RelationalAdapter::delete`]
    pub async fn delete(&self, key: &KeyOf<S>, cancel: &CancellationToken) -> RepositoryResult<()> {
        self.adapter.delete(key, cancel).await
    }

    /// See [`RelationalAdapter::delete_where`]
    pub async fn delete_where(
        &self,
        predicate: Predicate,
        cancel: &CancellationToken,
    ) -> RepositoryResult<bool> {
        self.adapter.delete_where(&self.config, predicate, cancel).await
    }

    /// See [`RelationalAdapter::remove`]
    pub async fn remove(
        &self,
        entity: &EntityOf<S>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<()> {
        self.adapter.remove(entity, cancel).await
    }

    /// See [`RelationalAdapter::delete_range`]
    pub async fn delete_range(
        &self,
        entities: &[EntityOf<S>],
        cancel: &CancellationToken,
    ) -> RepositoryResult<()> {
        self.adapter.delete_range(entities, cancel).await
    }

    /// See [`RelationalAdapter::count`]
    pub async fn count(
        &self,
        predicates: Vec<Predicate>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64> {
        self.adapter.count(&self.config, predicates, cancel).await
    }

    /// See [`RelationalAdapter::count_all`]
    pub async fn count_all(&self, cancel: &CancellationToken) -> RepositoryResult<u64> {
        self.adapter.count_all(&self.config, cancel).await
    }

    /// `true` iff **no** record matches; see [`RelationalAdapter::is_unique`]
    pub async fn is_unique(
        &self,
        predicates: Vec<Predicate>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<bool> {
        self.adapter.is_unique(&self.config, predicates, cancel).await
    }

    /// See [`RelationalAdapter::save`]
    pub async fn save(&self, cancel: &CancellationToken) -> RepositoryResult<bool> {
        self.adapter.save(cancel).await
    }

    /// See [`RelationalAdapter::cache_key`]
    pub fn cache_key(&self, key: &KeyOf<S>) -> String {
        self.adapter.cache_key(key)
    }

    /// Cache key for a predicate query under this façade's configuration
    pub fn query_cache_key(&self, predicates: &[Predicate]) -> Option<String> {
        self.adapter.query_cache_key(&self.config, predicates)
    }
}

impl<C: DocumentCollection> Repository<DocumentAdapter<C>> {
    /// See [`DocumentAdapter::filter_by`]
    pub async fn filter_by(
        &self,
        filter: &DocumentFilter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<DocumentOf<C>>> {
        self.adapter.filter_by(&self.config, filter, cancel).await
    }

    /// See [`DocumentAdapter::filter_by_projected`]
    pub async fn filter_by_projected<P, F>(
        &self,
        filter: &DocumentFilter,
        projection: F,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<P>>
    where
        F: FnMut(DocumentOf<C>) -> P,
    {
        self.adapter
            .filter_by_projected(&self.config, filter, projection, cancel)
            .await
    }

    /// See [`DocumentAdapter::find_one`]
    pub async fn find_one(
        &self,
        filter: &DocumentFilter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<DocumentOf<C>>> {
        self.adapter.find_one(filter, cancel).await
    }

    /// See [`DocumentAdapter::find_by_id`]
    pub async fn find_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<DocumentOf<C>>> {
        self.adapter.find_by_id(id, cancel).await
    }

    /// See [`DocumentAdapter::insert_one`]
    pub async fn insert_one(
        &self,
        document: DocumentOf<C>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<DocumentOf<C>> {
        self.adapter.insert_one(document, cancel).await
    }

    /// See [`DocumentAdapter::insert_many`]
    pub async fn insert_many(
        &self,
        documents: Vec<DocumentOf<C>>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<DocumentOf<C>>> {
        self.adapter.insert_many(documents, cancel).await
    }

    /// See [`DocumentAdapter::replace_one`]
    pub async fn replace_one(
        &self,
        document: DocumentOf<C>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<DocumentOf<C>> {
        self.adapter.replace_one(document, cancel).await
    }

    /// See [`DocumentAdapter::delete_one`]
    pub async fn delete_one(
        &self,
        filter: &DocumentFilter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<DocumentOf<C>>> {
        self.adapter.delete_one(filter, cancel).await
    }

    /// See [`DocumentAdapter::delete_by_id`]
    pub async fn delete_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<DocumentOf<C>>> {
        self.adapter.delete_by_id(id, cancel).await
    }

    /// See [`DocumentAdapter::delete_many`]
    pub async fn delete_many(
        &self,
        filter: &DocumentFilter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64> {
        self.adapter.delete_many(filter, cancel).await
    }

    /// See [`DocumentAdapter::count`]
    pub async fn count(
        &self,
        include_deleted: bool,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64> {
        self.adapter.count(include_deleted, cancel).await
    }

    /// See [`DocumentAdapter::count_matching`]
    pub async fn count_matching(
        &self,
        filter: &DocumentFilter,
        include_deleted: bool,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64> {
        self.adapter
            .count_matching(filter, include_deleted, cancel)
            .await
    }

    /// See [`DocumentAdapter::paged_list`]
    pub async fn paged_list(
        &self,
        filter: &DocumentFilter,
        page_number: u32,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<DocumentOf<C>>> {
        self.adapter
            .paged_list(filter, page_number, page_size, cancel)
            .await
    }

    /// See [`DocumentAdapter::paged_list_with_total`]
    pub async fn paged_list_with_total(
        &self,
        filter: &DocumentFilter,
        page_number: u32,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> RepositoryResult<PagedResult<DocumentOf<C>>> {
        self.adapter
            .paged_list_with_total(filter, page_number, page_size, cancel)
            .await
    }

    /// See [`DocumentAdapter::paged_result`]
    pub async fn paged_result(
        &self,
        filter: &DocumentFilter,
        params: &SortedRequestParameters,
        cancel: &CancellationToken,
    ) -> RepositoryResult<PagedResult<DocumentOf<C>>> {
        self.adapter.paged_result(filter, params, cancel).await
    }

    /// See [`DocumentAdapter::cache_key`]
    pub fn cache_key(&self, id: &str) -> String {
        self.adapter.cache_key(id)
    }

    /// Cache key for a filter query under this façade's configuration
    pub fn query_cache_key(&self, filters: &[DocumentFilter]) -> Option<String> {
        self.adapter.query_cache_key(&self.config, filters)
    }
}
