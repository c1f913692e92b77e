//! Document store capability

use std::future::Future;

use super::filter::DocumentFilter;
use crate::entity::Document;
use crate::query::SortOrder;
use crate::repository::RepositoryResult;

/// Sort and window applied to a `find`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Sort field and direction
    pub sort: Option<(String, SortOrder)>,
    /// Documents to skip
    pub skip: Option<u64>,
    /// Maximum documents to return
    pub limit: Option<u64>,
}

impl FindOptions {
    /// No sort, no window
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort by a field
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((field.into(), order));
        self
    }

    /// Skip leading documents
    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Cap the number of documents
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One collection in a document store
///
/// Every operation executes immediately; there is no staging.
pub trait DocumentCollection: Send + Sync {
    /// Document type held in this collection
    type Document: Document;

    /// Collection name, used in logs and cache keys
    fn name(&self) -> &str;

    /// Documents matching a filter
    fn find(
        &self,
        filter: &DocumentFilter,
        options: &FindOptions,
    ) -> impl Future<Output = RepositoryResult<Vec<Self::Document>>> + Send;

    /// Number of documents matching a filter
    fn count_documents(
        &self,
        filter: &DocumentFilter,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Insert a document; one with an empty id receives a generated id
    fn insert_one(
        &self,
        document: Self::Document,
    ) -> impl Future<Output = RepositoryResult<Self::Document>> + Send;

    /// Insert several documents; nothing is inserted if any insert would fail
    fn insert_many(
        &self,
        documents: Vec<Self::Document>,
    ) -> impl Future<Output = RepositoryResult<Vec<Self::Document>>> + Send;

    /// Atomically replace the document with the given id
    ///
    /// The stored replacement always carries `id`, whatever id `document` had.
    /// Returns the replaced document, or `None` when no document has that id.
    fn replace_one(
        &self,
        id: &str,
        document: Self::Document,
    ) -> impl Future<Output = RepositoryResult<Option<Self::Document>>> + Send;

    /// Remove the first document matching a filter and return it
    fn find_one_and_delete(
        &self,
        filter: &DocumentFilter,
    ) -> impl Future<Output = RepositoryResult<Option<Self::Document>>> + Send;

    /// Remove every document matching a filter
    fn delete_many(
        &self,
        filter: &DocumentFilter,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;
}
