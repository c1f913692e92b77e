//! Document repository adapter
//!
//! [`DocumentAdapter`] implements the repository operations on a
//! [`DocumentCollection`]. Writes reach the store immediately. Soft-deleted
//! documents are excluded from [`count`](DocumentAdapter::count) through the
//! collection's soft-delete field, not through a global filter; the relational
//! global-filter toggles have no effect here.

use std::future::Future;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::filter::DocumentFilter;
use super::store::{DocumentCollection, FindOptions};
use crate::cache_key;
use crate::entity::{Document, Entity};
use crate::query::{PagedResult, Paging, QueryConfiguration, SortedRequestParameters};
use crate::repository::{
    cancellable, Compose, RepositoryError, RepositoryOperation, RepositoryResult,
};

static DOCUMENT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,36}$").expect("document id pattern is valid"));

type DocumentOf<C> = <C as DocumentCollection>::Document;

fn to_u32(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Repository operations over a document collection
pub struct DocumentAdapter<C> {
    collection: C,
}

impl<C: DocumentCollection> DocumentAdapter<C> {
    /// Wrap a collection
    pub fn new(collection: C) -> Self {
        Self { collection }
    }

    /// The wrapped collection
    pub fn collection(&self) -> &C {
        &self.collection
    }

    fn validate_id(operation: RepositoryOperation, id: &str) -> RepositoryResult<()> {
        if DOCUMENT_ID.is_match(id) {
            return Ok(());
        }
        Err(
            RepositoryError::validation_failed(operation, "malformed document id")
                .with_entity(DocumentOf::<C>::ENTITY_NAME, id),
        )
    }

    fn by_id(id: &str) -> DocumentFilter {
        DocumentFilter::eq(DocumentOf::<C>::ID_FIELD, id)
    }

    async fn run<T, F>(
        &self,
        operation: RepositoryOperation,
        cancel: &CancellationToken,
        future: F,
    ) -> RepositoryResult<T>
    where
        F: Future<Output = RepositoryResult<T>>,
    {
        cancellable(operation, cancel, future).await.map_err(|e| {
            let e = e.with_operation(operation);
            if e.is_store_error() {
                error!(
                    collection = %self.collection.name(),
                    operation = %operation,
                    error = %e,
                    "document store operation failed"
                );
            }
            e
        })
    }

    fn options(&self, config: &QueryConfiguration, filter: &DocumentFilter) -> FindOptions {
        let options = FindOptions {
            sort: config
                .sort_field()
                .map(|(field, order)| (field.to_string(), order)),
            skip: config.skip(),
            limit: config.take(),
        };
        debug!(
            collection = %self.collection.name(),
            filter = %filter,
            sort = ?options.sort,
            skip = ?options.skip,
            limit = ?options.limit,
            "planning document query"
        );
        options
    }

    /// Documents matching a filter, paged and sorted per configuration
    pub async fn filter_by(
        &self,
        config: &QueryConfiguration,
        filter: &DocumentFilter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<DocumentOf<C>>> {
        let options = self.options(config, filter);
        self.run(
            RepositoryOperation::FilterBy,
            cancel,
            self.collection.find(filter, &options),
        )
        .await
    }

    /// Like [`filter_by`](Self::filter_by), mapping each document to a projection
    pub async fn filter_by_projected<P, F>(
        &self,
        config: &QueryConfiguration,
        filter: &DocumentFilter,
        projection: F,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<P>>
    where
        F: FnMut(DocumentOf<C>) -> P,
    {
        let documents = self.filter_by(config, filter, cancel).await?;
        Ok(documents.into_iter().map(projection).collect())
    }

    /// First document matching a filter, in natural order
    pub async fn find_one(
        &self,
        filter: &DocumentFilter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<DocumentOf<C>>> {
        let options = FindOptions::new().limit(1);
        self.run(RepositoryOperation::FindOne, cancel, async {
            Ok(self.collection.find(filter, &options).await?.into_iter().next())
        })
        .await
    }

    /// Document with the given id
    pub async fn find_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<DocumentOf<C>>> {
        Self::validate_id(RepositoryOperation::FindById, id)?;
        let filter = Self::by_id(id);
        let options = FindOptions::new().limit(1);
        self.run(RepositoryOperation::FindById, cancel, async {
            Ok(self.collection.find(&filter, &options).await?.into_iter().next())
        })
        .await
    }

    /// Insert a document, returning it with its final id
    pub async fn insert_one(
        &self,
        document: DocumentOf<C>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<DocumentOf<C>> {
        if !document.id().is_empty() {
            Self::validate_id(RepositoryOperation::InsertOne, document.id())?;
        }
        self.run(
            RepositoryOperation::InsertOne,
            cancel,
            self.collection.insert_one(document),
        )
        .await
    }

    /// Insert several documents, returning them with their final ids
    pub async fn insert_many(
        &self,
        documents: Vec<DocumentOf<C>>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<DocumentOf<C>>> {
        if documents.is_empty() {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::InsertMany,
                "at least one document is required",
            ));
        }
        for document in documents.iter().filter(|d| !d.id().is_empty()) {
            Self::validate_id(RepositoryOperation::InsertMany, document.id())?;
        }
        self.run(
            RepositoryOperation::InsertMany,
            cancel,
            self.collection.insert_many(documents),
        )
        .await
    }

    /// Replace the stored document with the same id, stamping the modification time
    ///
    /// Fails with a not-found error when no document has that id.
    pub async fn replace_one(
        &self,
        mut document: DocumentOf<C>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<DocumentOf<C>> {
        Self::validate_id(RepositoryOperation::ReplaceOne, document.id())?;
        document.touch(Utc::now());
        let id = document.id().clone();
        self.run(RepositoryOperation::ReplaceOne, cancel, async {
            match self.collection.replace_one(&id, document.clone()).await? {
                Some(_) => Ok(document),
                None => Err(RepositoryError::not_found(DocumentOf::<C>::ENTITY_NAME, id.as_str())
                    .with_operation(RepositoryOperation::ReplaceOne)),
            }
        })
        .await
    }

    /// Remove the first document matching a filter
    pub async fn delete_one(
        &self,
        filter: &DocumentFilter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<DocumentOf<C>>> {
        self.run(
            RepositoryOperation::DeleteOne,
            cancel,
            self.collection.find_one_and_delete(filter),
        )
        .await
    }

    /// Remove the document with the given id
    pub async fn delete_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<DocumentOf<C>>> {
        Self::validate_id(RepositoryOperation::DeleteById, id)?;
        let filter = Self::by_id(id);
        self.run(
            RepositoryOperation::DeleteById,
            cancel,
            self.collection.find_one_and_delete(&filter),
        )
        .await
    }

    /// Remove every document matching a filter
    pub async fn delete_many(
        &self,
        filter: &DocumentFilter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64> {
        let deleted = self
            .run(
                RepositoryOperation::DeleteMany,
                cancel,
                self.collection.delete_many(filter),
            )
            .await?;
        debug!(collection = %self.collection.name(), deleted, "deleted documents");
        Ok(deleted)
    }

    /// Number of documents in the collection
    ///
    /// Unless `include_deleted` is set, documents whose soft-delete field is
    /// `true` are not counted.
    pub async fn count(
        &self,
        include_deleted: bool,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64> {
        self.count_matching(&DocumentFilter::all(), include_deleted, cancel)
            .await
    }

    /// Number of documents matching a filter, soft-delete rule as for [`count`](Self::count)
    pub async fn count_matching(
        &self,
        filter: &DocumentFilter,
        include_deleted: bool,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64> {
        let filter = if include_deleted {
            filter.clone()
        } else {
            filter
                .clone()
                .compose(DocumentFilter::eq(DocumentOf::<C>::SOFT_DELETE_FIELD, false))
        };
        self.run(
            RepositoryOperation::Count,
            cancel,
            self.collection.count_documents(&filter),
        )
        .await
    }

    /// One page of matching documents in natural order
    pub async fn paged_list(
        &self,
        filter: &DocumentFilter,
        page_number: u32,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<DocumentOf<C>>> {
        let paging = Paging::page(u64::from(page_number), u64::from(page_size));
        let options = FindOptions::new().skip(paging.skip).limit(paging.take);
        self.run(
            RepositoryOperation::Paginate,
            cancel,
            self.collection.find(filter, &options),
        )
        .await
    }

    /// One page of matching documents plus the total match count
    ///
    /// The page and the count are two separate store calls; under concurrent
    /// writes the count may not agree with the page contents.
    pub async fn paged_list_with_total(
        &self,
        filter: &DocumentFilter,
        page_number: u32,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> RepositoryResult<PagedResult<DocumentOf<C>>> {
        let paging = Paging::page(u64::from(page_number), u64::from(page_size));
        let options = FindOptions::new().skip(paging.skip).limit(paging.take);
        self.paginate(filter, paging, options, cancel).await
    }

    /// One page shaped by request parameters, sorted when a sort field is given
    pub async fn paged_result(
        &self,
        filter: &DocumentFilter,
        params: &SortedRequestParameters,
        cancel: &CancellationToken,
    ) -> RepositoryResult<PagedResult<DocumentOf<C>>> {
        let paging = Paging::page(
            u64::from(params.page_number()),
            u64::from(params.page_size()),
        );
        let mut options = FindOptions::new().skip(paging.skip).limit(paging.take);
        if let Some(field) = params.sort_order_by() {
            options = options.sort(field, params.sort_order());
        }
        self.paginate(filter, paging, options, cancel).await
    }

    async fn paginate(
        &self,
        filter: &DocumentFilter,
        paging: Paging,
        options: FindOptions,
        cancel: &CancellationToken,
    ) -> RepositoryResult<PagedResult<DocumentOf<C>>> {
        self.run(RepositoryOperation::Paginate, cancel, async {
            let items = self.collection.find(filter, &options).await?;
            let total = self.collection.count_documents(filter).await?;
            let page_number = if paging.take == 0 {
                1
            } else {
                paging.skip / paging.take + 1
            };
            Ok(PagedResult::new(
                items,
                to_u32(page_number),
                to_u32(paging.take),
                total,
            ))
        })
        .await
    }

    /// Cache key for one document of this collection
    pub fn cache_key(&self, id: &str) -> String {
        cache_key::by_key(self.collection.name(), id)
    }

    /// Cache key for a filter query under a configuration
    ///
    /// `None` when there are no filters.
    pub fn query_cache_key(
        &self,
        config: &QueryConfiguration,
        filters: &[DocumentFilter],
    ) -> Option<String> {
        let descriptions: Vec<String> = filters.iter().map(DocumentFilter::describe).collect();
        let (page_number, page_size) = match config.paging {
            Some(paging) if paging.take > 0 => (
                Some(to_u32(paging.skip / paging.take + 1)),
                Some(to_u32(paging.take)),
            ),
            Some(paging) => (Some(1), Some(to_u32(paging.take))),
            None => (None, None),
        };
        let sort = config.sort.as_ref().map(|s| s.order);
        cache_key::by_predicates(&descriptions, page_number, page_size, sort)
            .map(|key| format!("{}:{}", self.collection.name().to_lowercase(), key))
    }
}
