//! Relational repository adapter
//!
//! [`RelationalAdapter`] implements the repository operations on top of any
//! [`RelationalStore`]. It never holds query configuration itself: every query
//! receives a [`QueryConfiguration`] snapshot, reads it, and leaves it as it
//! was. Writes are staged on the store session and committed by
//! [`save`](RelationalAdapter::save).

use std::future::Future;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::store::{Change, QueryPlan, RelationalStore};
use crate::cache_key;
use crate::entity::{Entity, EntityKey};
use crate::query::{PagedResult, Paging, QueryConfiguration, DEFAULT_PAGE_SIZE};
use crate::repository::{
    cancellable, Compose, Predicate, RepositoryError, RepositoryOperation, RepositoryResult,
};

type EntityOf<S> = <S as RelationalStore>::Entity;
type KeyOf<S> = <<S as RelationalStore>::Entity as Entity>::Key;

fn describe(predicate: Option<&Predicate>) -> String {
    predicate.map_or_else(|| "TRUE".to_string(), ToString::to_string)
}

fn to_u32(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Repository operations over a relational store session
pub struct RelationalAdapter<S> {
    store: S,
}

impl<S: RelationalStore> RelationalAdapter<S> {
    /// Wrap a store session
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The wrapped store session
    pub fn store(&self) -> &S {
        &self.store
    }

    fn validate_key(operation: RepositoryOperation, key: &KeyOf<S>) -> RepositoryResult<()> {
        key.validate().map_err(|reason| {
            RepositoryError::validation_failed(operation, reason)
                .with_entity(EntityOf::<S>::ENTITY_NAME, key.to_string())
        })
    }

    fn require_non_empty<T>(operation: RepositoryOperation, items: &[T]) -> RepositoryResult<()> {
        if items.is_empty() {
            return Err(RepositoryError::validation_failed(
                operation,
                "at least one entity is required",
            ));
        }
        Ok(())
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
                    store = %self.store.name(),
                    operation = %operation,
                    error = %e,
                    "relational store operation failed"
                );
            }
            e
        })
    }

    fn plan(&self, config: &QueryConfiguration, predicates: Vec<Predicate>) -> QueryPlan {
        let plan = QueryPlan::from_config(config, Predicate::compose_all(predicates));
        debug!(
            store = %self.store.name(),
            tracking = plan.tracking,
            split_query = plan.split_query,
            ignore_global_filters = plan.ignore_global_filters,
            predicate = %describe(plan.predicate.as_ref()),
            "planning relational query"
        );
        plan
    }

    /// Stage an insert
    pub async fn add(
        &self,
        entity: EntityOf<S>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<EntityOf<S>> {
        Self::validate_key(RepositoryOperation::Add, entity.id())?;
        self.run(RepositoryOperation::Add, cancel, async {
            self.store.stage(Change::Insert(entity.clone()));
            Ok(entity)
        })
        .await
    }

    /// Stage several inserts
    pub async fn add_range(
        &self,
        entities: Vec<EntityOf<S>>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<()> {
        Self::require_non_empty(RepositoryOperation::AddRange, &entities)?;
        for entity in &entities {
            Self::validate_key(RepositoryOperation::AddRange, entity.id())?;
        }
        self.run(RepositoryOperation::AddRange, cancel, async {
            for entity in entities {
                self.store.stage(Change::Insert(entity));
            }
            Ok(())
        })
        .await
    }

    /// Keyed lookup honoring the tracking toggle
    pub async fn get_by_id(
        &self,
        config: &QueryConfiguration,
        key: &KeyOf<S>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<EntityOf<S>>> {
        Self::validate_key(RepositoryOperation::GetById, key)?;
        self.run(
            RepositoryOperation::GetById,
            cancel,
            self.store.find(key, !config.no_tracking),
        )
        .await
    }

    /// First record matching every predicate
    pub async fn get_first(
        &self,
        config: &QueryConfiguration,
        predicates: Vec<Predicate>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<EntityOf<S>>> {
        let plan = self.plan(config, predicates).limit(1);
        self.run(RepositoryOperation::GetFirst, cancel, async {
            Ok(self.store.fetch(&plan).await?.into_iter().next())
        })
        .await
    }

    /// The only record matching every predicate
    ///
    /// Fails with a consistency error when more than one record matches.
    pub async fn get_single(
        &self,
        config: &QueryConfiguration,
        predicates: Vec<Predicate>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<EntityOf<S>>> {
        let plan = self.plan(config, predicates).limit(2);
        self.run(RepositoryOperation::GetSingle, cancel, async {
            let mut rows = self.store.fetch(&plan).await?;
            if rows.len() > 1 {
                return Err(RepositoryError::consistency(
                    RepositoryOperation::GetSingle,
                    format!(
                        "more than one {} matches {}",
                        EntityOf::<S>::ENTITY_NAME,
                        describe(plan.predicate.as_ref())
                    ),
                ));
            }
            Ok(rows.pop())
        })
        .await
    }

    /// Records matching every predicate, paged and sorted per configuration
    pub async fn list(
        &self,
        config: &QueryConfiguration,
        predicates: Vec<Predicate>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<EntityOf<S>>> {
        let plan = self.plan(config, predicates).paged(config);
        self.run(RepositoryOperation::List, cancel, self.store.fetch(&plan))
            .await
    }

    /// One page of matching records plus the total match count
    ///
    /// The page and the count are two separate store calls; under concurrent
    /// writes the count may not agree with the page contents. Without a
    /// configured paging window the first page of the default size is returned.
    pub async fn list_paged(
        &self,
        config: &QueryConfiguration,
        predicates: Vec<Predicate>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<PagedResult<EntityOf<S>>> {
        let paging = config
            .paging
            .unwrap_or_else(|| Paging::page(1, u64::from(DEFAULT_PAGE_SIZE)));
        let config = QueryConfiguration {
            paging: Some(paging),
            ..config.clone()
        };
        let plan = self.plan(&config, predicates);
        let paged_plan = plan.clone().paged(&config);
        self.run(RepositoryOperation::Paginate, cancel, async {
            let items = self.store.fetch(&paged_plan).await?;
            let total = self.store.count(&plan).await?;
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

    /// Stage a full replace, stamping the modification time
    pub async fn update(
        &self,
        mut entity: EntityOf<S>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<EntityOf<S>> {
        Self::validate_key(RepositoryOperation::Update, entity.id())?;
        self.run(RepositoryOperation::Update, cancel, async {
            entity.touch(Utc::now());
            self.store.stage(Change::Update(entity.clone()));
            Ok(entity)
        })
        .await
    }

    /// Stage several replaces
    pub async fn update_range(
        &self,
        entities: Vec<EntityOf<S>>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<()> {
        Self::require_non_empty(RepositoryOperation::UpdateRange, &entities)?;
        for entity in &entities {
            Self::validate_key(RepositoryOperation::UpdateRange, entity.id())?;
        }
        self.run(RepositoryOperation::UpdateRange, cancel, async {
            let now = Utc::now();
            for mut entity in entities {
                entity.touch(now);
                self.store.stage(Change::Update(entity));
            }
            Ok(())
        })
        .await
    }

    /// Replace and commit immediately, returning the persisted entity
    pub async fn update_and_save(
        &self,
        entity: EntityOf<S>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<EntityOf<S>> {
        let updated = self.update(entity, cancel).await?;
        self.run(RepositoryOperation::Update, cancel, self.store.save_changes())
            .await?;
        Ok(updated)
    }

    /// Stage removal of the record with `key`
    ///
    /// Fails with not-found when no such record exists.
    pub async fn delete(&self, key: &KeyOf<S>, cancel: &CancellationToken) -> RepositoryResult<()> {
        Self::validate_key(RepositoryOperation::Delete, key)?;
        self.run(RepositoryOperation::Delete, cancel, async {
            match self.store.find(key, false).await? {
                Some(_) => {
                    self.store.stage(Change::Delete(key.clone()));
                    Ok(())
                }
                None => Err(RepositoryError::not_found(
                    EntityOf::<S>::ENTITY_NAME,
                    key.to_string(),
                )),
            }
        })
        .await
    }

    /// Stage removal of the first record matching `predicate`, if any
    ///
    /// Returns whether a record was staged for removal.
    pub async fn delete_where(
        &self,
        config: &QueryConfiguration,
        predicate: Predicate,
        cancel: &CancellationToken,
    ) -> RepositoryResult<bool> {
        let plan = self.plan(config, vec![predicate]).limit(1);
        self.run(RepositoryOperation::Delete, cancel, async {
            match self.store.fetch(&plan).await?.into_iter().next() {
                Some(entity) => {
                    self.store.stage(Change::Delete(entity.id().clone()));
                    Ok(true)
                }
                None => Ok(false),
            }
        })
        .await
    }

    /// Stage removal of a loaded entity
    pub async fn remove(
        &self,
        entity: &EntityOf<S>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<()> {
        Self::validate_key(RepositoryOperation::Delete, entity.id())?;
        self.run(RepositoryOperation::Delete, cancel, async {
            self.store.stage(Change::Delete(entity.id().clone()));
            Ok(())
        })
        .await
    }

    /// Stage removal of several loaded entities
    pub async fn delete_range(
        &self,
        entities: &[EntityOf<S>],
        cancel: &CancellationToken,
    ) -> RepositoryResult<()> {
        Self::require_non_empty(RepositoryOperation::DeleteRange, entities)?;
        self.run(RepositoryOperation::DeleteRange, cancel, async {
            for entity in entities {
                self.store.stage(Change::Delete(entity.id().clone()));
            }
            Ok(())
        })
        .await
    }

    /// Number of records matching every predicate
    pub async fn count(
        &self,
        config: &QueryConfiguration,
        predicates: Vec<Predicate>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64> {
        let plan = self.plan(config, predicates);
        self.run(RepositoryOperation::Count, cancel, self.store.count(&plan))
            .await
    }

    /// Number of records visible under the configuration
    pub async fn count_all(
        &self,
        config: &QueryConfiguration,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64> {
        self.count(config, Vec::new(), cancel).await
    }

    /// `true` iff **no** record matches every predicate
    ///
    /// Note the inverted sense: this answers "is the value still free", not
    /// "does a matching record exist".
    pub async fn is_unique(
        &self,
        config: &QueryConfiguration,
        predicates: Vec<Predicate>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<bool> {
        let plan = self.plan(config, predicates);
        self.run(RepositoryOperation::IsUnique, cancel, async {
            Ok(!self.store.any(&plan).await?)
        })
        .await
    }

    /// Commit staged changes; `true` when any record was affected
    pub async fn save(&self, cancel: &CancellationToken) -> RepositoryResult<bool> {
        let affected = self
            .run(RepositoryOperation::Save, cancel, self.store.save_changes())
            .await?;
        debug!(store = %self.store.name(), affected, "saved relational changes");
        Ok(affected > 0)
    }

    /// Cache key for one record of this store
    pub fn cache_key(&self, key: &KeyOf<S>) -> String {
        cache_key::by_key(self.store.name(), key)
    }

    /// Cache key for a predicate query under a configuration
    ///
    /// `None` when there are no predicates.
    pub fn query_cache_key(
        &self,
        config: &QueryConfiguration,
        predicates: &[Predicate],
    ) -> Option<String> {
        let descriptions: Vec<String> = predicates.iter().map(ToString::to_string).collect();
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
            .map(|key| format!("{}:{}", self.store.name().to_lowercase(), key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortOrder;
    use crate::relational::{MemoryContext, MemoryDatabase};
    use crate::repository::{FilterCondition, RepositoryErrorKind};
    use chrono::{DateTime, Duration, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Product {
        id: i64,
        sku: String,
        price: i64,
        is_deleted: bool,
        created_on: DateTime<Utc>,
        last_modified: Option<DateTime<Utc>>,
    }

    impl Entity for Product {
        type Key = i64;
        const ENTITY_NAME: &'static str = "Product";

        fn id(&self) -> &i64 {
            &self.id
        }
        fn created_on(&self) -> DateTime<Utc> {
            self.created_on
        }
        fn last_modified(&self) -> Option<DateTime<Utc>> {
            self.last_modified
        }
        fn touch(&mut self, at: DateTime<Utc>) {
            self.last_modified = Some(at);
        }
    }

    fn product(id: i64) -> Product {
        Product {
            id,
            sku: format!("SKU-{id:03}"),
            price: id * 10,
            is_deleted: false,
            created_on: Utc::now() - Duration::days(id),
            last_modified: None,
        }
    }

    fn adapter_with(count: i64) -> RelationalAdapter<MemoryContext<Product>> {
        let database = MemoryDatabase::seeded((1..=count).map(product));
        RelationalAdapter::new(database.context("Products"))
    }

    #[tokio::test]
    async fn test_add_get_delete_scenario() {
        let adapter = adapter_with(0);
        let cancel = CancellationToken::new();
        let config = QueryConfiguration::default();

        adapter.add(product(42), &cancel).await.unwrap();
        assert!(adapter.save(&cancel).await.unwrap());
        let found = adapter.get_by_id(&config, &42, &cancel).await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(42));

        adapter.delete(&42, &cancel).await.unwrap();
        assert!(adapter.save(&cancel).await.unwrap());
        assert!(adapter.get_by_id(&config, &42, &cancel).await.unwrap().is_none());

        let error = adapter.delete(&42, &cancel).await.unwrap_err();
        assert_eq!(error.kind, RepositoryErrorKind::NotFound);
        assert_eq!(error.operation, RepositoryOperation::Delete);
        assert_eq!(error.entity_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_list_second_page_of_twelve() {
        let adapter = adapter_with(12);
        let cancel = CancellationToken::new();
        let config = QueryConfiguration::default().as_paging(2, 5);
        let page = adapter.list(&config, Vec::new(), &cancel).await.unwrap();
        let ids: Vec<i64> = page.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![6, 7, 8, 9, 10]);
    }

    #[tokio::test]
    async fn test_list_paging_offsets_for_many_pages() {
        let adapter = adapter_with(23);
        let cancel = CancellationToken::new();
        for size in 1..=7_u32 {
            for page in 1..=5_u32 {
                let config = QueryConfiguration::default().as_paging(page, size);
                let rows = adapter.list(&config, Vec::new(), &cancel).await.unwrap();
                let offset = i64::from((page - 1) * size);
                let expected: Vec<i64> = (offset + 1..=23)
                    .take(size as usize)
                    .collect();
                let ids: Vec<i64> = rows.iter().map(|p| p.id).collect();
                assert!(rows.len() <= size as usize);
                assert_eq!(ids, expected);
            }
        }
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let adapter = adapter_with(5);
        let cancel = CancellationToken::new();
        let config = QueryConfiguration::default()
            .as_sorting(SortOrder::Desc, Some("price".to_string()))
            .as_paging(1, 2);
        let rows = adapter.list(&config, Vec::new(), &cancel).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![5, 4]);
    }

    #[tokio::test]
    async fn test_list_with_predicates() {
        let adapter = adapter_with(10);
        let cancel = CancellationToken::new();
        let rows = adapter
            .list(
                &QueryConfiguration::default(),
                vec![
                    FilterCondition::gt("price", 30).into(),
                    FilterCondition::lte("price", 60).into(),
                ],
                &cancel,
            )
            .await
            .unwrap();
        let ids: Vec<i64> = rows.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn test_get_first_and_single() {
        let adapter = adapter_with(5);
        let cancel = CancellationToken::new();
        let config = QueryConfiguration::default();

        let first = adapter
            .get_first(&config, vec![FilterCondition::gt("price", 20).into()], &cancel)
            .await
            .unwrap();
        assert_eq!(first.map(|p| p.id), Some(3));

        let single = adapter
            .get_single(&config, vec![Predicate::eq("sku", "SKU-004")], &cancel)
            .await
            .unwrap();
        assert_eq!(single.map(|p| p.id), Some(4));

        let none = adapter
            .get_single(&config, vec![Predicate::eq("sku", "nope")], &cancel)
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_get_single_rejects_multiple_matches() {
        let adapter = adapter_with(5);
        let cancel = CancellationToken::new();
        let error = adapter
            .get_single(
                &QueryConfiguration::default(),
                vec![FilterCondition::gt("price", 10).into()],
                &cancel,
            )
            .await
            .unwrap_err();
        assert_eq!(error.kind, RepositoryErrorKind::Consistency);
        assert_eq!(error.operation, RepositoryOperation::GetSingle);
    }

    #[tokio::test]
    async fn test_count_and_is_unique() {
        let adapter = adapter_with(6);
        let cancel = CancellationToken::new();
        let config = QueryConfiguration::default();

        assert_eq!(adapter.count_all(&config, &cancel).await.unwrap(), 6);
        assert_eq!(
            adapter
                .count(&config, vec![FilterCondition::gte("price", 40).into()], &cancel)
                .await
                .unwrap(),
            3
        );

        assert!(!adapter
            .is_unique(&config, vec![Predicate::eq("sku", "SKU-001")], &cancel)
            .await
            .unwrap());
        assert!(adapter
            .is_unique(&config, vec![Predicate::eq("sku", "SKU-999")], &cancel)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_range_operations_validate_input() {
        let adapter = adapter_with(0);
        let cancel = CancellationToken::new();
        for error in [
            adapter.add_range(Vec::new(), &cancel).await.unwrap_err(),
            adapter.update_range(Vec::new(), &cancel).await.unwrap_err(),
            adapter.delete_range(&[], &cancel).await.unwrap_err(),
        ] {
            assert_eq!(error.kind, RepositoryErrorKind::ValidationFailed);
        }
        assert_eq!(adapter.store().pending_changes(), 0);
    }

    #[tokio::test]
    async fn test_update_touches_and_save_persists() {
        let adapter = adapter_with(3);
        let cancel = CancellationToken::new();
        let mut changed = product(2);
        changed.price = 999;

        let saved = adapter.update_and_save(changed, &cancel).await.unwrap();
        assert!(saved.last_modified.is_some());

        let stored = adapter
            .get_by_id(&QueryConfiguration::default(), &2, &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.price, 999);
        assert!(stored.last_modified.is_some());
    }

    #[tokio::test]
    async fn test_range_add_update_delete() {
        let adapter = adapter_with(0);
        let cancel = CancellationToken::new();
        let config = QueryConfiguration::default();

        adapter
            .add_range(vec![product(1), product(2), product(3)], &cancel)
            .await
            .unwrap();
        assert!(adapter.save(&cancel).await.unwrap());
        assert_eq!(adapter.count_all(&config, &cancel).await.unwrap(), 3);

        let mut rows = adapter.list(&config, Vec::new(), &cancel).await.unwrap();
        for row in &mut rows {
            row.price += 1;
        }
        adapter.update_range(rows.clone(), &cancel).await.unwrap();
        assert!(adapter.save(&cancel).await.unwrap());
        let updated = adapter.list(&config, Vec::new(), &cancel).await.unwrap();
        assert!(updated.iter().all(|p| p.price % 10 == 1));

        adapter.delete_range(&updated[..2], &cancel).await.unwrap();
        adapter.save(&cancel).await.unwrap();
        assert_eq!(adapter.count_all(&config, &cancel).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_where_and_remove() {
        let adapter = adapter_with(4);
        let cancel = CancellationToken::new();
        let config = QueryConfiguration::default();

        assert!(adapter
            .delete_where(&config, Predicate::eq("sku", "SKU-002"), &cancel)
            .await
            .unwrap());
        assert!(!adapter
            .delete_where(&config, Predicate::eq("sku", "missing"), &cancel)
            .await
            .unwrap());
        let third = product(3);
        adapter.remove(&third, &cancel).await.unwrap();
        adapter.save(&cancel).await.unwrap();

        let ids: Vec<i64> = adapter
            .list(&config, Vec::new(), &cancel)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[tokio::test]
    async fn test_save_without_changes_returns_false() {
        let adapter = adapter_with(2);
        let cancel = CancellationToken::new();
        assert!(!adapter.save(&cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_paged() {
        let adapter = adapter_with(12);
        let cancel = CancellationToken::new();
        let config = QueryConfiguration::default().as_paging(3, 5);
        let page = adapter.list_paged(&config, Vec::new(), &cancel).await.unwrap();
        assert_eq!(page.page_number, 3);
        assert_eq!(page.page_size, 5);
        assert_eq!(page.total_records, 12);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 2);

        let unpaged = adapter
            .list_paged(&QueryConfiguration::default(), Vec::new(), &cancel)
            .await
            .unwrap();
        assert_eq!(unpaged.page_number, 1);
        assert_eq!(unpaged.items.len(), 10);
    }

    #[tokio::test]
    async fn test_no_tracking_skips_identity_map() {
        let adapter = adapter_with(3);
        let cancel = CancellationToken::new();
        let config = QueryConfiguration::default().as_no_tracking();
        adapter.list(&config, Vec::new(), &cancel).await.unwrap();
        adapter.get_by_id(&config, &1, &cancel).await.unwrap();
        assert_eq!(adapter.store().tracked_count(), 0);

        adapter
            .get_by_id(&QueryConfiguration::default(), &1, &cancel)
            .await
            .unwrap();
        assert!(adapter.store().is_tracked(&1));
    }

    #[tokio::test]
    async fn test_plan_carries_toggles_to_store() {
        let adapter = adapter_with(3);
        let cancel = CancellationToken::new();
        let config = QueryConfiguration::default()
            .as_split_query()
            .ignore_global_filters();
        adapter.list(&config, Vec::new(), &cancel).await.unwrap();
        let plan = adapter.store().last_plan().unwrap();
        assert!(plan.split_query);
        assert!(plan.ignore_global_filters);
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_before_io() {
        let adapter = adapter_with(3);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = adapter
            .list(&QueryConfiguration::default(), Vec::new(), &cancel)
            .await
            .unwrap_err();
        assert!(error.is_cancelled());
        assert!(adapter.store().last_plan().is_none());

        let error = adapter.add(product(9), &cancel).await.unwrap_err();
        assert!(error.is_cancelled());
        assert_eq!(adapter.store().pending_changes(), 0);
    }

    #[tokio::test]
    async fn test_cache_keys() {
        let adapter = adapter_with(0);
        assert_eq!(adapter.cache_key(&42), "products:42");

        let config = QueryConfiguration::default()
            .as_paging(2, 10)
            .as_sorting(SortOrder::Asc, Some("price".to_string()));
        let predicates = vec![Predicate::eq("sku", "A"), FilterCondition::gt("price", 5).into()];
        let key = adapter.query_cache_key(&config, &predicates).unwrap();
        assert_eq!(key, "products:sku = \"A:price > 5:2:10:Asc");
        assert_eq!(adapter.query_cache_key(&config, &[]), None);
    }
}
