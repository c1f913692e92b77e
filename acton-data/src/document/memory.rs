//! In-memory document collection
//!
//! Documents keep insertion order, which is the natural order returned when
//! no sort is requested. Clones share the same underlying documents.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::filter::DocumentFilter;
use super::store::{DocumentCollection, FindOptions};
use crate::entity::{Document, Entity};
use crate::query::SortOrder;
use crate::repository::{RepositoryError, RepositoryOperation, RepositoryResult};
use crate::value;

/// Collection held in process memory
pub struct MemoryCollection<D: Document> {
    name: String,
    documents: Arc<RwLock<Vec<D>>>,
}

impl<D: Document> Clone for MemoryCollection<D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            documents: Arc::clone(&self.documents),
        }
    }
}

impl<D: Document> Default for MemoryCollection<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> MemoryCollection<D> {
    /// Empty collection named after [`Document::COLLECTION`]
    pub fn new() -> Self {
        Self {
            name: D::COLLECTION.to_string(),
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Collection pre-filled with documents, ids used as given
    pub fn seeded<I: IntoIterator<Item = D>>(documents: I) -> Self {
        Self {
            name: D::COLLECTION.to_string(),
            documents: Arc::new(RwLock::new(documents.into_iter().collect())),
        }
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<D>> {
        self.documents.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<D>> {
        self.documents.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn serialize(document: &D, operation: RepositoryOperation) -> RepositoryResult<Value> {
        serde_json::to_value(document).map_err(|e| {
            RepositoryError::serialization(operation, e.to_string())
                .with_entity(D::ENTITY_NAME, document.id().clone())
        })
    }

    /// Positions of matching documents, in natural order
    fn positions(
        documents: &[D],
        filter: &DocumentFilter,
        operation: RepositoryOperation,
    ) -> RepositoryResult<Vec<usize>> {
        let mut positions = Vec::new();
        for (i, document) in documents.iter().enumerate() {
            if filter.matches(&Self::serialize(document, operation)?) {
                positions.push(i);
            }
        }
        Ok(positions)
    }

    fn assign_id(mut document: D) -> D {
        if document.id().is_empty() {
            document.set_id(Uuid::now_v7().simple().to_string());
        }
        document
    }

    fn duplicate(id: &str, operation: RepositoryOperation) -> RepositoryError {
        RepositoryError::store(operation, "duplicate document id").with_entity(D::ENTITY_NAME, id)
    }
}

impl<D: Document> DocumentCollection for MemoryCollection<D> {
    type Document = D;

    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: &DocumentFilter, options: &FindOptions) -> RepositoryResult<Vec<D>> {
        let documents = self.read();
        let mut matched = Vec::new();
        for document in documents.iter() {
            let record = Self::serialize(document, RepositoryOperation::FilterBy)?;
            if filter.matches(&record) {
                matched.push((document, record));
            }
        }
        if let Some((field, order)) = &options.sort {
            matched.sort_by(|(_, a), (_, b)| {
                let ordering = value::sort_order(value::lookup(a, field), value::lookup(b, field));
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }
        let skip = usize::try_from(options.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let found: Vec<D> = matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|(document, _)| document.clone())
            .collect();
        debug!(collection = %self.name, filter = %filter, documents = found.len(), "memory find");
        Ok(found)
    }

    async fn count_documents(&self, filter: &DocumentFilter) -> RepositoryResult<u64> {
        let documents = self.read();
        let positions = Self::positions(&documents, filter, RepositoryOperation::Count)?;
        Ok(positions.len() as u64)
    }

    async fn insert_one(&self, document: D) -> RepositoryResult<D> {
        let document = Self::assign_id(document);
        let mut documents = self.write();
        if documents.iter().any(|d| d.id() == document.id()) {
            return Err(Self::duplicate(document.id(), RepositoryOperation::InsertOne));
        }
        documents.push(document.clone());
        Ok(document)
    }

    async fn insert_many(&self, batch: Vec<D>) -> RepositoryResult<Vec<D>> {
        let batch: Vec<D> = batch.into_iter().map(Self::assign_id).collect();
        let mut documents = self.write();
        for (i, document) in batch.iter().enumerate() {
            let clashes_existing = documents.iter().any(|d| d.id() == document.id());
            let clashes_batch = batch[..i].iter().any(|d| d.id() == document.id());
            if clashes_existing || clashes_batch {
                return Err(Self::duplicate(document.id(), RepositoryOperation::InsertMany));
            }
        }
        documents.extend(batch.iter().cloned());
        Ok(batch)
    }

    async fn replace_one(&self, id: &str, mut document: D) -> RepositoryResult<Option<D>> {
        document.set_id(id.to_string());
        let mut documents = self.write();
        let Some(position) = documents.iter().position(|d| d.id() == id) else {
            return Ok(None);
        };
        Ok(Some(std::mem::replace(&mut documents[position], document)))
    }

    async fn find_one_and_delete(&self, filter: &DocumentFilter) -> RepositoryResult<Option<D>> {
        let mut documents = self.write();
        let positions = Self::positions(&documents, filter, RepositoryOperation::DeleteOne)?;
        Ok(positions.first().map(|&position| documents.remove(position)))
    }

    async fn delete_many(&self, filter: &DocumentFilter) -> RepositoryResult<u64> {
        let mut documents = self.write();
        let positions = Self::positions(&documents, filter, RepositoryOperation::DeleteMany)?;
        for &position in positions.iter().rev() {
            documents.remove(position);
        }
        debug!(collection = %self.name, deleted = positions.len(), "memory delete");
        Ok(positions.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        title: String,
        rank: i64,
        created_on: DateTime<Utc>,
        last_modified: Option<DateTime<Utc>>,
    }

    impl Entity for Note {
        type Key = String;
        const ENTITY_NAME: &'static str = "Note";

        fn id(&self) -> &String {
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

    impl Document for Note {
        const COLLECTION: &'static str = "notes";

        fn set_id(&mut self, id: String) {
            self.id = id;
        }
    }

    fn note(id: &str, rank: i64) -> Note {
        Note {
            id: id.to_string(),
            title: format!("note {}", rank),
            rank,
            created_on: Utc::now(),
            last_modified: None,
        }
    }

    #[tokio::test]
    async fn test_insert_generates_missing_ids() {
        let collection = MemoryCollection::<Note>::new();
        let inserted = collection.insert_one(note("", 1)).await.unwrap();
        assert_eq!(inserted.id.len(), 32);
        assert!(inserted.id.chars().all(|c| c.is_ascii_hexdigit()));

        let kept = collection.insert_one(note("fixed", 2)).await.unwrap();
        assert_eq!(kept.id, "fixed");
        assert_eq!(collection.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let collection = MemoryCollection::seeded([note("a", 1)]);
        assert!(collection.insert_one(note("a", 2)).await.is_err());

        let result = collection.insert_many(vec![note("b", 1), note("b", 2)]).await;
        assert!(result.is_err());
        assert_eq!(collection.len(), 1);
    }

    #[tokio::test]
    async fn test_find_sorts_and_windows() {
        let collection = MemoryCollection::seeded((1..=6).map(|n| note(&format!("n{}", n), n)));
        let options = FindOptions::new().sort("rank", SortOrder::Desc).skip(1).limit(2);
        let found = collection.find(&DocumentFilter::all(), &options).await.unwrap();
        let ranks: Vec<i64> = found.iter().map(|n| n.rank).collect();
        assert_eq!(ranks, vec![5, 4]);

        let filtered = collection
            .find(&DocumentFilter::gt("rank", 4), &FindOptions::new())
            .await
            .unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[tokio::test]
    async fn test_replace_and_delete() {
        let collection = MemoryCollection::seeded([note("a", 1), note("b", 2), note("c", 3)]);

        let previous = collection.replace_one("b", note("b", 20)).await.unwrap();
        assert_eq!(previous.map(|n| n.rank), Some(2));
        assert!(collection.replace_one("zz", note("zz", 0)).await.unwrap().is_none());

        let removed = collection
            .find_one_and_delete(&DocumentFilter::eq("title", "note 3"))
            .await
            .unwrap();
        assert_eq!(removed.map(|n| n.id), Some("c".to_string()));

        let deleted = collection.delete_many(&DocumentFilter::all()).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn test_replace_keeps_target_id() {
        let collection = MemoryCollection::seeded([note("a", 1), note("b", 2)]);

        let previous = collection.replace_one("a", note("b", 10)).await.unwrap();
        assert_eq!(previous.map(|n| n.rank), Some(1));

        let found = collection.find(&DocumentFilter::all(), &FindOptions::new()).await.unwrap();
        let ids: Vec<(&str, i64)> = found.iter().map(|n| (n.id.as_str(), n.rank)).collect();
        assert_eq!(ids, vec![("a", 10), ("b", 2)]);
    }
}
