//! # acton-data
//!
//! Uniform repository layer over relational and document stores.
//!
//! ## Features
//!
//! - **Entity contract**: typed identities with creation and modification timestamps
//! - **Relational repositories**: predicate queries, staged writes committed by `save`,
//!   tracking, split-query and global-filter toggles
//! - **Document repositories**: filter-document queries, immediate writes,
//!   soft-delete aware counts
//! - **Immutable query configuration**: every fluent toggle returns a new value
//! - **Paging**: request parameters, skip/take windows and [`PagedResult`](query::PagedResult)
//! - **Cache keys**: deterministic keys from entity keys or predicate descriptions
//! - **Cancellation**: every store call accepts a [`CancellationToken`](tokio_util::sync::CancellationToken)
//!
//! Backends:
//!
//! - In-memory relational and document stores (always available)
//! - PostgreSQL via `sqlx` (feature `database`)
//! - SurrealDB (feature `surrealdb`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use acton_data::prelude::*;
//!
//! let config = Config::load()?;
//! init_tracing(&config)?;
//!
//! let database = MemoryDatabase::<Customer>::new();
//! let customers: RelationalRepository<_> =
//!     Repository::new(RelationalAdapter::new(database.context("customers")));
//!
//! let cancel = CancellationToken::new();
//! customers.add(customer, &cancel).await?;
//! customers.save(&cancel).await?;
//!
//! let page = customers
//!     .as_no_tracking()
//!     .as_paging(1, 20)
//!     .list_paged(vec![Predicate::eq("status", "active")], &cancel)
//!     .await?;
//! ```

pub mod cache_key;
pub mod config;
pub mod document;
pub mod entity;
pub mod error;
pub mod observability;
pub mod query;
pub mod relational;
pub mod repository;

mod value;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache_key::{CacheKey, CacheKeyRegistry};
    pub use crate::config::{Config, DatabaseConfig, DocumentStoreConfig, PagingConfig};
    pub use crate::document::{
        DocumentAdapter, DocumentCollection, DocumentFilter, FindOptions, MemoryCollection,
    };
    #[cfg(feature = "surrealdb")]
    pub use crate::document::{SurrealClient, SurrealCollection};
    pub use crate::entity::{Auditable, Document, Entity, EntityKey, SoftDeletable};
    pub use crate::error::{Error, Result};
    pub use crate::observability::init_tracing;
    pub use crate::query::{
        Deconstruct, PagedResult, QueryConfiguration, RequestParameters, SearchRequestParameters,
        SortOrder, SortParameters, SortedRequestParameters,
    };
    pub use crate::relational::{
        MemoryContext, MemoryDatabase, QueryPlan, RelationalAdapter, RelationalStore,
    };
    #[cfg(feature = "database")]
    pub use crate::relational::{PgContext, PgEntity};
    pub use crate::repository::{
        Compose, DocumentRepository, FilterCondition, FilterOperator, FilterValue, Predicate,
        RelationalRepository, Repository, RepositoryError, RepositoryErrorKind,
        RepositoryOperation, RepositoryResult,
    };

    pub use tokio_util::sync::CancellationToken;
}
