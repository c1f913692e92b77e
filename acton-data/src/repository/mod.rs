//! Repository building blocks shared by every store
//!
//! - [`Repository`]: immutable façade pairing an adapter with a query configuration
//! - [`Predicate`] / [`FilterCondition`]: relational filter trees
//! - [`RepositoryError`]: error taxonomy reported by every operation
//! - [`Compose`] and [`cancellable`]: predicate folding and cancellation
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_data::relational::{MemoryDatabase, RelationalAdapter};
//! use acton_data::repository::{Predicate, RelationalRepository, Repository};
//! use tokio_util::sync::CancellationToken;
//!
//! let database = MemoryDatabase::<Customer>::new();
//! let customers: RelationalRepository<_> =
//!     Repository::new(RelationalAdapter::new(database.context("customers")));
//!
//! let cancel = CancellationToken::new();
//! let active = customers
//!     .as_no_tracking()
//!     .as_paging(1, 20)
//!     .list(vec![Predicate::eq("status", "active")], &cancel)
//!     .await?;
//! ```

mod error;
mod facade;
mod predicate;
mod traits;

pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use facade::{DocumentRepository, RelationalRepository, Repository};
pub use predicate::{FilterCondition, FilterOperator, FilterValue, Predicate};
pub use traits::{cancellable, Compose, RepositoryResult};
