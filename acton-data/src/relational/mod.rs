//! Relational stores
//!
//! [`RelationalAdapter`] implements the relational repository operations over
//! any [`RelationalStore`]. Two stores ship with the crate:
//!
//! - [`MemoryContext`]: in-process tables with change tracking and global filters
//! - [`PgContext`]: PostgreSQL via `sqlx` (requires the `database` feature)

mod adapter;
mod memory;
#[cfg(feature = "database")]
mod postgres;
mod store;

pub use adapter::RelationalAdapter;
pub use memory::{MemoryContext, MemoryDatabase};
#[cfg(feature = "database")]
pub use postgres::{connect, PgContext, PgEntity};
pub use store::{Change, QueryPlan, RelationalStore};
