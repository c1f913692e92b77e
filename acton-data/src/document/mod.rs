//! Document stores
//!
//! [`DocumentAdapter`] implements the document repository operations over any
//! [`DocumentCollection`]. Filters are [`DocumentFilter`] expressions. Two
//! collections ship with the crate:
//!
//! - [`MemoryCollection`]: in-process, insertion-ordered
//! - [`SurrealCollection`]: SurrealDB (requires the `surrealdb` feature)

mod adapter;
mod filter;
mod memory;
mod store;
#[cfg(feature = "surrealdb")]
mod surreal;

pub use adapter::DocumentAdapter;
pub use filter::DocumentFilter;
pub use memory::MemoryCollection;
pub use store::{DocumentCollection, FindOptions};
#[cfg(feature = "surrealdb")]
pub use surreal::{connect, SurrealClient, SurrealCollection};
