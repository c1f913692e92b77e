//! Entity contracts
//!
//! Every record stored through a repository implements [`Entity`]: a typed
//! identity plus creation and modification timestamps. Document-store records
//! additionally implement [`Document`], which fixes the identity to a string
//! and names the collection the record lives in.
//!
//! # Example
//!
//! ```rust
//! use acton_data::entity::Entity;
//! use chrono::{DateTime, Utc};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Customer {
//!     id: i64,
//!     name: String,
//!     created_on: DateTime<Utc>,
//!     last_modified: Option<DateTime<Utc>>,
//! }
//!
//! impl Entity for Customer {
//!     type Key = i64;
//!     const ENTITY_NAME: &'static str = "Customer";
//!
//!     fn id(&self) -> &i64 { &self.id }
//!     fn created_on(&self) -> DateTime<Utc> { self.created_on }
//!     fn last_modified(&self) -> Option<DateTime<Utc>> { self.last_modified }
//!     fn touch(&mut self, at: DateTime<Utc>) { self.last_modified = Some(at); }
//! }
//! ```

use std::fmt::{Debug, Display};
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Maximum length of a string identity
pub const MAX_STRING_KEY_LEN: usize = 36;

/// Identity type of an entity
///
/// Keys are totally ordered so that in-memory stores can return rows in a
/// stable natural order.
pub trait EntityKey:
    Clone + Debug + Display + Eq + Ord + Hash + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Check the key before it is handed to a store
    ///
    /// Returns a human-readable reason when the key is unusable.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl EntityKey for i32 {}
impl EntityKey for i64 {}
impl EntityKey for u32 {}
impl EntityKey for u64 {}
impl EntityKey for Uuid {}

impl EntityKey for String {
    fn validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("key must not be empty".to_string());
        }
        if self.chars().count() > MAX_STRING_KEY_LEN {
            return Err(format!(
                "key exceeds {} characters",
                MAX_STRING_KEY_LEN
            ));
        }
        Ok(())
    }
}

/// Minimal shape of every stored record
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identity type
    type Key: EntityKey;

    /// Canonical name used in error context and cache keys
    const ENTITY_NAME: &'static str;

    /// The record identity
    fn id(&self) -> &Self::Key;

    /// When the record was created; set once by the application
    fn created_on(&self) -> DateTime<Utc>;

    /// When the record was last modified, if ever
    fn last_modified(&self) -> Option<DateTime<Utc>>;

    /// Stamp the modification time
    ///
    /// Adapters call this on every update or replace.
    fn touch(&mut self, at: DateTime<Utc>);
}

/// Records that are flagged as deleted instead of being removed
pub trait SoftDeletable: Entity {
    /// Whether the record is flagged as deleted
    fn is_deleted(&self) -> bool;

    /// When the record was flagged
    fn deleted_on(&self) -> Option<DateTime<Utc>>;

    /// Who flagged the record
    fn deleted_by(&self) -> Option<&str>;

    /// Flag the record as deleted
    fn mark_deleted(&mut self, at: DateTime<Utc>, by: Option<String>);
}

/// Records that remember who created and last changed them
pub trait Auditable: Entity {
    /// Creator of the record
    fn created_by(&self) -> Option<&str>;

    /// Last user to modify the record
    fn last_modified_by(&self) -> Option<&str>;
}

/// Record stored in a document collection
///
/// The identity is the store-native object id rendered as a string. Records
/// inserted with an empty id receive a store-generated one, forwarded back
/// through [`set_id`](Document::set_id).
pub trait Document: Entity<Key = String> {
    /// Collection the record lives in
    const COLLECTION: &'static str;

    /// Field holding the identity in the serialized record
    const ID_FIELD: &'static str = "id";

    /// Field holding the soft-delete flag
    const SOFT_DELETE_FIELD: &'static str = "is_deleted";

    /// Replace the identity with a store-generated one
    fn set_id(&mut self, id: String);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_key_validation() {
        assert!("abc".to_string().validate().is_ok());
        assert!(String::new().validate().is_err());
        assert!("x".repeat(36).validate().is_ok());
        assert!("x".repeat(37).validate().is_err());
    }

    #[test]
    fn test_numeric_keys_always_valid() {
        assert!(42_i64.validate().is_ok());
        assert!(0_u32.validate().is_ok());
        assert!(Uuid::nil().validate().is_ok());
    }
}
