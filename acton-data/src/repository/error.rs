//! Repository error types
//!
//! Every adapter operation fails with a [`RepositoryError`] that records which
//! operation was running, what category of failure occurred, and (where known)
//! which entity was involved.
//!
//! # Example
//!
//! ```rust
//! use acton_data::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::not_found("User", "42");
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert!(error.entity_id.is_some());
//! ```

use std::fmt;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Staging a single insert
    Add,
    /// Staging several inserts
    AddRange,
    /// Keyed lookup
    GetById,
    /// First match of a predicate set
    GetFirst,
    /// Only match of a predicate set
    GetSingle,
    /// Filtered listing
    List,
    /// Staging a replace
    Update,
    /// Staging several replaces
    UpdateRange,
    /// Removing one record
    Delete,
    /// Removing several records
    DeleteRange,
    /// Counting matches
    Count,
    /// Uniqueness probe
    IsUnique,
    /// Committing staged changes
    Save,
    /// Document filter query
    FilterBy,
    /// Document single-match lookup
    FindOne,
    /// Document keyed lookup
    FindById,
    /// Document insert
    InsertOne,
    /// Document bulk insert
    InsertMany,
    /// Document match-by-id replace
    ReplaceOne,
    /// Document single delete by filter
    DeleteOne,
    /// Document delete by id
    DeleteById,
    /// Document bulk delete by filter
    DeleteMany,
    /// Page plus total count
    Paginate,
    /// Establishing a store connection
    Connect,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::AddRange => "add_range",
            Self::GetById => "get_by_id",
            Self::GetFirst => "get_first",
            Self::GetSingle => "get_single",
            Self::List => "list",
            Self::Update => "update",
            Self::UpdateRange => "update_range",
            Self::Delete => "delete",
            Self::DeleteRange => "delete_range",
            Self::Count => "count",
            Self::IsUnique => "is_unique",
            Self::Save => "save",
            Self::FilterBy => "filter_by",
            Self::FindOne => "find_one",
            Self::FindById => "find_by_id",
            Self::InsertOne => "insert_one",
            Self::InsertMany => "insert_many",
            Self::ReplaceOne => "replace_one",
            Self::DeleteOne => "delete_one",
            Self::DeleteById => "delete_by_id",
            Self::DeleteMany => "delete_many",
            Self::Paginate => "paginate",
            Self::Connect => "connect",
        };
        f.write_str(name)
    }
}

/// Category of repository error
///
/// `ConnectionFailed`, `Timeout`, `Serialization` and `Store` together form the
/// store-failure family (see [`RepositoryError::is_store_error`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// A required argument was empty or malformed; raised before any I/O
    ValidationFailed,
    /// Keyed lookup or delete-by-key found nothing
    NotFound,
    /// A single-result query matched more than one record
    Consistency,
    /// The operation was aborted through its cancellation token
    Cancelled,
    /// Failed to reach the store
    ConnectionFailed,
    /// The store did not answer in time
    Timeout,
    /// Converting between entities and store records failed
    Serialization,
    /// Any other store-driver failure
    Store,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::NotFound => write!(f, "not_found"),
            Self::Consistency => write!(f, "consistency"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::Serialization => write!(f, "serialization"),
            Self::Store => write!(f, "store"),
        }
    }
}

/// Structured repository error with operation context
///
/// # Example
///
/// ```rust
/// use acton_data::repository::{RepositoryError, RepositoryOperation};
///
/// let error = RepositoryError::validation_failed(RepositoryOperation::AddRange, "entities is empty");
/// assert!(!error.is_store_error());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g., "User", "Order")
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Create a "not found" error with entity context
    ///
    /// The operation defaults to [`RepositoryOperation::GetById`]; chain
    /// [`with_operation`](Self::with_operation) for anything else.
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            operation: RepositoryOperation::GetById,
            kind: RepositoryErrorKind::NotFound,
            message: "Entity not found".to_string(),
            entity_type: Some(entity_type.into()),
            entity_id: Some(entity_id.into()),
        }
    }

    /// Create a validation failed error
    pub fn validation_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// Create a consistency error for single-result queries that matched several records
    pub fn consistency(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Consistency, message)
    }

    /// Create a cancellation error
    pub fn cancelled(operation: RepositoryOperation) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::Cancelled,
            "Operation cancelled",
        )
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Connect,
            RepositoryErrorKind::ConnectionFailed,
            message,
        )
    }

    /// Create a timeout error
    pub fn timeout(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Timeout, message)
    }

    /// Create a serialization error
    pub fn serialization(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Serialization, message)
    }

    /// Create a generic store error
    pub fn store(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Store, message)
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Whether this error wraps a store-driver failure
    pub fn is_store_error(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed
                | RepositoryErrorKind::Timeout
                | RepositoryErrorKind::Serialization
                | RepositoryErrorKind::Store
        )
    }

    /// Check if this error is transient
    ///
    /// Informational only: the adapters never retry. Retry policy belongs to the
    /// store driver configuration.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed | RepositoryErrorKind::Timeout
        )
    }

    /// Whether the operation was aborted through its cancellation token
    pub fn is_cancelled(&self) -> bool {
        self.kind == RepositoryErrorKind::Cancelled
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(RepositoryOperation::List, err.to_string())
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error;
        match err {
            Error::PoolTimedOut => Self::timeout(RepositoryOperation::Connect, err.to_string()),
            Error::Io(_) | Error::Tls(_) | Error::PoolClosed => {
                Self::connection_failed(err.to_string())
            }
            Error::ColumnDecode { .. } | Error::Decode(_) | Error::TypeNotFound { .. } => {
                Self::serialization(RepositoryOperation::List, err.to_string())
            }
            other => Self::store(RepositoryOperation::List, other.to_string()),
        }
    }
}

#[cfg(feature = "surrealdb")]
impl From<surrealdb::Error> for RepositoryError {
    fn from(err: surrealdb::Error) -> Self {
        Self::store(RepositoryOperation::FilterBy, err.to_string())
    }
}
