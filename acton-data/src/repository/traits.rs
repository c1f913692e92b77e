//! Shared repository capabilities
//!
//! - [`RepositoryResult`]: result alias used by every adapter operation
//! - [`Compose`]: folds a predicate sequence into one AND-composed predicate
//! - [`cancellable`]: races a store call against a cancellation token

use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::error::{RepositoryError, RepositoryOperation};

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// AND-composition of store-specific predicates
///
/// Each store's predicate type implements this so adapters can accept any
/// number of predicates and execute exactly one.
///
/// # Example
///
/// ```rust
/// use acton_data::repository::{Compose, Predicate};
///
/// let composed = Predicate::compose_all([Predicate::eq("a", 1), Predicate::eq("b", 2)]);
/// assert!(composed.is_some());
/// assert!(Predicate::compose_all(Vec::<Predicate>::new()).is_none());
/// ```
pub trait Compose: Sized {
    /// Both `self` and `other` must match
    #[must_use]
    fn compose(self, other: Self) -> Self;

    /// Fold a sequence into one predicate; `None` when the sequence is empty
    fn compose_all<I>(predicates: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        predicates.into_iter().reduce(Self::compose)
    }
}

/// Run a store call unless the token is cancelled first
///
/// An already-cancelled token short-circuits before the future is polled.
/// Cancellation during the call wins the race and drops the store future.
pub async fn cancellable<T, F>(
    operation: RepositoryOperation,
    cancel: &CancellationToken,
    future: F,
) -> RepositoryResult<T>
where
    F: Future<Output = RepositoryResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(RepositoryError::cancelled(operation));
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RepositoryError::cancelled(operation)),
        result = future => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let token = CancellationToken::new();
        let result = cancellable(RepositoryOperation::Count, &token, async { Ok(3_u64) }).await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn test_cancellable_short_circuits_before_polling() {
        let token = CancellationToken::new();
        token.cancel();
        let polled = Arc::new(AtomicBool::new(false));
        let flag = polled.clone();
        let result = cancellable(RepositoryOperation::List, &token, async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert!(result.unwrap_err().is_cancelled());
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancellable_aborts_in_flight_call() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let result: RepositoryResult<()> =
            cancellable(RepositoryOperation::Save, &token, async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        let error = result.unwrap_err();
        assert!(error.is_cancelled());
        assert_eq!(error.operation, RepositoryOperation::Save);
    }
}
