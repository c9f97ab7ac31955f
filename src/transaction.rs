//! Commit/rollback wrapper for multi-step mutations
//!
//! A write operation touches the segment and the index in separate steps;
//! [`Pending`] guarantees that either both become visible or both are
//! undone. Dropping a Pending that was never committed rolls back, so an
//! error propagating out between the steps cannot leave the dataset
//! inconsistent.

/// Error type produced by a failed commit
pub type TransactionError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for transaction commits
pub type TransactionResult<T> = Result<T, TransactionError>;

/// One committable unit of work.
///
/// Exactly one of `commit` and `rollback` is called, at most once; the
/// enclosing [`Pending`] enforces this.
pub trait Transaction {
    /// Makes the unit of work durable and visible
    fn commit(&mut self) -> TransactionResult<()>;

    /// Undoes the unit of work.
    ///
    /// Best effort: rollback runs on error paths and from destructors, so
    /// it cannot propagate failures.
    fn rollback(&mut self);
}

/// Owning handle for an in-flight transaction.
///
/// Holds at most one transaction. Consuming it with [`Pending::commit`] or
/// [`Pending::rollback`] settles the transaction; dropping an unsettled
/// Pending rolls back. An empty Pending settles as a no-op.
pub struct Pending {
    inner: Option<Box<dyn Transaction>>,
}

impl Pending {
    /// Wraps a transaction
    pub fn new(transaction: Box<dyn Transaction>) -> Self {
        Self {
            inner: Some(transaction),
        }
    }

    /// A Pending holding nothing; commit and rollback are no-ops
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// True if no transaction is held
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Commits the held transaction.
    ///
    /// On commit failure the transaction is dropped without rollback: the
    /// commit target is responsible for leaving itself consistent when its
    /// own commit fails.
    pub fn commit(mut self) -> TransactionResult<()> {
        match self.inner.take() {
            Some(mut transaction) => transaction.commit(),
            None => Ok(()),
        }
    }

    /// Rolls back the held transaction
    pub fn rollback(mut self) {
        if let Some(mut transaction) = self.inner.take() {
            transaction.rollback();
        }
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        if let Some(mut transaction) = self.inner.take() {
            transaction.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counters {
        commits: Cell<u32>,
        rollbacks: Cell<u32>,
    }

    struct Counting {
        counters: Rc<Counters>,
    }

    impl Transaction for Counting {
        fn commit(&mut self) -> TransactionResult<()> {
            self.counters.commits.set(self.counters.commits.get() + 1);
            Ok(())
        }

        fn rollback(&mut self) {
            self.counters
                .rollbacks
                .set(self.counters.rollbacks.get() + 1);
        }
    }

    fn counting() -> (Pending, Rc<Counters>) {
        let counters = Rc::new(Counters::default());
        let pending = Pending::new(Box::new(Counting {
            counters: Rc::clone(&counters),
        }));
        (pending, counters)
    }

    #[test]
    fn test_drop_without_commit_rolls_back_once() {
        let (pending, counters) = counting();
        drop(pending);
        assert_eq!(counters.commits.get(), 0);
        assert_eq!(counters.rollbacks.get(), 1);
    }

    #[test]
    fn test_commit_prevents_rollback() {
        let (pending, counters) = counting();
        pending.commit().unwrap();
        assert_eq!(counters.commits.get(), 1);
        assert_eq!(counters.rollbacks.get(), 0);
    }

    #[test]
    fn test_explicit_rollback_runs_once() {
        let (pending, counters) = counting();
        pending.rollback();
        assert_eq!(counters.rollbacks.get(), 1);
    }

    #[test]
    fn test_empty_pending_is_a_no_op() {
        let pending = Pending::empty();
        assert!(pending.is_empty());
        pending.commit().unwrap();

        let pending = Pending::empty();
        pending.rollback();

        let pending = Pending::empty();
        drop(pending);
    }
}
