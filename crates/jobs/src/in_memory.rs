//! In-memory transactions for tests/dev.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use aftercommit_core::ResourceId;

use crate::transaction::{TransactionCallback, TransactionHandle, TransactionSource};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Open,
    Committed,
    RolledBack,
}

#[derive(Default)]
struct Callbacks {
    on_commit: Vec<TransactionCallback>,
    on_rollback: Vec<TransactionCallback>,
}

struct State {
    status: TransactionStatus,
    callbacks: Callbacks,
}

/// A transaction resolved by calling `commit()` or `rollback()`.
///
/// - Callbacks run outside the internal lock, on the resolving thread
/// - Resolving twice is a no-op
/// - Registering on an already-resolved transaction runs the matching callback
///   immediately and discards the other
pub struct InMemoryTransaction {
    id: ResourceId,
    state: Mutex<State>,
}

impl InMemoryTransaction {
    pub fn new() -> Self {
        Self::with_id(ResourceId::new())
    }

    pub fn with_id(id: ResourceId) -> Self {
        Self {
            id,
            state: Mutex::new(State {
                status: TransactionStatus::Open,
                callbacks: Callbacks::default(),
            }),
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.state().status
    }

    /// Commit and fire the commit callbacks. Returns false if already resolved.
    pub fn commit(&self) -> bool {
        self.resolve(TransactionStatus::Committed)
    }

    /// Roll back and fire the rollback callbacks. Returns false if already resolved.
    pub fn rollback(&self) -> bool {
        self.resolve(TransactionStatus::RolledBack)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, outcome: TransactionStatus) -> bool {
        let callbacks = {
            let mut state = self.state();
            if state.status != TransactionStatus::Open {
                return false;
            }
            state.status = outcome;
            let Callbacks { on_commit, on_rollback } = std::mem::take(&mut state.callbacks);
            match outcome {
                TransactionStatus::Committed => on_commit,
                _ => on_rollback,
            }
        };

        trace!(resource = %self.id, status = ?outcome, callbacks = callbacks.len(), "transaction resolved");

        for callback in callbacks {
            callback();
        }
        true
    }

    fn register(&self, fires_on: TransactionStatus, callback: TransactionCallback) {
        let status = {
            let mut state = self.state();
            match state.status {
                TransactionStatus::Open => {
                    match fires_on {
                        TransactionStatus::Committed => state.callbacks.on_commit.push(callback),
                        _ => state.callbacks.on_rollback.push(callback),
                    }
                    return;
                }
                resolved => resolved,
            }
        };

        if status == fires_on {
            callback();
        }
    }
}

impl Default for InMemoryTransaction {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransaction")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

impl TransactionHandle for InMemoryTransaction {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.status() == TransactionStatus::Open
    }

    fn register_on_commit(&self, callback: TransactionCallback) {
        self.register(TransactionStatus::Committed, callback);
    }

    fn register_on_rollback(&self, callback: TransactionCallback) {
        self.register(TransactionStatus::RolledBack, callback);
    }
}

/// Tracks transactions begun through it and reports the open ones.
#[derive(Debug, Default)]
pub struct InMemoryTransactionSource {
    transactions: Mutex<Vec<Arc<InMemoryTransaction>>>,
}

impl InMemoryTransactionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Open a new transaction visible to subsequent enqueue decisions.
    pub fn begin(&self) -> Arc<InMemoryTransaction> {
        let tx = Arc::new(InMemoryTransaction::new());
        self.transactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&tx));
        tx
    }

    pub fn open_count(&self) -> usize {
        self.open_transactions().len()
    }
}

impl TransactionSource for InMemoryTransactionSource {
    fn open_transactions(&self) -> Vec<Arc<dyn TransactionHandle>> {
        let mut transactions = self.transactions.lock().unwrap_or_else(PoisonError::into_inner);

        transactions.retain(|tx| tx.is_open());

        transactions
            .iter()
            .map(|tx| Arc::clone(tx) as Arc<dyn TransactionHandle>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> TransactionCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let make = move || {
            let c = Arc::clone(&c);
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }) as TransactionCallback
        };
        (count, make)
    }

    #[test]
    fn commit_fires_only_commit_callbacks() {
        let tx = InMemoryTransaction::new();
        let (commits, on_commit) = counter();
        let (rollbacks, on_rollback) = counter();

        tx.register_on_commit(on_commit());
        tx.register_on_rollback(on_rollback());

        assert!(tx.commit());
        assert_eq!(commits.load(Ordering::SeqCst), 1);
        assert_eq!(rollbacks.load(Ordering::SeqCst), 0);
        assert_eq!(tx.status(), TransactionStatus::Committed);
    }

    #[test]
    fn second_resolution_is_ignored() {
        let tx = InMemoryTransaction::new();
        let (rollbacks, on_rollback) = counter();
        tx.register_on_rollback(on_rollback());

        assert!(tx.rollback());
        assert!(!tx.commit());
        assert!(!tx.rollback());
        assert_eq!(rollbacks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_registration_runs_matching_callback_immediately() {
        let tx = InMemoryTransaction::new();
        tx.commit();

        let (commits, on_commit) = counter();
        let (rollbacks, on_rollback) = counter();
        tx.register_on_commit(on_commit());
        tx.register_on_rollback(on_rollback());

        assert_eq!(commits.load(Ordering::SeqCst), 1);
        assert_eq!(rollbacks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn source_lists_only_open_transactions() {
        let source = InMemoryTransactionSource::new();
        let a = source.begin();
        let b = source.begin();
        assert_eq!(source.open_count(), 2);

        a.commit();
        let open = source.open_transactions();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id(), b.id());

        b.rollback();
        assert_eq!(source.open_count(), 0);
    }
}
