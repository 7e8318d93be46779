//! Transactional resource capability consumed by the coordinator.
//!
//! The coordinator never opens, commits, or closes a transaction. It only asks
//! which ones are open and hangs callbacks on them.

use std::sync::Arc;

use aftercommit_core::ResourceId;

/// Callback fired when a transaction resolves.
pub type TransactionCallback = Box<dyn FnOnce() + Send + 'static>;

/// One open transactional resource (typically a connection inside a transaction).
///
/// Contract for implementors:
///
/// - exactly one of the two callback lists fires, once, when the transaction
///   resolves; the other list is discarded
/// - registering on an already-resolved handle runs the matching callback
///   immediately, and the other is discarded. The coordinator snapshots open
///   handles before registering, so a handle that resolves in between must
///   still deliver its outcome
/// - callbacks may fire on any thread
/// - `id()` is stable for the lifetime of the handle
pub trait TransactionHandle: Send + Sync {
    fn id(&self) -> ResourceId;

    fn is_open(&self) -> bool;

    fn register_on_commit(&self, callback: TransactionCallback);

    fn register_on_rollback(&self, callback: TransactionCallback);
}

/// Lists the transactions relevant to the current execution context.
pub trait TransactionSource: Send + Sync {
    fn open_transactions(&self) -> Vec<Arc<dyn TransactionHandle>>;
}

impl<S> TransactionSource for Arc<S>
where
    S: TransactionSource + ?Sized,
{
    fn open_transactions(&self) -> Vec<Arc<dyn TransactionHandle>> {
        (**self).open_transactions()
    }
}

/// A source that never reports an open transaction.
///
/// Every enqueue through it dispatches immediately.
#[derive(Debug, Copy, Clone, Default)]
pub struct NoTransactions;

impl TransactionSource for NoTransactions {
    fn open_transactions(&self) -> Vec<Arc<dyn TransactionHandle>> {
        Vec::new()
    }
}
