//! Transaction-aware job deferral.
//!
//! A job enqueued while database transactions are open is held back until
//! every one of them commits, then dispatched exactly once. If any of them
//! rolls back the job is dropped.
//!
//! ## Components
//!
//! - `PendingJobRegistry`: deferred jobs and the transactions each still waits on
//! - `DeferralCoordinator`: policy decision plus the per-job commit/rollback state machine
//! - `TransactionHandle` / `TransactionSource`: the only view of transactions the coordinator has
//! - `InMemoryTransaction`: a transaction double for tests and local runs
//!
//! ## Limitations
//!
//! Pending state lives in memory and is lost on restart. A transaction that
//! never resolves keeps its jobs deferred forever; there is no timeout.

pub mod config;
pub mod coordinator;
mod hooks;
pub mod in_memory;
pub mod policy;
pub mod registry;
pub mod stats;
pub mod transaction;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::CoordinatorConfig;
pub use coordinator::DeferralCoordinator;
pub use in_memory::{InMemoryTransaction, InMemoryTransactionSource, TransactionStatus};
pub use policy::{DeferralPolicy, PolicyCell};
pub use registry::{CommitResolution, PendingJobRecord, PendingJobRegistry};
pub use stats::DeferralStats;
pub use transaction::{NoTransactions, TransactionCallback, TransactionHandle, TransactionSource};
pub use types::{DispatchAction, EnqueueOptions, EnqueueOutcome, Job};

pub use aftercommit_core::{DeferralError, DeferralResult, DispatchError, JobId, ProviderJobId, ResourceId};
pub use aftercommit_events::{DeferralEvent, DeferralEventKind};
