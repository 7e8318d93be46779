//! Error model for job deferral.

use thiserror::Error;

use crate::id::JobId;

/// Result type used across the deferral crates.
pub type DeferralResult<T> = Result<T, DeferralError>;

/// Failure reported by a queue adapter when handing a job over.
///
/// The coordinator never interprets or retries these; they are surfaced to
/// whoever observes the dispatch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The adapter refused the job (bad payload, unknown queue, ...).
    #[error("dispatch rejected: {0}")]
    Rejected(String),

    /// The adapter could not be reached.
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

impl DispatchError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Error returned synchronously from an enqueue request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeferralError {
    /// Policy forbids enqueueing while a transaction is open.
    #[error("cannot enqueue job {job_id} while {open} transaction(s) are open")]
    OpenTransaction { job_id: JobId, open: usize },

    /// Immediate dispatch failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A policy name did not match any known policy.
    #[error("invalid deferral policy: {0}")]
    InvalidPolicy(String),
}

impl DeferralError {
    pub fn open_transaction(job_id: JobId, open: usize) -> Self {
        Self::OpenTransaction { job_id, open }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_policy(msg: impl Into<String>) -> Self {
        Self::InvalidPolicy(msg.into())
    }

    /// True when the error came from the queue adapter rather than the policy.
    pub fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_error_converts_transparently() {
        let err: DeferralError = DispatchError::unavailable("broker down").into();
        assert!(err.is_dispatch());
        assert_eq!(err.to_string(), "queue unavailable: broker down");
    }

    #[test]
    fn open_transaction_message_names_the_job() {
        let id = JobId::new();
        let err = DeferralError::open_transaction(id, 2);
        assert_eq!(
            err.to_string(),
            format!("cannot enqueue job {id} while 2 transaction(s) are open")
        );
    }
}
