//! Lifecycle events emitted while a job moves through deferral.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aftercommit_core::{JobId, ProviderJobId};

/// What happened to the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeferralEventKind {
    /// Parked until `dependencies` open transactions resolve.
    Deferred { dependencies: usize },
    /// A transaction the job depended on rolled back; the job will never run.
    Dropped,
    /// Handed to the queue adapter. `deferred` is true on the after-commit path.
    Dispatched {
        deferred: bool,
        provider_job_id: ProviderJobId,
    },
    /// Refused because a transaction was open under the `raise` policy.
    Rejected { open_transactions: usize },
    /// The adapter failed on the after-commit path, where no caller is waiting.
    DispatchFailed { error: String },
}

/// Envelope for a lifecycle event.
///
/// Events are facts: immutable, fire-and-forget, never consulted by the
/// coordinator itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferralEvent {
    job_id: JobId,
    job_name: String,
    adapter: String,
    #[serde(flatten)]
    kind: DeferralEventKind,
    occurred_at: DateTime<Utc>,
}

impl DeferralEvent {
    pub fn new(
        job_id: JobId,
        job_name: impl Into<String>,
        adapter: impl Into<String>,
        kind: DeferralEventKind,
    ) -> Self {
        Self {
            job_id,
            job_name: job_name.into(),
            adapter: adapter.into(),
            kind,
            occurred_at: Utc::now(),
        }
    }

    /// Stable event name (e.g. "deferred.job").
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            DeferralEventKind::Deferred { .. } => "deferred.job",
            DeferralEventKind::Dropped => "dropped.job",
            DeferralEventKind::Dispatched { .. } => "dispatched.job",
            DeferralEventKind::Rejected { .. } => "rejected.job",
            DeferralEventKind::DispatchFailed { .. } => "dispatch_failed.job",
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Name of the queue adapter the coordinator dispatches through.
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    pub fn kind(&self) -> &DeferralEventKind {
        &self.kind
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
