//! Pending job registry: which deferred jobs are still waiting, and on what.
//!
//! Membership is the single source of truth for "not yet resolved". Every
//! compound operation (check + mutate) happens under one lock, so whichever
//! caller removes a record is the only one allowed to act on it.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use aftercommit_core::{JobId, ResourceId};

use crate::types::{EnqueueOptions, Job};

/// In-flight deferral of one job.
#[derive(Debug, Clone)]
pub struct PendingJobRecord {
    pub job: Job,
    /// Options to dispatch with once every dependency commits
    pub options: EnqueueOptions,
    /// Transactions that have not committed yet
    pub remaining: BTreeSet<ResourceId>,
    pub deferred_at: DateTime<Utc>,
}

impl PendingJobRecord {
    pub fn new(
        job: Job,
        options: EnqueueOptions,
        remaining: impl IntoIterator<Item = ResourceId>,
    ) -> Self {
        Self {
            job,
            options,
            remaining: remaining.into_iter().collect(),
            deferred_at: Utc::now(),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job.id()
    }
}

/// Result of applying one commit notification.
#[derive(Debug)]
pub enum CommitResolution {
    /// The job was already dispatched or dropped.
    NotPending,
    /// Other dependencies are still open.
    Waiting { remaining: usize },
    /// That was the last dependency; the record has been removed and the caller
    /// owns the dispatch.
    Ready(PendingJobRecord),
}

/// Process-wide table of deferred jobs.
///
/// No operation fails: absence is an ordinary answer. A poisoned lock is
/// recovered, since records stay consistent between statements.
#[derive(Debug, Default)]
pub struct PendingJobRegistry {
    records: Mutex<HashMap<JobId, PendingJobRecord>>,
}

impl PendingJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<JobId, PendingJobRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a record, replacing (and returning) any previous one for the job.
    pub fn put(&self, record: PendingJobRecord) -> Option<PendingJobRecord> {
        self.records().insert(record.job_id(), record)
    }

    pub fn get(&self, job_id: JobId) -> Option<PendingJobRecord> {
        self.records().get(&job_id).cloned()
    }

    /// Remove the record; returns whether one existed.
    pub fn delete(&self, job_id: JobId) -> bool {
        self.records().remove(&job_id).is_some()
    }

    pub fn contains(&self, job_id: JobId) -> bool {
        self.records().contains_key(&job_id)
    }

    /// Check-and-delete in one step.
    pub fn take(&self, job_id: JobId) -> Option<PendingJobRecord> {
        self.records().remove(&job_id)
    }

    /// Record that `resource` committed for `job_id`.
    ///
    /// Removes the record when it was the last dependency. Repeated commits
    /// from the same resource are harmless.
    pub fn resolve_commit(&self, job_id: JobId, resource: ResourceId) -> CommitResolution {
        let mut records = self.records();

        let Some(record) = records.get_mut(&job_id) else {
            return CommitResolution::NotPending;
        };

        record.remaining.remove(&resource);
        if !record.remaining.is_empty() {
            return CommitResolution::Waiting {
                remaining: record.remaining.len(),
            };
        }

        match records.remove(&job_id) {
            Some(record) => CommitResolution::Ready(record),
            None => CommitResolution::NotPending,
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn pending_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.records().keys().copied().collect();
        ids.sort();
        ids
    }
}
