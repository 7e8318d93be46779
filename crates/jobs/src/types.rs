//! Core job types: the job handle, its dispatch action, and enqueue options.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aftercommit_core::{DispatchError, JobId, ProviderJobId};

/// Hands a job to the external queue.
///
/// Implemented by queue adapters, or by any closure taking the enqueue options.
/// The returned id is whatever the queue assigned.
pub trait DispatchAction: Send + Sync {
    fn dispatch(&self, options: &EnqueueOptions) -> Result<ProviderJobId, DispatchError>;
}

impl<F> DispatchAction for F
where
    F: Fn(&EnqueueOptions) -> Result<ProviderJobId, DispatchError> + Send + Sync,
{
    fn dispatch(&self, options: &EnqueueOptions) -> Result<ProviderJobId, DispatchError> {
        self(options)
    }
}

/// Options accompanying an enqueue request.
///
/// Everything except `force` is passed through to the dispatch action untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueOptions {
    /// Dispatch now, bypassing policy and open transactions.
    pub force: bool,
    /// Target queue name
    pub queue: Option<String>,
    /// Adapter-specific priority
    pub priority: Option<i32>,
    /// Earliest time the queue should run the job
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl EnqueueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with `force` set.
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    /// Same options with `force` set; used once a deferred job resolves.
    pub fn into_forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    /// Schedule the job with a delay from now.
    ///
    /// Delays past the representable range saturate to `DateTime::<Utc>::MAX_UTC`.
    pub fn delayed(mut self, delay: Duration) -> Self {
        let at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.scheduled_at = Some(at);
        self
    }
}

/// A unit of work waiting to be handed to the queue.
///
/// Cheap to clone; clones share identity, action, and the remembered provider id.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

struct JobInner {
    id: JobId,
    name: String,
    action: Box<dyn DispatchAction>,
    provider_job_id: OnceLock<ProviderJobId>,
    created_at: DateTime<Utc>,
}

impl Job {
    /// Create a job with a fresh id.
    pub fn new(name: impl Into<String>, action: impl DispatchAction + 'static) -> Self {
        Self::with_id(JobId::new(), name, action)
    }

    /// Create a job whose dispatch action is a closure.
    pub fn from_fn<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&EnqueueOptions) -> Result<ProviderJobId, DispatchError> + Send + Sync + 'static,
    {
        Self::new(name, action)
    }

    /// Create a job with an explicit id.
    pub fn with_id(id: JobId, name: impl Into<String>, action: impl DispatchAction + 'static) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id,
                name: name.into(),
                action: Box::new(action),
                provider_job_id: OnceLock::new(),
                created_at: Utc::now(),
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Id assigned by the queue on the first successful dispatch, if any.
    pub fn provider_job_id(&self) -> Option<ProviderJobId> {
        self.inner.provider_job_id.get().cloned()
    }

    /// Run the dispatch action and remember the provider id it returns.
    pub(crate) fn dispatch(&self, options: &EnqueueOptions) -> Result<ProviderJobId, DispatchError> {
        let provider_job_id = self.inner.action.dispatch(options)?;
        let _ = self.inner.provider_job_id.set(provider_job_id.clone());
        Ok(provider_job_id)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("provider_job_id", &self.inner.provider_job_id.get())
            .field("created_at", &self.inner.created_at)
            .finish_non_exhaustive()
    }
}

/// Result of a successful enqueue request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The queue accepted the job.
    Dispatched(ProviderJobId),
    /// The job is parked until `dependencies` transactions resolve.
    Deferred { dependencies: usize },
}

impl EnqueueOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched(_))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred { .. })
    }

    pub fn provider_job_id(&self) -> Option<&ProviderJobId> {
        match self {
            Self::Dispatched(id) => Some(id),
            Self::Deferred { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_remembers_first_provider_id() {
        let job = Job::from_fn("SendReceipt", |_| Ok(ProviderJobId::new("q-1")));
        assert_eq!(job.provider_job_id(), None);

        let id = job.dispatch(&EnqueueOptions::new()).unwrap();
        assert_eq!(id, ProviderJobId::new("q-1"));
        assert_eq!(job.clone().provider_job_id(), Some(ProviderJobId::new("q-1")));
    }

    #[test]
    fn failed_dispatch_leaves_provider_id_unset() {
        let job = Job::from_fn("SendReceipt", |_| Err(DispatchError::unavailable("broker down")));

        assert!(job.dispatch(&EnqueueOptions::new()).is_err());
        assert_eq!(job.provider_job_id(), None);
    }

    #[test]
    fn action_receives_pass_through_options() {
        let job = Job::from_fn("Report", |opts| {
            Ok(ProviderJobId::new(format!(
                "{}:{}",
                opts.queue.as_deref().unwrap_or("default"),
                opts.priority.unwrap_or(0)
            )))
        });

        let opts = EnqueueOptions::new().with_queue("mailers").with_priority(5);
        assert_eq!(job.dispatch(&opts).unwrap().as_str(), "mailers:5");
    }

    #[test]
    fn into_forced_keeps_other_options() {
        let opts = EnqueueOptions::new().with_queue("low").into_forced();
        assert!(opts.force);
        assert_eq!(opts.queue.as_deref(), Some("low"));
    }

    #[test]
    fn delayed_schedules_in_the_future() {
        let opts = EnqueueOptions::new().delayed(Duration::from_secs(60));
        assert!(opts.scheduled_at.unwrap() > Utc::now());
    }

    #[test]
    fn delay_beyond_duration_range_saturates() {
        let opts = EnqueueOptions::new().delayed(Duration::MAX);
        assert_eq!(opts.scheduled_at, Some(DateTime::<Utc>::MAX_UTC));

        let opts = EnqueueOptions::new().delayed(Duration::from_secs(9_000_000_000_000_000));
        assert_eq!(opts.scheduled_at, Some(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn delay_past_the_calendar_saturates() {
        // Converts to a chrono duration but lands beyond the last representable date.
        let opts = EnqueueOptions::new().delayed(Duration::from_secs(1_000_000_000_000_000));
        assert_eq!(opts.scheduled_at, Some(DateTime::<Utc>::MAX_UTC));
    }
}
