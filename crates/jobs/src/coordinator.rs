//! Deferral coordinator.
//!
//! Decides, per enqueue request, between immediate dispatch, deferral, and
//! rejection, and drives every deferred job to exactly one terminal outcome:
//!
//! ```text
//! NotStarted ─┬─► DispatchedImmediately
//!             ├─► Rejected
//!             └─► Deferred ─┬─► Dispatched   (every dependency committed)
//!                           └─► Dropped      (any dependency rolled back)
//! ```
//!
//! Rollback of any single dependency wins over commits of the others. The
//! registry decides the race: the callback that removes the record performs the
//! terminal action, every later callback finds nothing and returns.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use aftercommit_core::{DeferralError, DeferralResult, DispatchError, JobId, ProviderJobId, ResourceId};
use aftercommit_events::{DeferralEvent, DeferralEventKind, EventBus};

use crate::config::CoordinatorConfig;
use crate::hooks::Hooks;
use crate::policy::{DeferralPolicy, PolicyCell};
use crate::registry::{CommitResolution, PendingJobRecord, PendingJobRegistry};
use crate::stats::{Counter, DeferralStats, StatsCounters};
use crate::transaction::{TransactionHandle, TransactionSource};
use crate::types::{EnqueueOptions, EnqueueOutcome, Job};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum DispatchPath {
    Immediate,
    AfterCommit,
}

impl DispatchPath {
    fn is_deferred(self) -> bool {
        self == Self::AfterCommit
    }
}

/// State reachable from transaction callbacks, which may outlive any borrow of
/// the coordinator and run on arbitrary threads.
#[derive(Debug)]
struct Shared {
    registry: PendingJobRegistry,
    policy: PolicyCell,
    adapter: String,
    hooks: Hooks,
    stats: StatsCounters,
}

impl Shared {
    fn emit(&self, job: &Job, kind: DeferralEventKind) {
        let event = DeferralEvent::new(job.id(), job.name(), self.adapter.as_str(), kind);
        self.hooks.notify(job, &event);
    }

    fn dispatch(
        &self,
        job: &Job,
        options: &EnqueueOptions,
        path: DispatchPath,
    ) -> Result<ProviderJobId, DispatchError> {
        match job.dispatch(options) {
            Ok(provider_job_id) => {
                self.stats.incr(match path {
                    DispatchPath::Immediate => Counter::DispatchedImmediately,
                    DispatchPath::AfterCommit => Counter::DispatchedAfterCommit,
                });
                debug!(
                    job_id = %job.id(),
                    job = job.name(),
                    adapter = %self.adapter,
                    provider_job_id = %provider_job_id,
                    deferred = path.is_deferred(),
                    "job dispatched"
                );
                self.emit(
                    job,
                    DeferralEventKind::Dispatched {
                        deferred: path.is_deferred(),
                        provider_job_id: provider_job_id.clone(),
                    },
                );
                Ok(provider_job_id)
            }
            Err(e) => {
                self.stats.incr(Counter::DispatchFailure);
                self.emit(
                    job,
                    DeferralEventKind::DispatchFailed {
                        error: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    fn handle_commit(&self, job_id: JobId, resource: ResourceId) {
        match self.registry.resolve_commit(job_id, resource) {
            CommitResolution::NotPending => {
                trace!(job_id = %job_id, resource = %resource, "commit for resolved job ignored");
            }
            CommitResolution::Waiting { remaining } => {
                debug!(
                    job_id = %job_id,
                    resource = %resource,
                    remaining,
                    "transaction committed; job still waiting"
                );
            }
            CommitResolution::Ready(record) => {
                let PendingJobRecord { job, options, .. } = record;
                info!(
                    job_id = %job_id,
                    job = job.name(),
                    adapter = %self.adapter,
                    "all transactions committed; dispatching deferred job"
                );
                // No caller is waiting on this path, so the failure is reported here.
                if let Err(e) = self.dispatch(&job, &options.into_forced(), DispatchPath::AfterCommit) {
                    error!(
                        job_id = %job_id,
                        job = job.name(),
                        adapter = %self.adapter,
                        error = %e,
                        "deferred job dispatch failed"
                    );
                }
            }
        }
    }

    fn handle_rollback(&self, job_id: JobId, resource: ResourceId) {
        let Some(record) = self.registry.take(job_id) else {
            trace!(job_id = %job_id, resource = %resource, "rollback for resolved job ignored");
            return;
        };

        self.stats.incr(Counter::Dropped);
        info!(
            job_id = %job_id,
            job = record.job.name(),
            resource = %resource,
            adapter = %self.adapter,
            "transaction rolled back; dropping deferred job"
        );
        self.emit(&record.job, DeferralEventKind::Dropped);
    }
}

/// Holds jobs back until the transactions that produced their data commit.
///
/// Cheap to clone when the source is; clones share the registry, policy,
/// hooks and counters.
#[derive(Debug, Clone)]
pub struct DeferralCoordinator<S> {
    source: S,
    shared: Arc<Shared>,
}

impl<S> DeferralCoordinator<S>
where
    S: TransactionSource,
{
    pub fn new(source: S, config: CoordinatorConfig) -> Self {
        Self {
            source,
            shared: Arc::new(Shared {
                registry: PendingJobRegistry::new(),
                policy: PolicyCell::new(config.policy),
                adapter: config.adapter,
                hooks: Hooks::default(),
                stats: StatsCounters::default(),
            }),
        }
    }

    pub fn policy(&self) -> DeferralPolicy {
        self.shared.policy.load()
    }

    /// Administrative, process-wide policy change. Returns the previous policy.
    ///
    /// Jobs already deferred stay deferred.
    pub fn set_policy(&self, policy: DeferralPolicy) -> DeferralPolicy {
        let previous = self.shared.policy.store(policy);
        if previous != policy {
            info!(from = %previous, to = %policy, "deferral policy changed");
        }
        previous
    }

    pub fn adapter(&self) -> &str {
        &self.shared.adapter
    }

    pub fn registry(&self) -> &PendingJobRegistry {
        &self.shared.registry
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// True while the job waits on at least one open transaction.
    pub fn is_pending(&self, job_id: JobId) -> bool {
        self.shared.registry.contains(job_id)
    }

    pub fn stats(&self) -> DeferralStats {
        self.shared.stats.snapshot(self.shared.registry.len())
    }

    /// Enqueue a job, deferring it while transactions are open if policy says so.
    ///
    /// Decision order:
    ///
    /// 1. `options.force` → dispatch now, clearing any pending deferral
    /// 2. `Defer`/`Compatible` with open transactions → defer
    /// 3. `Raise` with open transactions → `DeferralError::OpenTransaction`
    /// 4. otherwise → dispatch now, clearing any stale deferral
    ///
    /// A deferred job's eventual dispatch (or drop) is not reported here;
    /// subscribe to hooks for that.
    pub fn enqueue(&self, job: &Job, options: EnqueueOptions) -> DeferralResult<EnqueueOutcome> {
        if options.force {
            self.shared.registry.delete(job.id());
            return self.dispatch_now(job, &options);
        }

        let policy = self.policy();
        let open = self.open_transactions();

        if !open.is_empty() {
            if policy.defers_when_open() {
                return Ok(self.defer(job, options, open));
            }

            if policy.rejects_when_open() {
                self.shared.stats.incr(Counter::Rejected);
                warn!(
                    job_id = %job.id(),
                    job = job.name(),
                    open_transactions = open.len(),
                    "refusing to enqueue job while transactions are open"
                );
                self.shared.emit(
                    job,
                    DeferralEventKind::Rejected {
                        open_transactions: open.len(),
                    },
                );
                return Err(DeferralError::open_transaction(job.id(), open.len()));
            }
        }

        self.shared.registry.delete(job.id());
        self.dispatch_now(job, &options)
    }

    /// Provider-assigned id of the job, forcing dispatch first if it is still
    /// deferred.
    ///
    /// Returns `None` for a job that was never dispatched (dropped, rejected,
    /// or never enqueued through this coordinator).
    pub fn resolve_provider_job_id(&self, job: &Job) -> DeferralResult<Option<ProviderJobId>> {
        let Some(record) = self.shared.registry.take(job.id()) else {
            return Ok(job.provider_job_id());
        };

        info!(
            job_id = %job.id(),
            job = job.name(),
            waiting_on = record.remaining.len(),
            "provider id requested; forcing dispatch of deferred job"
        );

        let PendingJobRecord { job, options, .. } = record;
        let provider_job_id =
            self.shared
                .dispatch(&job, &options.into_forced(), DispatchPath::AfterCommit)?;
        Ok(Some(provider_job_id))
    }

    /// Called with the job each time one is deferred.
    pub fn on_deferred<F>(&self, hook: F)
    where
        F: Fn(&Job) + Send + Sync + 'static,
    {
        self.shared.hooks.on_deferred(Arc::new(hook));
    }

    /// Called with the job each time a rollback drops one.
    pub fn on_dropped<F>(&self, hook: F)
    where
        F: Fn(&Job) + Send + Sync + 'static,
    {
        self.shared.hooks.on_dropped(Arc::new(hook));
    }

    /// Called with every lifecycle event.
    pub fn on_event<F>(&self, hook: F)
    where
        F: Fn(&DeferralEvent) + Send + Sync + 'static,
    {
        self.shared.hooks.on_event(Arc::new(hook));
    }

    /// Forward every lifecycle event to a bus. Publish failures are logged.
    pub fn publish_to<B>(&self, bus: B)
    where
        B: EventBus<DeferralEvent> + 'static,
    {
        self.on_event(move |event| {
            if let Err(e) = bus.publish(event.clone()) {
                warn!(
                    job_id = %event.job_id(),
                    event = event.event_type(),
                    error = ?e,
                    "failed to publish deferral event"
                );
            }
        });
    }

    fn dispatch_now(&self, job: &Job, options: &EnqueueOptions) -> DeferralResult<EnqueueOutcome> {
        let provider_job_id = self.shared.dispatch(job, options, DispatchPath::Immediate)?;
        Ok(EnqueueOutcome::Dispatched(provider_job_id))
    }

    /// Open transactions, deduplicated by id.
    fn open_transactions(&self) -> Vec<Arc<dyn TransactionHandle>> {
        let mut by_id: BTreeMap<ResourceId, Arc<dyn TransactionHandle>> = BTreeMap::new();
        for tx in self.source.open_transactions() {
            if tx.is_open() {
                by_id.entry(tx.id()).or_insert(tx);
            }
        }
        by_id.into_values().collect()
    }

    fn defer(
        &self,
        job: &Job,
        options: EnqueueOptions,
        open: Vec<Arc<dyn TransactionHandle>>,
    ) -> EnqueueOutcome {
        let job_id = job.id();
        let dependencies = open.len();

        let record = PendingJobRecord::new(job.clone(), options, open.iter().map(|tx| tx.id()));
        if self.shared.registry.put(record).is_some() {
            debug!(job_id = %job_id, "job was already deferred; dependencies replaced");
        }

        self.shared.stats.incr(Counter::Deferred);
        debug!(
            job_id = %job_id,
            job = job.name(),
            adapter = %self.shared.adapter,
            dependencies,
            "job deferred until open transactions resolve"
        );
        self.shared.emit(job, DeferralEventKind::Deferred { dependencies });

        // Registered after the record is in place: a transaction that resolves
        // during registration must find it.
        for tx in open {
            let resource = tx.id();

            let shared = Arc::clone(&self.shared);
            tx.register_on_commit(Box::new(move || shared.handle_commit(job_id, resource)));

            let shared = Arc::clone(&self.shared);
            tx.register_on_rollback(Box::new(move || shared.handle_rollback(job_id, resource)));
        }

        EnqueueOutcome::Deferred { dependencies }
    }
}
