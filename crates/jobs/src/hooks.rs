//! Observability hook points.
//!
//! Hooks are fire-and-forget. The list is snapshotted before calling, so a hook
//! may register further hooks without deadlocking.

use std::sync::{Arc, PoisonError, RwLock};

use aftercommit_events::{DeferralEvent, DeferralEventKind};

use crate::types::Job;

type EventHook = Arc<dyn Fn(&DeferralEvent) + Send + Sync>;
type JobHook = Arc<dyn Fn(&Job) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Hooks {
    events: RwLock<Vec<EventHook>>,
    deferred: RwLock<Vec<JobHook>>,
    dropped: RwLock<Vec<JobHook>>,
}

fn snapshot<T: Clone>(list: &RwLock<Vec<T>>) -> Vec<T> {
    list.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn push<T>(list: &RwLock<Vec<T>>, item: T) {
    list.write().unwrap_or_else(PoisonError::into_inner).push(item);
}

impl Hooks {
    pub(crate) fn on_event(&self, hook: EventHook) {
        push(&self.events, hook);
    }

    pub(crate) fn on_deferred(&self, hook: JobHook) {
        push(&self.deferred, hook);
    }

    pub(crate) fn on_dropped(&self, hook: JobHook) {
        push(&self.dropped, hook);
    }

    pub(crate) fn notify(&self, job: &Job, event: &DeferralEvent) {
        let job_hooks = match event.kind() {
            DeferralEventKind::Deferred { .. } => snapshot(&self.deferred),
            DeferralEventKind::Dropped => snapshot(&self.dropped),
            _ => Vec::new(),
        };
        for hook in job_hooks {
            hook(job);
        }

        for hook in snapshot(&self.events) {
            hook(event);
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("events", &snapshot(&self.events).len())
            .field("deferred", &snapshot(&self.deferred).len())
            .field("dropped", &snapshot(&self.dropped).len())
            .finish()
    }
}
