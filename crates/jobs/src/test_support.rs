//! Shared test doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use aftercommit_core::{DispatchError, ProviderJobId, ResourceId};

use crate::transaction::{TransactionCallback, TransactionHandle, TransactionSource};
use crate::types::{EnqueueOptions, Job};

/// Job whose dispatch action counts invocations and records the options it saw.
pub(crate) struct CountingJob {
    pub job: Job,
    pub calls: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<EnqueueOptions>>>,
}

impl CountingJob {
    pub fn new(name: &str) -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let prefix = name.to_string();

        let job = {
            let calls = Arc::clone(&calls);
            let seen = Arc::clone(&seen);
            Job::from_fn(name, move |opts| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                seen.lock().unwrap().push(opts.clone());
                Ok(ProviderJobId::new(format!("{prefix}-{n}")))
            })
        };

        Self { job, calls, seen }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub(crate) fn failing_job(name: &str) -> Job {
    Job::from_fn(name, |_| Err(DispatchError::unavailable("broker down")))
}

/// A resource that fires whatever it is told to, as often as it is told to.
///
/// Used to simulate duplicate and contradictory notifications.
#[derive(Default)]
pub(crate) struct ScriptedTransaction {
    id: ResourceId,
    on_commit: Mutex<Vec<TransactionCallback>>,
    on_rollback: Mutex<Vec<TransactionCallback>>,
}

impl ScriptedTransaction {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fire every commit callback registered so far.
    pub fn fire_commit(&self) {
        let callbacks: Vec<_> = self.on_commit.lock().unwrap().drain(..).collect();
        for cb in callbacks {
            cb();
        }
    }

    /// Fire every rollback callback registered so far.
    pub fn fire_rollback(&self) {
        let callbacks: Vec<_> = self.on_rollback.lock().unwrap().drain(..).collect();
        for cb in callbacks {
            cb();
        }
    }
}

impl TransactionHandle for ScriptedTransaction {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn is_open(&self) -> bool {
        true
    }

    fn register_on_commit(&self, callback: TransactionCallback) {
        self.on_commit.lock().unwrap().push(callback);
    }

    fn register_on_rollback(&self, callback: TransactionCallback) {
        self.on_rollback.lock().unwrap().push(callback);
    }
}

/// Source reporting a fixed set of scripted transactions.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    transactions: Mutex<Vec<Arc<ScriptedTransaction>>>,
}

impl ScriptedSource {
    pub fn with(transactions: &[Arc<ScriptedTransaction>]) -> Arc<Self> {
        Arc::new(Self {
            transactions: Mutex::new(transactions.to_vec()),
        })
    }
}

impl TransactionSource for ScriptedSource {
    fn open_transactions(&self) -> Vec<Arc<dyn TransactionHandle>> {
        self.transactions
            .lock()
            .unwrap()
            .iter()
            .map(|tx| Arc::clone(tx) as Arc<dyn TransactionHandle>)
            .collect()
    }
}
