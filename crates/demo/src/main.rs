//! Walks through the commit, rollback and raise paths against in-memory
//! transactions. Policy and adapter name come from `AFTERCOMMIT_POLICY` /
//! `AFTERCOMMIT_ADAPTER`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use tracing::info;

use aftercommit_events::{EventBus, InMemoryEventBus};
use aftercommit_jobs::{
    CoordinatorConfig, DeferralCoordinator, DeferralError, DeferralEvent, DeferralPolicy, EnqueueOptions,
    InMemoryTransactionSource, Job, ProviderJobId,
};
use aftercommit_observability::LogFormat;

fn queued_job(name: &str, sequence: Arc<AtomicU64>) -> Job {
    let label = name.to_string();
    Job::from_fn(name, move |opts| {
        let n = sequence.fetch_add(1, Ordering::SeqCst) + 1;
        info!(job = %label, queue = opts.queue.as_deref().unwrap_or("default"), "queue accepted job");
        Ok(ProviderJobId::new(format!("demo-{n}")))
    })
}

fn main() -> anyhow::Result<()> {
    aftercommit_observability::init_with(LogFormat::Pretty, "info");

    let config = CoordinatorConfig::from_env();
    let source = InMemoryTransactionSource::arc();
    let coordinator = DeferralCoordinator::new(Arc::clone(&source), config);
    let sequence = Arc::new(AtomicU64::new(0));

    let bus: Arc<InMemoryEventBus<DeferralEvent>> = Arc::new(InMemoryEventBus::new());
    let events = bus.subscribe();
    coordinator.publish_to(Arc::clone(&bus));

    info!(policy = %coordinator.policy(), adapter = coordinator.adapter(), "coordinator ready");

    // Two transactions, both commit: dispatched after the second.
    let (orders, ledger) = (source.begin(), source.begin());
    let receipt = queued_job("SendReceipt", Arc::clone(&sequence));
    let outcome = coordinator
        .enqueue(&receipt, EnqueueOptions::new().with_queue("mailers"))
        .context("enqueue SendReceipt")?;
    info!(?outcome, "SendReceipt enqueued");
    orders.commit();
    ledger.commit();

    // Partial commit then rollback: dropped.
    let (orders, ledger) = (source.begin(), source.begin());
    let invoice = queued_job("IssueInvoice", Arc::clone(&sequence));
    coordinator
        .enqueue(&invoice, EnqueueOptions::new())
        .context("enqueue IssueInvoice")?;
    orders.commit();
    ledger.rollback();

    // Provider id requested while still deferred: dispatched on the spot.
    let tx = source.begin();
    let export = queued_job("ExportReport", Arc::clone(&sequence));
    coordinator
        .enqueue(&export, EnqueueOptions::new())
        .context("enqueue ExportReport")?;
    let provider_job_id = coordinator
        .resolve_provider_job_id(&export)
        .context("resolve ExportReport provider id")?;
    info!(provider_job_id = ?provider_job_id, "ExportReport resolved early");
    tx.commit();

    // Raise policy refuses while a transaction is open.
    coordinator.set_policy(DeferralPolicy::Raise);
    let tx = source.begin();
    match coordinator.enqueue(&queued_job("Audit", Arc::clone(&sequence)), EnqueueOptions::new()) {
        Err(DeferralError::OpenTransaction { open, .. }) => info!(open, "Audit rejected as expected"),
        other => anyhow::bail!("expected Audit to be rejected, got {other:?}"),
    }
    tx.rollback();

    for event in events.drain() {
        info!(event = event.event_type(), job = event.job_name(), "lifecycle event");
    }

    println!("{}", serde_json::to_string_pretty(&coordinator.stats())?);
    Ok(())
}
