//! Process-local bus for lifecycle events, used by tests and the demo.

use std::sync::{Mutex, mpsc};

use crate::bus::{EventBus, Subscription};
use crate::event::DeferralEvent;

#[derive(Debug, thiserror::Error)]
pub enum InMemoryBusError {
    /// A subscriber list lock was poisoned by a panicking publisher.
    #[error("event bus lock poisoned")]
    Poisoned,
}

/// Fans lifecycle events out to every live subscription.
///
/// Publishers are coordinator hooks, which run on whichever thread resolved
/// the transaction, so `publish` never blocks on a reader. A subscription that
/// misses an event only loses the notification: the job's outcome was decided
/// before the event was built. Subscriptions whose receiver is gone stop being
/// fed at the next publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M = DeferralEvent> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live subscriptions as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, event: M) -> Result<(), Self::Error> {
        let mut subscribers = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (sender, receiver) = mpsc::channel();

        // After a poisoned publish the subscription stays silent.
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(sender);
        }

        Subscription::new(receiver)
    }
}

#[cfg(test)]
mod tests {
    use aftercommit_core::JobId;

    use super::*;
    use crate::event::DeferralEventKind;

    #[test]
    fn every_subscriber_gets_a_copy() {
        let bus = InMemoryEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(7u32).unwrap();

        assert_eq!(a.try_recv().unwrap(), 7);
        assert_eq!(b.try_recv().unwrap(), 7);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = InMemoryEventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish("x").unwrap();

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.drain(), vec!["x"]);
    }

    #[test]
    fn lifecycle_events_arrive_in_publish_order() {
        let bus: InMemoryEventBus = InMemoryEventBus::new();
        let sub = bus.subscribe();
        let job_id = JobId::new();

        bus.publish(DeferralEvent::new(
            job_id,
            "receipt",
            "inline",
            DeferralEventKind::Deferred { dependencies: 1 },
        ))
        .unwrap();
        bus.publish(DeferralEvent::new(job_id, "receipt", "inline", DeferralEventKind::Dropped))
            .unwrap();

        let types: Vec<_> = sub.drain().iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["deferred.job", "dropped.job"]);
    }
}
