//! Lifecycle events for deferred jobs and the bus that carries them.

pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use event::{DeferralEvent, DeferralEventKind};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
