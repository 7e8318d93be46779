//! Process-wide logging setup for services embedding the deferral coordinator.

/// Tracing subscriber installation.
pub mod tracing;

pub use self::tracing::{LogFormat, init, init_with};
