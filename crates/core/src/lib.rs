//! Identifiers and error model shared by the deferral crates.
//!
//! No runtime concerns live here: no locks, no logging, no IO.

pub mod error;
pub mod id;

pub use error::{DeferralError, DeferralResult, DispatchError};
pub use id::{JobId, ProviderJobId, ResourceId};
