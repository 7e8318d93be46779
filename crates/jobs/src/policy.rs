//! Deferral policy and its process-wide, atomically published cell.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use aftercommit_core::DeferralError;

/// How an enqueue request behaves while transactions are open.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferralPolicy {
    /// Hold the job until every open transaction resolves.
    #[default]
    Defer,
    /// Dispatch immediately, ignoring open transactions.
    Enqueue,
    /// Refuse to enqueue while any transaction is open.
    Raise,
    /// Defer only when a transaction is open; otherwise dispatch.
    ///
    /// Behaves exactly like `Defer` since deferral already requires an open
    /// transaction.
    Compatible,
}

impl DeferralPolicy {
    pub const ALL: [DeferralPolicy; 4] = [Self::Defer, Self::Enqueue, Self::Raise, Self::Compatible];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Defer => "defer",
            Self::Enqueue => "enqueue",
            Self::Raise => "raise",
            Self::Compatible => "compatible",
        }
    }

    /// True when an open transaction should park the job.
    pub fn defers_when_open(self) -> bool {
        matches!(self, Self::Defer | Self::Compatible)
    }

    /// True when an open transaction should fail the enqueue.
    pub fn rejects_when_open(self) -> bool {
        matches!(self, Self::Raise)
    }

    fn to_bits(self) -> u8 {
        match self {
            Self::Defer => 0,
            Self::Enqueue => 1,
            Self::Raise => 2,
            Self::Compatible => 3,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::Enqueue,
            2 => Self::Raise,
            3 => Self::Compatible,
            _ => Self::Defer,
        }
    }
}

impl fmt::Display for DeferralPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeferralPolicy {
    type Err = DeferralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DeferralError::invalid_policy(wanted))
    }
}

/// Shared, atomically published policy value.
///
/// Written rarely (administrative setter), read on every enqueue.
#[derive(Debug)]
pub struct PolicyCell(AtomicU8);

impl PolicyCell {
    pub fn new(policy: DeferralPolicy) -> Self {
        Self(AtomicU8::new(policy.to_bits()))
    }

    pub fn load(&self) -> DeferralPolicy {
        DeferralPolicy::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Publish a new policy; returns the previous one.
    pub fn store(&self, policy: DeferralPolicy) -> DeferralPolicy {
        DeferralPolicy::from_bits(self.0.swap(policy.to_bits(), Ordering::AcqRel))
    }
}

impl Default for PolicyCell {
    fn default() -> Self {
        Self::new(DeferralPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("RAISE".parse::<DeferralPolicy>().unwrap(), DeferralPolicy::Raise);
        assert_eq!(" compatible ".parse::<DeferralPolicy>().unwrap(), DeferralPolicy::Compatible);
    }

    #[test]
    fn unknown_policy_is_an_error() {
        let err = "later".parse::<DeferralPolicy>().unwrap_err();
        assert_eq!(err, DeferralError::invalid_policy("later"));
    }

    #[test]
    fn compatible_defers_like_defer() {
        assert!(DeferralPolicy::Compatible.defers_when_open());
        assert!(DeferralPolicy::Defer.defers_when_open());
        assert!(!DeferralPolicy::Enqueue.defers_when_open());
        assert!(!DeferralPolicy::Raise.defers_when_open());
        assert!(DeferralPolicy::Raise.rejects_when_open());
    }

    #[test]
    fn cell_round_trips_every_policy() {
        let cell = PolicyCell::default();
        assert_eq!(cell.load(), DeferralPolicy::Defer);

        for policy in DeferralPolicy::ALL {
            cell.store(policy);
            assert_eq!(cell.load(), policy);
        }
    }

    #[test]
    fn store_returns_previous_policy() {
        let cell = PolicyCell::new(DeferralPolicy::Raise);
        assert_eq!(cell.store(DeferralPolicy::Enqueue), DeferralPolicy::Raise);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&DeferralPolicy::Compatible).unwrap();
        assert_eq!(json, "\"compatible\"");
    }
}
