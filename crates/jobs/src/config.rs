//! Coordinator configuration.

use tracing::warn;

use crate::policy::DeferralPolicy;

/// Environment variable holding the policy name.
pub const POLICY_ENV: &str = "AFTERCOMMIT_POLICY";
/// Environment variable holding the adapter name reported in events.
pub const ADAPTER_ENV: &str = "AFTERCOMMIT_ADAPTER";

const DEFAULT_ADAPTER: &str = "inline";

/// Deferral coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Initial policy; can be changed later through `set_policy`
    pub policy: DeferralPolicy,
    /// Queue adapter name, reported in lifecycle events and logs
    pub adapter: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            policy: DeferralPolicy::default(),
            adapter: DEFAULT_ADAPTER.to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn with_policy(mut self, policy: DeferralPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = adapter.into();
        self
    }

    /// Read `AFTERCOMMIT_POLICY` / `AFTERCOMMIT_ADAPTER`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unknown policy names log a warning
    /// and keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(POLICY_ENV) {
            match raw.parse::<DeferralPolicy>() {
                Ok(policy) => config.policy = policy,
                Err(e) => warn!(
                    error = %e,
                    fallback = %config.policy,
                    "AFTERCOMMIT_POLICY not recognised; using default policy"
                ),
            }
        }

        if let Some(adapter) = lookup(ADAPTER_ENV).filter(|a| !a.trim().is_empty()) {
            config.adapter = adapter.trim().to_string();
        }

        config
    }
}
