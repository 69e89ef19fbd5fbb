#![forbid(unsafe_code)]

//! Hub configuration.
//!
//! Builder-style like the rest of the crate, plus an environment reader so an
//! application can flip diagnostics without recompiling:
//!
//! | Variable | Values | Effect |
//! |----------|--------|--------|
//! | `SIGSLOT_DUPLICATE_SIGNAL` | `reject` / `replace` | [`DuplicateSignalPolicy`] |
//! | `SIGSLOT_CHECK_SLOT_NAMES` | `1`/`true`/`yes`/`on` or anything else | duplicate slot-name panic |
//!
//! Unset variables keep the defaults.

use tracing::warn;

use crate::signal::SignalConfig;

pub const ENV_DUPLICATE_SIGNAL: &str = "SIGSLOT_DUPLICATE_SIGNAL";
pub const ENV_CHECK_SLOT_NAMES: &str = "SIGSLOT_CHECK_SLOT_NAMES";

/// What [`SignalHub::add_signal`](super::SignalHub::add_signal) does when a
/// live signal is already registered under the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateSignalPolicy {
    /// Fail with [`SigslotError::DuplicateSignal`](crate::SigslotError::DuplicateSignal).
    #[default]
    Reject,
    /// Unregister the old signal (it keeps its connections but can no longer
    /// be reached by name) and register the new one.
    Replace,
}

impl DuplicateSignalPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(Self::Reject),
            "replace" => Some(Self::Replace),
            _ => None,
        }
    }
}

/// Configuration for a [`SignalHub`](super::SignalHub).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Label used in log output.
    pub label: String,
    /// Behavior on a second live registration of the same name.
    pub duplicate_signal: DuplicateSignalPolicy,
    /// Passed to every signal the hub creates.
    pub check_duplicate_slot_names: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            label: "hub".to_owned(),
            duplicate_signal: DuplicateSignalPolicy::default(),
            check_duplicate_slot_names: cfg!(debug_assertions),
        }
    }
}

#[inline]
fn env_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl HubConfig {
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_duplicate_signal(mut self, policy: DuplicateSignalPolicy) -> Self {
        self.duplicate_signal = policy;
        self
    }

    #[must_use]
    pub fn with_duplicate_slot_check(mut self, enabled: bool) -> Self {
        self.check_duplicate_slot_names = enabled;
        self
    }

    /// Defaults overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `get_env`, which maps a variable name to its value.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = get_env(ENV_DUPLICATE_SIGNAL) {
            match DuplicateSignalPolicy::parse(&raw) {
                Some(policy) => config.duplicate_signal = policy,
                None => warn!(
                    value = %raw,
                    "ignoring unknown {ENV_DUPLICATE_SIGNAL} value"
                ),
            }
        }
        if let Some(raw) = get_env(ENV_CHECK_SLOT_NAMES) {
            config.check_duplicate_slot_names = env_flag(&raw);
        }
        config
    }

    pub(crate) fn signal_config(&self) -> SignalConfig {
        SignalConfig::default().with_duplicate_slot_check(self.check_duplicate_slot_names)
    }
}
