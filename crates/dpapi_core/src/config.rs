//! Kernel configuration.
//!
//! # Responsibility
//! - Describe the policy knobs a kernel instance is built with.
//! - Read those knobs from `DPAPI_*` environment variables for adapters.
//!
//! # Invariants
//! - The freeze policy is fixed for the lifetime of a kernel instance.
//! - Unparseable environment values are rejected, never silently defaulted.

use crate::kernel::error::{KernelError, KernelResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_FREEZE_POLICY: &str = "DPAPI_FREEZE_POLICY";
pub const ENV_MAX_HANDLES: &str = "DPAPI_MAX_HANDLES";
pub const ENV_DB_PATH: &str = "DPAPI_DB_PATH";
pub const ENV_TRACE: &str = "DPAPI_TRACE";

/// What an append to a frozen node does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezePolicy {
    /// Open `current + 1` as a mutable version and append there.
    #[default]
    NewVersion,
    /// Fail with `SourceFrozen`.
    Reject,
}

impl FreezePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewVersion => "new_version",
            Self::Reject => "reject",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new_version" => Some(Self::NewVersion),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Construction-time settings for one `Kernel`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub freeze_policy: FreezePolicy,
    /// Upper bound on handles handed out over the kernel's lifetime.
    pub max_handles: Option<u32>,
    /// SQLite file used by `sync` and `revive`. Persistence is off when unset.
    pub db_path: Option<PathBuf>,
    /// Record a provtrace of every successful operation.
    pub trace: bool,
}

impl KernelConfig {
    /// Builds a config from `DPAPI_*` environment variables.
    ///
    /// Unset or blank variables keep their defaults.
    ///
    /// # Errors
    /// - `InitFailure` when a variable is set to an unsupported value.
    pub fn from_env() -> KernelResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> KernelResult<Self> {
        let read = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        if let Some(raw) = read(ENV_FREEZE_POLICY) {
            config.freeze_policy = FreezePolicy::parse(&raw).ok_or_else(|| {
                KernelError::InitFailure(format!(
                    "unsupported {ENV_FREEZE_POLICY} `{raw}`; expected new_version|reject"
                ))
            })?;
        }

        if let Some(raw) = read(ENV_MAX_HANDLES) {
            let limit = raw.parse::<u32>().map_err(|err| {
                KernelError::InitFailure(format!("invalid {ENV_MAX_HANDLES} `{raw}`: {err}"))
            })?;
            config.max_handles = Some(limit);
        }

        config.db_path = read(ENV_DB_PATH).map(PathBuf::from);

        if let Some(raw) = read(ENV_TRACE) {
            config.trace = match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(KernelError::InitFailure(format!(
                        "invalid {ENV_TRACE} `{other}`; expected a boolean"
                    )));
                }
            };
        }

        Ok(config)
    }
}
