//! Runtime configuration for the infrastructure layer.

use std::time::Duration;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5_000);

const LOCK_TIMEOUT_VAR: &str = "STOCKLINE_LOCK_TIMEOUT_MS";
const LOW_STOCK_EVENTS_VAR: &str = "STOCKLINE_LOW_STOCK_EVENTS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraConfig {
    /// How long a unit of work waits for the store before failing as unavailable.
    pub lock_timeout: Duration,
    /// Publish `ReorderLevelReached` when an item drops to its reorder level.
    pub low_stock_events: bool,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            low_stock_events: true,
        }
    }
}

impl InfraConfig {
    /// Read overrides from the environment; unset or unparsable values keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(LOCK_TIMEOUT_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.lock_timeout = Duration::from_millis(ms),
                Err(err) => tracing::warn!(
                    var = LOCK_TIMEOUT_VAR,
                    value = %raw,
                    error = %err,
                    "ignoring invalid lock timeout"
                ),
            }
        }

        if let Some(raw) = lookup(LOW_STOCK_EVENTS_VAR) {
            match parse_flag(&raw) {
                Some(flag) => config.low_stock_events = flag,
                None => tracing::warn!(
                    var = LOW_STOCK_EVENTS_VAR,
                    value = %raw,
                    "ignoring invalid flag (expected true/false)"
                ),
            }
        }

        config
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
