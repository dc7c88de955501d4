use std::time::Duration;

use foundation::{ConfigError, parse_json_config};
use serde::{Deserialize, Serialize};

/// Retry delay bounds, in milliseconds.
///
/// A partial object keeps the default for whatever it leaves out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    #[serde(rename = "base")]
    pub base_ms: u64,
    #[serde(rename = "max")]
    pub max_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            max_ms: 30_000,
        }
    }
}

impl DelayConfig {
    pub fn base(&self) -> Duration {
        Duration::from_millis(self.base_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

/// Per-consumer load policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Restarts allowed after the first attempt fails.
    pub retries: u32,

    /// Watchdog interval (ms) measured from the moment a load starts.
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,

    pub delay: DelayConfig,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            retries: 5,
            timeout_ms: 10_000,
            delay: DelayConfig::default(),
        }
    }
}

impl LoadConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        parse_json_config(text)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_delay_ms(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.delay = DelayConfig { base_ms, max_ms };
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{DelayConfig, LoadConfig};

    #[test]
    fn empty_object_uses_defaults() {
        let cfg = LoadConfig::from_json("{}").unwrap();
        assert_eq!(cfg, LoadConfig::default());
        assert_eq!(cfg.retries, 5);
        assert_eq!(cfg.timeout_ms, 10_000);
        assert_eq!(
            cfg.delay,
            DelayConfig {
                base_ms: 1_000,
                max_ms: 30_000
            }
        );
    }

    #[test]
    fn partial_delay_merges_with_defaults() {
        let cfg = LoadConfig::from_json(r#"{"retries": 2, "delay": {"base": 250}}"#).unwrap();
        assert_eq!(cfg.retries, 2);
        assert_eq!(cfg.timeout_ms, 10_000);
        assert_eq!(cfg.delay.base_ms, 250);
        assert_eq!(cfg.delay.max_ms, 30_000);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(LoadConfig::from_json(r#"{"timeout": -1}"#).is_err());
    }

    #[test]
    fn serializes_with_prop_names() {
        let json = serde_json::to_value(LoadConfig::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "retries": 5,
                "timeout": 10000,
                "delay": { "base": 1000, "max": 30000 }
            })
        );
    }
}
