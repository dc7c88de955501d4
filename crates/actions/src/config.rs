use std::time::Duration;

use foundation::{ConfigError, parse_json_config};
use serde::{Deserialize, Serialize};

/// Timing of an action control's feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionConfig {
    /// Return to idle after the hold and reset delay.
    pub auto_reset: bool,

    /// How long a settled result is shown before its callback fires (ms).
    #[serde(rename = "waitMilliseconds")]
    pub wait_ms: u64,

    /// Extra time after the callback before resetting to idle (ms).
    #[serde(rename = "resetDelayMilliseconds")]
    pub reset_delay_ms: u64,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            auto_reset: true,
            wait_ms: 1_500,
            reset_delay_ms: 3_000,
        }
    }
}

impl ActionConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        parse_json_config(text)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    pub fn with_auto_reset(mut self, auto_reset: bool) -> Self {
        self.auto_reset = auto_reset;
        self
    }

    pub fn with_wait_ms(mut self, wait_ms: u64) -> Self {
        self.wait_ms = wait_ms;
        self
    }

    pub fn with_reset_delay_ms(mut self, reset_delay_ms: u64) -> Self {
        self.reset_delay_ms = reset_delay_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::ActionConfig;

    #[test]
    fn defaults() {
        let cfg = ActionConfig::from_json("{}").unwrap();
        assert_eq!(cfg, ActionConfig::default());
        assert!(cfg.auto_reset);
        assert_eq!(cfg.wait_ms, 1_500);
        assert_eq!(cfg.reset_delay_ms, 3_000);
    }

    #[test]
    fn reads_prop_names() {
        let cfg = ActionConfig::from_json(
            r#"{"autoReset": false, "waitMilliseconds": 200, "resetDelayMilliseconds": 50}"#,
        )
        .unwrap();
        assert_eq!(
            cfg,
            ActionConfig {
                auto_reset: false,
                wait_ms: 200,
                reset_delay_ms: 50,
            }
        );
        assert_eq!(
            serde_json::to_value(cfg).unwrap(),
            serde_json::json!({
                "autoReset": false,
                "waitMilliseconds": 200,
                "resetDelayMilliseconds": 50
            })
        );
    }
}
