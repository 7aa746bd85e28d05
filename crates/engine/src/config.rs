//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::run::state::RetryPolicy;

/// Engine-wide configuration, typically loaded once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on concurrently dispatched steps per round.
    pub max_concurrent_steps: usize,

    /// Retry policy applied uniformly to every step.
    pub retry: RetryPolicy,

    /// Default per-step timeout, overridable per step.
    pub step_timeout_secs: u64,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to defaults; a variable that is set but
    /// unparsable is a configuration error.
    pub fn from_env() -> EngineResult<Self> {
        let max_concurrent_steps =
            env_parse::<usize>("TASKFLOW_MAX_CONCURRENT_STEPS")?.unwrap_or(3);
        let max_retries = env_parse::<u32>("TASKFLOW_MAX_RETRIES")?.unwrap_or(3);
        let step_timeout_secs = env_parse::<u64>("TASKFLOW_STEP_TIMEOUT_SECS")?.unwrap_or(60);

        Ok(Self {
            max_concurrent_steps,
            retry: RetryPolicy {
                max_retries,
                ..Default::default()
            },
            step_timeout_secs,
        })
    }

    /// Per-run options derived from this configuration.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            max_concurrent_steps: self.max_concurrent_steps,
            retry: self.retry,
            step_timeout_secs: self.step_timeout_secs,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_steps: 3,
            retry: RetryPolicy::default(),
            step_timeout_secs: 60,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> EngineResult<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value.parse::<T>().map(Some).map_err(|_| {
            crate::error::EngineError::Config(format!("invalid value for {}: {}", name, value))
        }),
        Err(_) => Ok(None),
    }
}

/// Options for a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    /// Upper bound on concurrently dispatched steps per round. The
    /// resource governor may lower the effective value between rounds.
    pub max_concurrent_steps: usize,

    /// Retry policy for this run.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Default per-step timeout in seconds.
    pub step_timeout_secs: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        EngineConfig::default().run_options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_steps, 3);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.step_timeout_secs, 60);
    }

    #[test]
    fn test_run_options_from_config() {
        let config = EngineConfig {
            max_concurrent_steps: 8,
            ..Default::default()
        };
        let options = config.run_options();
        assert_eq!(options.max_concurrent_steps, 8);
    }

    #[test]
    fn test_run_options_serde_defaults_retry() {
        let options: RunOptions = serde_json::from_str(
            r#"{"max_concurrent_steps": 2, "step_timeout_secs": 30}"#,
        )
        .unwrap();
        assert_eq!(options.retry.max_retries, 3);
    }

    #[test]
    fn test_from_env_rejects_unparsable_values() {
        std::env::set_var("TASKFLOW_MAX_RETRIES", "not-a-number");
        let result = EngineConfig::from_env();
        std::env::remove_var("TASKFLOW_MAX_RETRIES");

        let err = result.unwrap_err();
        assert_eq!(err.code(), "config");
        assert!(err.to_string().contains("TASKFLOW_MAX_RETRIES"));
    }
}
