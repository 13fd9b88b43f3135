//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Invalid capacity or rate settings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("max-concurrent must be at least 1, got {0}")]
    MaxConcurrent(usize),

    #[error("rate-limit must be at least 1, got {0}")]
    RateLimit(usize),

    #[error("window-ms must be greater than zero")]
    ZeroWindow,

    #[error("poll-interval-ms must be greater than zero")]
    ZeroPollInterval,

    #[error("channel-buffer must be greater than zero")]
    ZeroChannelBuffer,
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Max items running at once
    #[serde(rename = "max-concurrent", default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Max admissions per rate window
    #[serde(rename = "rate-limit", default = "default_rate_limit")]
    pub rate_limit: usize,

    /// Rate window duration in milliseconds
    #[serde(rename = "window-ms", default = "default_window_ms")]
    pub window_ms: u64,

    /// Admission cycle period in milliseconds
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Command channel buffer size
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_rate_limit() -> usize {
    10
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_channel_buffer() -> usize {
    256
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            rate_limit: default_rate_limit(),
            window_ms: default_window_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            channel_buffer: default_channel_buffer(),
        }
    }
}

impl SchedulerConfig {
    /// Get the rate window as a Duration
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Get the admission cycle period as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_concurrent < 1 {
            return Err(ConfigurationError::MaxConcurrent(self.max_concurrent));
        }
        if self.rate_limit < 1 {
            return Err(ConfigurationError::RateLimit(self.rate_limit));
        }
        if self.window_ms == 0 {
            return Err(ConfigurationError::ZeroWindow);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigurationError::ZeroPollInterval);
        }
        if self.channel_buffer == 0 {
            return Err(ConfigurationError::ZeroChannelBuffer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.window_ms, 60_000);
        assert_eq!(config.poll_interval_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations() {
        let config = SchedulerConfig {
            window_ms: 120_000,
            poll_interval_ms: 250,
            ..Default::default()
        };
        assert_eq!(config.window(), Duration::from_secs(120));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = SchedulerConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigurationError::MaxConcurrent(0)));
    }

    #[test]
    fn test_zero_rate_and_window_rejected() {
        let config = SchedulerConfig {
            rate_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigurationError::RateLimit(0)));

        let config = SchedulerConfig {
            window_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigurationError::ZeroWindow));

        let config = SchedulerConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigurationError::ZeroPollInterval));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: SchedulerConfig = serde_yaml::from_str("max-concurrent: 2\n").unwrap();
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.window_ms, 60_000);
    }
}
