//! Tunables for the beat loop and its evaluation window.

use serde::Deserialize;
use std::num::NonZeroUsize;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CADENCE_SECS: u64 = 60;
const DEFAULT_PUBLISH_CONCURRENCY: usize = 8;
const DEFAULT_PHASE_ONE_TIMEOUT_SECS: u64 = 30;

/// Errors raised while validating scheduler configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A duration that must be positive was zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// The cron tolerance band is narrower than the beat cadence, so cron
    /// occurrences between two beats would never be seen.
    #[error("polling window ({window:?}) must not be shorter than the cadence ({cadence:?})")]
    WindowShorterThanCadence {
        /// Configured polling window.
        window: Duration,
        /// Configured cadence.
        cadence: Duration,
    },

    /// Publish concurrency must allow at least one worker.
    #[error("publish concurrency must be at least 1")]
    ZeroConcurrency,

    /// The polling window cannot be represented as a calendar duration.
    #[error("polling window {0:?} is out of range")]
    WindowOutOfRange(Duration),
}

/// Validated scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSchedulerConfig")]
pub struct SchedulerConfig {
    cadence: Duration,
    polling_window: Duration,
    publish_concurrency: NonZeroUsize,
    phase_one_timeout: Duration,
}

impl SchedulerConfig {
    /// Builds a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any value is zero or the polling window
    /// is shorter than the cadence.
    pub fn new(
        cadence: Duration,
        polling_window: Duration,
        publish_concurrency: usize,
        phase_one_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if cadence.is_zero() {
            return Err(ConfigError::ZeroDuration("cadence"));
        }
        if polling_window.is_zero() {
            return Err(ConfigError::ZeroDuration("polling window"));
        }
        if phase_one_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("phase one timeout"));
        }
        if polling_window < cadence {
            return Err(ConfigError::WindowShorterThanCadence {
                window: polling_window,
                cadence,
            });
        }
        chrono::Duration::from_std(polling_window)
            .map_err(|_| ConfigError::WindowOutOfRange(polling_window))?;
        let publish_concurrency =
            NonZeroUsize::new(publish_concurrency).ok_or(ConfigError::ZeroConcurrency)?;

        Ok(Self {
            cadence,
            polling_window,
            publish_concurrency,
            phase_one_timeout,
        })
    }

    /// Interval between beat cycles.
    #[must_use]
    pub const fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Tolerance band for cron due-ness.
    #[must_use]
    pub const fn polling_window(&self) -> Duration {
        self.polling_window
    }

    /// Polling window as a calendar duration for schedule arithmetic.
    #[must_use]
    pub fn polling_window_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.polling_window).unwrap_or(chrono::Duration::MAX)
    }

    /// Upper bound on concurrent publishes within one cycle.
    #[must_use]
    pub const fn publish_concurrency(&self) -> NonZeroUsize {
        self.publish_concurrency
    }

    /// Upper bound on one evaluation transaction.
    #[must_use]
    pub const fn phase_one_timeout(&self) -> Duration {
        self.phase_one_timeout
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let cadence = Duration::from_secs(DEFAULT_CADENCE_SECS);
        Self {
            cadence,
            polling_window: cadence,
            publish_concurrency: NonZeroUsize::new(DEFAULT_PUBLISH_CONCURRENCY)
                .unwrap_or(NonZeroUsize::MIN),
            phase_one_timeout: Duration::from_secs(DEFAULT_PHASE_ONE_TIMEOUT_SECS),
        }
    }
}

/// Serialized configuration, in whole seconds.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawSchedulerConfig {
    cadence_secs: u64,
    polling_window_secs: Option<u64>,
    publish_concurrency: usize,
    phase_one_timeout_secs: u64,
}

impl Default for RawSchedulerConfig {
    fn default() -> Self {
        Self {
            cadence_secs: DEFAULT_CADENCE_SECS,
            polling_window_secs: None,
            publish_concurrency: DEFAULT_PUBLISH_CONCURRENCY,
            phase_one_timeout_secs: DEFAULT_PHASE_ONE_TIMEOUT_SECS,
        }
    }
}

impl TryFrom<RawSchedulerConfig> for SchedulerConfig {
    type Error = ConfigError;

    fn try_from(raw: RawSchedulerConfig) -> Result<Self, Self::Error> {
        let cadence = Duration::from_secs(raw.cadence_secs);
        let polling_window = raw
            .polling_window_secs
            .map_or(cadence, Duration::from_secs);
        Self::new(
            cadence,
            polling_window,
            raw.publish_concurrency,
            Duration::from_secs(raw.phase_one_timeout_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SchedulerConfig};
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    fn default_uses_one_minute_cadence_and_window() {
        let config = SchedulerConfig::default();
        assert_eq!(config.cadence(), Duration::from_secs(60));
        assert_eq!(config.polling_window(), Duration::from_secs(60));
        assert_eq!(config.publish_concurrency().get(), 8);
        assert_eq!(config.polling_window_delta(), chrono::Duration::seconds(60));
    }

    #[rstest]
    fn rejects_window_shorter_than_cadence() {
        let result = SchedulerConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(30),
            4,
            Duration::from_secs(10),
        );
        assert_eq!(
            result,
            Err(ConfigError::WindowShorterThanCadence {
                window: Duration::from_secs(30),
                cadence: Duration::from_secs(60),
            })
        );
    }

    #[rstest]
    #[case(0, 60, 1, 10, ConfigError::ZeroDuration("cadence"))]
    #[case(60, 60, 0, 10, ConfigError::ZeroConcurrency)]
    #[case(60, 60, 1, 0, ConfigError::ZeroDuration("phase one timeout"))]
    fn rejects_zero_values(
        #[case] cadence: u64,
        #[case] window: u64,
        #[case] concurrency: usize,
        #[case] timeout: u64,
        #[case] expected: ConfigError,
    ) {
        let result = SchedulerConfig::new(
            Duration::from_secs(cadence),
            Duration::from_secs(window),
            concurrency,
            Duration::from_secs(timeout),
        );
        assert_eq!(result, Err(expected));
    }

    #[rstest]
    fn deserializes_seconds_with_window_defaulting_to_cadence() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{"cadence_secs": 30, "publish_concurrency": 2}"#)
                .expect("valid configuration");
        assert_eq!(config.cadence(), Duration::from_secs(30));
        assert_eq!(config.polling_window(), Duration::from_secs(30));
        assert_eq!(config.publish_concurrency().get(), 2);
    }

    #[rstest]
    fn deserialization_applies_validation() {
        let result = serde_json::from_str::<SchedulerConfig>(r#"{"cadence_secs": 0}"#);
        assert!(result.is_err());
    }
}
