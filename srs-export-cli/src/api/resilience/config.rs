//! Processing configuration with builder pattern
//!
//! Retry and pacing constants for workbook round trips, with sane defaults
//! matching the values the web part shipped with.

use std::time::Duration;

/// Global processing configuration for an auto-processing run
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingConfig {
    pub retry: RetryConfig,
    pub pacing: PacingConfig,
}

/// Retry policy for lock conflicts on workbook saves
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Wait between attempts after a lock conflict
    pub lock_backoff: Duration,
}

/// Delays between run transitions
#[derive(Debug, Clone, PartialEq)]
pub struct PacingConfig {
    /// Wait after selecting a record before processing it
    pub settle_delay: Duration,
    /// Wait after a record completes
    pub advance_delay: Duration,
    /// Additional wait before the next record is selected
    pub reselect_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            lock_backoff: Duration::from_secs(3),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            advance_delay: Duration::from_secs(2),
            reselect_delay: Duration::from_secs(1),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            pacing: PacingConfig::default(),
        }
    }
}

impl PacingConfig {
    /// Total wait between one record finishing and the next one starting
    pub fn between_records(&self) -> Duration {
        self.advance_delay + self.reselect_delay
    }
}

impl ProcessingConfig {
    /// Create a new builder for ProcessingConfig
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder::new()
    }

    /// No waiting anywhere (for tests and dry runs)
    pub fn immediate() -> Self {
        Self {
            retry: RetryConfig {
                max_attempts: 3,
                lock_backoff: Duration::ZERO,
            },
            pacing: PacingConfig {
                settle_delay: Duration::ZERO,
                advance_delay: Duration::ZERO,
                reselect_delay: Duration::ZERO,
            },
        }
    }

}

/// Builder for ProcessingConfig
#[derive(Debug)]
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl ProcessingConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ProcessingConfig::default(),
        }
    }

    /// Set total attempts per workbook save (at least one)
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts.max(1);
        self
    }

    pub fn lock_backoff(mut self, delay: Duration) -> Self {
        self.config.retry.lock_backoff = delay;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.pacing.settle_delay = delay;
        self
    }

    pub fn advance_delay(mut self, delay: Duration) -> Self {
        self.config.pacing.advance_delay = delay;
        self
    }

    pub fn reselect_delay(mut self, delay: Duration) -> Self {
        self.config.pacing.reselect_delay = delay;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ProcessingConfig {
        self.config
    }
}

impl Default for ProcessingConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
