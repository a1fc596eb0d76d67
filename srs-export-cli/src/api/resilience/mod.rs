//! Retry and pacing policy for workbook round trips
//!
//! Provides the lock-conflict retry policy and the delays an
//! auto-processing run waits between transitions.

pub mod config;
pub mod retry;

pub use config::{PacingConfig, ProcessingConfig, ProcessingConfigBuilder, RetryConfig};
pub use retry::{RetryPolicy, RetryReport};
