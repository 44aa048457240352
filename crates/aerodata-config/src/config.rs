//! Configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AeroDataConfig {
    /// Backend compiler settings
    pub compiler: CompilerConfig,
    /// Execution layer settings
    pub execution: ExecutionConfig,
    /// Validation engine settings
    pub validation: ValidationConfig,
    /// Schema declaration file consumed at registry construction
    pub schema_path: Option<PathBuf>,
}

impl AeroDataConfig {
    /// Reject values the engine cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compiler.max_relational_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "compiler.max_relational_depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.compiler.max_graph_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "compiler.max_graph_depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.execution.retry.validate()
    }
}

/// SQL flavour emitted by the relational compiler.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    /// Named `:param` placeholders
    #[default]
    Sqlite,
    /// Positional `$n` placeholders
    Postgres,
}

/// Backend compiler settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompilerConfig {
    /// Dialect for relational output
    pub sql_dialect: SqlDialect,
    /// Deepest traversal chain lowered to joins
    pub max_relational_depth: usize,
    /// Deepest traversal chain lowered to pattern hops
    pub max_graph_depth: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            sql_dialect: SqlDialect::Sqlite,
            max_relational_depth: 3,
            max_graph_depth: 8,
        }
    }
}

/// Execution layer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Retry policy for transient backend failures
    pub retry: RetryConfig,
    /// Reject a whole batch when any mapped entity has error-level violations
    pub strict_results: bool,
}

/// Retry configuration for transient backend errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay for exponential backoff
    pub base_delay_ms: u64,
    /// Maximum delay between attempts
    pub max_delay_ms: u64,
    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let delay_ms = delay_ms.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(delay_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "execution.retry.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.backoff_multiplier >= 1.0) {
            return Err(ConfigError::Invalid {
                field: "execution.retry.backoff_multiplier".to_string(),
                reason: format!("must be >= 1.0, got {}", self.backoff_multiplier),
            });
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::Invalid {
                field: "execution.retry.base_delay_ms".to_string(),
                reason: "must not exceed max_delay_ms".to_string(),
            });
        }
        Ok(())
    }
}

/// Validation engine settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Stop at the first violation instead of collecting all of them
    pub fail_fast: bool,
    /// Material standards table; the built-in ASTM table is used when absent
    pub standards_path: Option<PathBuf>,
}
