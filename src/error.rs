//! Error taxonomy: configuration, bundle import, and in-run faults.

use thiserror::Error;

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"station.preemption_premium"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Rejection of an experiment bundle. Imports are all-or-nothing.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("bundle is missing table `{0}`")]
    MissingTable(String),
    #[error("table `{table}` is missing required column `{column}`")]
    MissingColumn { table: String, column: String },
    #[error("table `{table}` is malformed: {message}")]
    Malformed { table: String, message: String },
    #[error("cannot read bundle archive: {0}")]
    Archive(String),
    #[error("bundle config rejected: {0}")]
    Config(#[from] ConfigError),
}

/// Internal invariant violation during a tick. Fatal to the run that raised it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("run fault at tick {tick}: {message}")]
pub struct RunFault {
    pub tick: usize,
    pub message: String,
}

/// Umbrella error for callers that mix configuration, I/O, and run failures.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Fault(#[from] RunFault),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
