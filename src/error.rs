//! Error types for the governor's ambient surfaces.
//!
//! Budget exhaustion is not an error: it is signalled through
//! [`ExecutionGuarantees::must_stop`](crate::guarantees::ExecutionGuarantees::must_stop)
//! and [`DegradationPlan`](crate::guarantees::DegradationPlan). The variants here
//! cover allocation cancellation and configuration handling only.

use thiserror::Error;

/// Errors that can occur while allocating compute or loading settings.
#[derive(Error, Debug)]
pub enum GovernorError {
    /// The caller's cancellation token fired before allocation.
    #[error("allocation cancelled")]
    Cancelled,

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Settings could not be read or deserialized.
    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for governor operations.
pub type Result<T> = std::result::Result<T, GovernorError>;
