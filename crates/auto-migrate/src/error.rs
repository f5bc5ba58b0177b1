//! Error types for the auto-migration library.

use crate::adapter::{AdapterError, Operation};
use crate::config::Strategy;
use thiserror::Error;

/// Main error type for auto-migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A destructive strategy was requested in a production-like environment
    /// without the explicit override.
    #[error(
        "The `{strategy}` auto-migration strategy is not supported in production. \
         Switch to the `safe` strategy, or set `allow_unsafe_migrations: true` \
         if you really mean to rebuild tables destructively."
    )]
    UnsafeEnvironment { strategy: Strategy },

    /// An attribute is missing the column metadata required for auto-migration.
    #[error(
        "Attribute `{attribute}` in the definition of model `{model}` is missing its \
         migration directives. Every attribute that maps to a physical column must \
         carry directives so that auto-migration cannot produce an invalid schema."
    )]
    MissingDirectives { model: String, attribute: String },

    /// The declared primary key attribute does not resolve to a physical column.
    #[error(
        "Primary key attribute `{attribute}` on model `{model}` does not map to a \
         physical column"
    )]
    InvalidPrimaryKey { model: String, attribute: String },

    /// A model references a datastore with no registered adapter.
    #[error("Model `{model}` references unknown datastore `{datastore}`")]
    UnknownDatastore { model: String, datastore: String },

    /// An adapter operation failed.
    #[error("Adapter `{operation}` operation failed: {source}")]
    Adapter {
        operation: Operation,
        #[source]
        source: AdapterError,
    },

    /// A per-model migration task panicked.
    #[error("Migration task for model `{model}` panicked: {message}")]
    TaskPanicked { model: String, message: String },

    /// One or more models failed to migrate. Carries every per-model failure,
    /// not just the first one observed.
    #[error(
        "Auto-migration failed for {} model(s): {}",
        .failures.len(),
        failed_models(.failures)
    )]
    StrategyFailed { failures: Vec<ModelFailure> },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One failed model migration: which model, during which physical operation,
/// and the underlying error.
#[derive(Debug)]
pub struct ModelFailure {
    /// Identity of the model that failed.
    pub model: String,

    /// Physical operation that was being performed.
    pub operation: Operation,

    /// The underlying error, propagated unmodified.
    pub error: MigrateError,
}

fn failed_models(failures: &[ModelFailure]) -> String {
    failures
        .iter()
        .map(|f| f.model.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl MigrateError {
    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for this error, used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_)
            | MigrateError::Io(_)
            | MigrateError::Yaml(_)
            | MigrateError::Json(_) => 2,
            MigrateError::UnsafeEnvironment { .. } => 3,
            _ => 1,
        }
    }
}

/// Result type alias for auto-migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_failed_lists_every_model() {
        let err = MigrateError::StrategyFailed {
            failures: vec![
                ModelFailure {
                    model: "user".to_string(),
                    operation: Operation::Define,
                    error: MigrateError::Config("boom".to_string()),
                },
                ModelFailure {
                    model: "order".to_string(),
                    operation: Operation::Drop,
                    error: MigrateError::Config("boom".to_string()),
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("2 model(s)"));
        assert!(message.contains("user"));
        assert!(message.contains("order"));
    }

    #[test]
    fn test_adapter_error_chain_in_detailed_format() {
        let err = MigrateError::Adapter {
            operation: Operation::Define,
            source: AdapterError::other("connection refused"),
        };
        let detailed = err.format_detailed();
        assert!(detailed.contains("Caused by"));
        assert!(detailed.contains("connection refused"));
    }
}
