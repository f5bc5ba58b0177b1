//! Adapter boundary for physical schema operations.
//!
//! The migration core never talks to a database directly. Everything that
//! touches the physical layer goes through the [`Adapter`] trait, and every
//! adapter failure arrives as a tagged [`AdapterError`] variant so callers
//! never have to sniff error shapes.

mod memory;

pub use memory::{AdapterCall, MemoryAdapter};

use crate::schema::TableSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Physical operation an adapter was performing when a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    /// Dropping an existing table.
    Drop,

    /// Creating or replacing a table to match a spec.
    Define,

    /// Reinserting migrated records (used by data-preserving strategies).
    CreateEach,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::Drop => "drop",
            Operation::Define => "define",
            Operation::CreateEach => "createEach",
        };
        write!(f, "{}", label)
    }
}

/// Failure raised by an adapter, tagged by kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// Existing records conflicted with a uniqueness constraint.
    #[error("uniqueness constraint violated: {details}")]
    UniquenessViolation { details: String },

    /// Existing records could not be coerced to the new schema.
    #[error("records could not be coerced to the new schema: {details}")]
    CoercionFailure { details: String },

    /// Anything else: connectivity, permissions, adapter bugs.
    #[error("{summary}")]
    Other {
        summary: String,
        /// Adapter-specific detail, when available.
        detail: Option<String>,
    },
}

impl AdapterError {
    /// Create an unclassified adapter error with no extra detail.
    pub fn other(summary: impl Into<String>) -> Self {
        AdapterError::Other {
            summary: summary.into(),
            detail: None,
        }
    }
}

/// Trait for adapters that execute physical schema operations.
///
/// Implementations must be safe for concurrent use: the executor issues
/// `define` calls for independent tables simultaneously.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Create or replace the named table so its structure matches `spec`
    /// exactly, including the primary-key column. Existing contents of the
    /// table are not preserved.
    async fn define(
        &self,
        datastore: &str,
        table: &str,
        spec: &TableSpec,
    ) -> std::result::Result<(), AdapterError>;

    /// Drop the named table if it exists.
    async fn drop_table(&self, datastore: &str, table: &str)
        -> std::result::Result<(), AdapterError>;

    /// Short identifier for the adapter implementation.
    fn adapter_type(&self) -> &'static str;
}
