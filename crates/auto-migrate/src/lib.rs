//! # auto-migrate
//!
//! Schema auto-migration core: reconcile logical model definitions against
//! physical tables through a pluggable adapter.
//!
//! This library provides:
//!
//! - **Table spec building** from model attribute definitions, with the
//!   primary key column flagged
//! - **Migration strategies** (`safe`, `create`, `drop`) executed
//!   concurrently across models with a configurable worker pool
//! - **A production guard** refusing destructive strategies unless
//!   explicitly overridden
//! - **Failure classification and reporting** through an injectable
//!   diagnostic sink
//!
//! ## Example
//!
//! ```rust,no_run
//! use auto_migrate::{Config, MemoryAdapter, Migrator, SchemaRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> auto_migrate::Result<()> {
//!     let config = Config::load("migrate.yaml")?;
//!     let registry = SchemaRegistry::load("models.yaml")?;
//!
//!     let migrator = Migrator::new(config, registry)
//!         .register_datastore("default", Arc::new(MemoryAdapter::new()));
//!
//!     let report = migrator.run().await?;
//!     println!("Migrated {} models", report.models_migrated);
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod migrator;
pub mod report;
pub mod schema;

// Re-exports for convenient access
pub use adapter::{Adapter, AdapterCall, AdapterError, MemoryAdapter, Operation};
pub use config::{Config, EnvironmentConfig, MigrationConfig, Strategy};
pub use error::{MigrateError, ModelFailure, Result};
pub use migrator::{MigrationReport, Migrator};
pub use report::{FailureCategory, FailureReport, MemorySink, ReportSink, StderrSink};
pub use schema::{
    AttributeDefinition, ColumnDirectives, ColumnSpec, ModelDefinition, SchemaRegistry, TableSpec,
};
