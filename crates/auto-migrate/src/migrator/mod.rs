//! Migration strategy executor - applies model schemas through adapters.
//!
//! One task per model, fanned out through a worker-bounded semaphore. Each
//! task builds its own table spec and talks to its own model's table, so
//! tasks share no mutable state. Once dispatched, a task runs to completion
//! or failure; destructive DDL is never cancelled mid-flight.

use crate::adapter::{Adapter, Operation};
use crate::config::{Config, Strategy};
use crate::error::{MigrateError, ModelFailure, Result};
use crate::report::{FailureReport, ReportSink, StderrSink};
use crate::schema::{ModelDefinition, SchemaRegistry, TableSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Migration executor.
///
/// Owns the configuration, the model registry, and the adapters for each
/// named datastore. Environment policy comes from the configuration handed
/// in at construction, never from ambient process state.
pub struct Migrator {
    config: Config,
    registry: SchemaRegistry,
    datastores: HashMap<String, Arc<dyn Adapter>>,
    sink: Arc<dyn ReportSink>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Strategy that was applied.
    pub strategy: Strategy,

    /// Final status.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total models in the registry.
    pub models_total: usize,

    /// Models whose tables were reconciled.
    pub models_migrated: usize,
}

impl MigrationReport {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Migrator {
    /// Create a new migrator over a registry. Datastores are registered
    /// separately; reports go to stderr unless another sink is injected.
    pub fn new(config: Config, registry: SchemaRegistry) -> Self {
        Self {
            config,
            registry,
            datastores: HashMap::new(),
            sink: Arc::new(StderrSink),
        }
    }

    /// Register the adapter serving a named datastore.
    pub fn register_datastore(mut self, name: impl Into<String>, adapter: Arc<dyn Adapter>) -> Self {
        self.datastores.insert(name.into(), adapter);
        self
    }

    /// Replace the diagnostic sink.
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run the configured strategy across every model in the registry.
    ///
    /// Destructive strategies are refused outright in a production-like
    /// environment unless `allow_unsafe_migrations` is set; the guard fires
    /// before any adapter is touched. On failure, every failed model is
    /// carried in the returned [`MigrateError::StrategyFailed`], with the
    /// richer per-model diagnosis already written to the report sink.
    pub async fn run(&self) -> Result<MigrationReport> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let strategy = self.config.migration.strategy;

        if strategy.is_destructive()
            && self.config.environment.production
            && !self.config.environment.allow_unsafe_migrations
        {
            return Err(MigrateError::UnsafeEnvironment { strategy });
        }

        info!("Starting `{}` auto-migration run: {}", strategy, run_id);

        let models_migrated = match strategy {
            Strategy::Safe => {
                info!("Safe strategy selected: leaving the physical layer untouched");
                0
            }
            Strategy::Create | Strategy::Drop => self.migrate_models(strategy).await?,
        };

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let report = MigrationReport {
            run_id,
            strategy,
            status: "completed".to_string(),
            duration_seconds: duration,
            started_at,
            completed_at,
            models_total: self.registry.len(),
            models_migrated,
        };

        info!(
            "Auto-migration {}: {}/{} models in {:.2}s",
            report.status, report.models_migrated, report.models_total, report.duration_seconds
        );

        Ok(report)
    }

    /// Fan out one migration task per model and collect every outcome.
    async fn migrate_models(&self, strategy: Strategy) -> Result<usize> {
        let workers = self.config.migration.get_workers().max(1);
        let semaphore = Arc::new(Semaphore::new(workers));

        info!(
            "Migrating {} models with {} workers",
            self.registry.len(),
            workers
        );

        let mut failures: Vec<ModelFailure> = Vec::new();
        let mut handles = Vec::new();

        for model in self.registry.models() {
            let identity = model.identity.clone();

            let adapter = match self.datastores.get(&model.datastore) {
                Some(adapter) => adapter.clone(),
                None => {
                    failures.push(ModelFailure {
                        model: identity.clone(),
                        operation: Operation::Define,
                        error: MigrateError::UnknownDatastore {
                            model: identity,
                            datastore: model.datastore.clone(),
                        },
                    });
                    continue;
                }
            };

            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let model = model.clone();

            let handle = tokio::spawn(async move {
                let result = migrate_model(strategy, &model, adapter.as_ref()).await;
                drop(permit);
                result
            });

            handles.push((identity, handle));
        }

        let mut migrated = 0usize;

        for (identity, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {
                    debug!("{}: migrated", identity);
                    migrated += 1;
                }
                Ok(Err(failure)) => {
                    error!(
                        "{}: `{}` failed - {}",
                        identity, failure.operation, failure.error
                    );
                    failures.push(failure);
                }
                Err(e) => {
                    error!("{}: migration task panicked - {}", identity, e);
                    failures.push(ModelFailure {
                        model: identity.clone(),
                        operation: Operation::Define,
                        error: MigrateError::TaskPanicked {
                            model: identity,
                            message: e.to_string(),
                        },
                    });
                }
            }
        }

        // Emission is informational; it never changes the outcome.
        for failure in &failures {
            let report =
                FailureReport::from_error(&failure.model, failure.operation, &failure.error);
            self.sink.emit(&report);
        }

        if !failures.is_empty() {
            return Err(MigrateError::StrategyFailed { failures });
        }

        Ok(migrated)
    }
}

/// Reconcile one model's table. Spec construction strictly precedes the
/// adapter call; the drop strategy drops the old table first.
async fn migrate_model(
    strategy: Strategy,
    model: &ModelDefinition,
    adapter: &dyn Adapter,
) -> std::result::Result<(), ModelFailure> {
    if strategy == Strategy::Drop {
        adapter
            .drop_table(&model.datastore, &model.table_name)
            .await
            .map_err(|source| ModelFailure {
                model: model.identity.clone(),
                operation: Operation::Drop,
                error: MigrateError::Adapter {
                    operation: Operation::Drop,
                    source,
                },
            })?;
    }

    let spec = TableSpec::build(model).map_err(|error| ModelFailure {
        model: model.identity.clone(),
        operation: Operation::Define,
        error,
    })?;

    debug!(
        "Defining table `{}` for model `{}` ({} columns)",
        model.table_name,
        model.identity,
        spec.len()
    );

    adapter
        .define(&model.datastore, &model.table_name, &spec)
        .await
        .map_err(|source| ModelFailure {
            model: model.identity.clone(),
            operation: Operation::Define,
            error: MigrateError::Adapter {
                operation: Operation::Define,
                source,
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterError, MemoryAdapter};
    use crate::config::{EnvironmentConfig, MigrationConfig};
    use crate::report::{FailureCategory, MemorySink};
    use crate::schema::{AttributeDefinition, ColumnDirectives};
    use std::collections::BTreeMap;

    fn directives(column_type: &str) -> ColumnDirectives {
        ColumnDirectives {
            column_type: column_type.to_string(),
            nullable: false,
            unique: false,
            auto_increment: false,
            default_value: None,
        }
    }

    fn model(identity: &str, table: &str) -> ModelDefinition {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "id".to_string(),
            AttributeDefinition {
                column_name: None,
                plural_association: false,
                directives: Some(directives("INTEGER")),
            },
        );
        attributes.insert(
            "name".to_string(),
            AttributeDefinition {
                column_name: None,
                plural_association: false,
                directives: Some(directives("VARCHAR(255)")),
            },
        );

        ModelDefinition {
            identity: identity.to_string(),
            datastore: "default".to_string(),
            table_name: table.to_string(),
            primary_key: Some("id".to_string()),
            attributes,
        }
    }

    fn registry(models: &[ModelDefinition]) -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        for model in models {
            registry.register(model.clone());
        }
        registry
    }

    fn config(strategy: Strategy, production: bool, allow_unsafe: bool) -> Config {
        Config {
            environment: EnvironmentConfig {
                production,
                allow_unsafe_migrations: allow_unsafe,
            },
            migration: MigrationConfig {
                strategy,
                workers: Some(2),
            },
        }
    }

    fn migrator(
        strategy: Strategy,
        production: bool,
        allow_unsafe: bool,
        models: &[ModelDefinition],
    ) -> (Migrator, Arc<MemoryAdapter>, Arc<MemorySink>) {
        let adapter = Arc::new(MemoryAdapter::new());
        let sink = Arc::new(MemorySink::new());
        let migrator = Migrator::new(config(strategy, production, allow_unsafe), registry(models))
            .register_datastore("default", adapter.clone())
            .with_sink(sink.clone());
        (migrator, adapter, sink)
    }

    #[tokio::test]
    async fn test_production_guard_blocks_destructive_strategies() {
        for strategy in [Strategy::Create, Strategy::Drop] {
            let (migrator, adapter, _) = migrator(strategy, true, false, &[model("user", "users")]);

            match migrator.run().await {
                Err(MigrateError::UnsafeEnvironment { strategy: s }) => assert_eq!(s, strategy),
                other => panic!("expected UnsafeEnvironment, got {:?}", other.map(|r| r.status)),
            }
            assert!(adapter.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_allow_unsafe_overrides_the_guard() {
        let (migrator, adapter, _) =
            migrator(Strategy::Create, true, true, &[model("user", "users")]);

        let report = migrator.run().await.unwrap();
        assert_eq!(report.models_migrated, 1);
        assert_eq!(adapter.tables_defined(), 1);
    }

    #[tokio::test]
    async fn test_safe_strategy_never_touches_the_adapter() {
        let (migrator, adapter, _) =
            migrator(Strategy::Safe, true, false, &[model("user", "users")]);

        let report = migrator.run().await.unwrap();
        assert_eq!(report.models_total, 1);
        assert_eq!(report.models_migrated, 0);
        assert!(adapter.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_defines_every_model_with_its_spec() {
        let models = [
            model("order", "orders"),
            model("pet", "pets"),
            model("user", "users"),
        ];
        let (migrator, adapter, _) = migrator(Strategy::Create, false, false, &models);

        let report = migrator.run().await.unwrap();
        assert_eq!(report.models_migrated, 3);
        assert_eq!(adapter.tables_defined(), 3);

        let expected = TableSpec::build(&models[2]).unwrap();
        assert_eq!(adapter.table("default", "users"), Some(expected));
    }

    #[tokio::test]
    async fn test_failed_model_does_not_block_siblings() {
        let models = [
            model("order", "orders"),
            model("pet", "pets"),
            model("user", "users"),
        ];
        let (migrator, adapter, sink) = migrator(Strategy::Create, false, false, &models);
        adapter.fail_define("pets", AdapterError::other("disk full"));

        let failures = match migrator.run().await {
            Err(MigrateError::StrategyFailed { failures }) => failures,
            other => panic!("expected StrategyFailed, got {:?}", other.map(|r| r.status)),
        };

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].model, "pet");
        assert_eq!(failures[0].operation, Operation::Define);

        // Siblings were still defined with their own specs.
        assert!(adapter.table("default", "orders").is_some());
        assert!(adapter.table("default", "users").is_some());

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].model, "pet");
        assert_eq!(reports[0].operation, Operation::Define);
        assert_eq!(reports[0].category, FailureCategory::Unclassified);
    }

    #[tokio::test]
    async fn test_every_failure_is_collected() {
        let models = [
            model("order", "orders"),
            model("pet", "pets"),
            model("user", "users"),
        ];
        let (migrator, adapter, sink) = migrator(Strategy::Create, false, false, &models);
        adapter.fail_define("orders", AdapterError::other("disk full"));
        adapter.fail_define("users", AdapterError::other("permission denied"));

        let failures = match migrator.run().await {
            Err(MigrateError::StrategyFailed { failures }) => failures,
            other => panic!("expected StrategyFailed, got {:?}", other.map(|r| r.status)),
        };

        let mut failed: Vec<_> = failures.iter().map(|f| f.model.as_str()).collect();
        failed.sort_unstable();
        assert_eq!(failed, ["order", "user"]);
        assert_eq!(sink.reports().len(), 2);
    }

    #[tokio::test]
    async fn test_drop_strategy_drops_before_defining() {
        let (migrator, adapter, _) =
            migrator(Strategy::Drop, false, false, &[model("user", "users")]);

        migrator.run().await.unwrap();

        let operations: Vec<_> = adapter
            .calls()
            .into_iter()
            .filter(|call| call.table == "users")
            .map(|call| call.operation)
            .collect();
        assert_eq!(operations, [Operation::Drop, Operation::Define]);
    }

    #[tokio::test]
    async fn test_unknown_datastore_fails_only_that_model() {
        let mut stray = model("pet", "pets");
        stray.datastore = "missing".to_string();
        let models = [model("user", "users"), stray];
        let (migrator, adapter, sink) = migrator(Strategy::Create, false, false, &models);

        let failures = match migrator.run().await {
            Err(MigrateError::StrategyFailed { failures }) => failures,
            other => panic!("expected StrategyFailed, got {:?}", other.map(|r| r.status)),
        };

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].model, "pet");
        assert!(matches!(
            failures[0].error,
            MigrateError::UnknownDatastore { .. }
        ));
        assert!(adapter.table("default", "users").is_some());
        assert_eq!(sink.reports().len(), 1);
    }

    #[tokio::test]
    async fn test_spec_building_failure_skips_the_adapter_call() {
        let mut broken = model("user", "users");
        broken.attributes.insert(
            "nickname".to_string(),
            AttributeDefinition {
                column_name: None,
                plural_association: false,
                directives: None,
            },
        );
        let (migrator, adapter, _) = migrator(Strategy::Create, false, false, &[broken]);

        let failures = match migrator.run().await {
            Err(MigrateError::StrategyFailed { failures }) => failures,
            other => panic!("expected StrategyFailed, got {:?}", other.map(|r| r.status)),
        };

        assert!(matches!(
            failures[0].error,
            MigrateError::MissingDirectives { .. }
        ));
        assert!(adapter.calls().is_empty());
    }
}
