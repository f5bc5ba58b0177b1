//! Configuration type definitions with worker auto-tuning.

use serde::{Deserialize, Serialize};
use std::fmt;
use sysinfo::System;
use tracing::info;

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total RAM in GB.
    pub total_memory_gb: f64,
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        let total_memory_gb = sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0);
        let cpu_cores = sys.cpus().len();

        Self {
            total_memory_gb,
            cpu_cores,
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!(
            "System resources: {:.1} GB RAM, {} CPU cores",
            self.total_memory_gb, self.cpu_cores
        );
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Environment policy flags.
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.migration = self.migration.with_auto_tuning(&resources);
        self
    }
}

/// Environment policy flags gating destructive strategies.
///
/// Explicit configuration values; never read from ambient process state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Whether this deployment is production-like. Destructive strategies
    /// refuse to run here by default.
    #[serde(default)]
    pub production: bool,

    /// Explicit override allowing destructive strategies to run even in a
    /// production-like environment.
    #[serde(default)]
    pub allow_unsafe_migrations: bool,
}

/// Migration behavior configuration.
/// Performance-related fields use Option<T> to distinguish between
/// "not set" (use auto-tuned default) and "explicitly set" (use provided value).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Strategy to apply (default: safe).
    #[serde(default)]
    pub strategy: Strategy,

    /// Number of models migrated concurrently. Auto-tuned based on CPU
    /// cores if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

impl MigrationConfig {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that are None (not explicitly set).
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        let cores = resources.cpu_cores;

        // Workers: cores - 2, but at least 2 and at most 32
        if self.workers.is_none() {
            let workers = cores.saturating_sub(2).max(2).min(32);
            self.workers = Some(workers);
        }

        info!("Auto-tuned config: workers={}", self.workers.unwrap());

        self
    }

    // Accessor that returns the effective value (with fallback default),
    // used when the config hasn't been auto-tuned yet

    pub fn get_workers(&self) -> usize {
        self.workers.unwrap_or(4)
    }
}

/// Reconciliation strategy governing how aggressively existing data is
/// rebuilt during migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Never touch the physical layer.
    #[default]
    Safe,

    /// Rebuild each table to match its model definition, without keeping
    /// the table's existing contents.
    Create,

    /// Drop each table outright, then rebuild it from the model definition.
    Drop,
}

impl Strategy {
    /// Whether this strategy can destroy existing data.
    pub fn is_destructive(&self) -> bool {
        !matches!(self, Strategy::Safe)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Strategy::Safe => "safe",
            Strategy::Create => "create",
            Strategy::Drop => "drop",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_defaults_to_safe() {
        let config = MigrationConfig::default();
        assert_eq!(config.strategy, Strategy::Safe);
        assert!(!config.strategy.is_destructive());
    }

    #[test]
    fn test_destructive_strategies() {
        assert!(Strategy::Create.is_destructive());
        assert!(Strategy::Drop.is_destructive());
    }

    #[test]
    fn test_auto_tuned_workers_stay_in_bounds() {
        let few = SystemResources {
            total_memory_gb: 4.0,
            cpu_cores: 1,
        };
        let tuned = MigrationConfig::default().with_auto_tuning(&few);
        assert_eq!(tuned.workers, Some(2));

        let many = SystemResources {
            total_memory_gb: 512.0,
            cpu_cores: 96,
        };
        let tuned = MigrationConfig::default().with_auto_tuning(&many);
        assert_eq!(tuned.workers, Some(32));
    }

    #[test]
    fn test_explicit_workers_survive_auto_tuning() {
        let resources = SystemResources {
            total_memory_gb: 16.0,
            cpu_cores: 8,
        };
        let config = MigrationConfig {
            workers: Some(3),
            ..Default::default()
        };
        let tuned = config.with_auto_tuning(&resources);
        assert_eq!(tuned.workers, Some(3));
    }
}
