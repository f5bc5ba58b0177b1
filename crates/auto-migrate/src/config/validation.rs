//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};
use tracing::warn;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if let Some(0) = config.migration.workers {
        return Err(MigrateError::Config(
            "migration.workers must be at least 1".into(),
        ));
    }

    if config.environment.allow_unsafe_migrations && !config.environment.production {
        warn!("allow_unsafe_migrations is set but has no effect outside production");
    }

    Ok(())
}
