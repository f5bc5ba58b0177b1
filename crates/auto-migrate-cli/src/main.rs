//! auto-migrate CLI - check, plan, and simulate schema auto-migrations.

use auto_migrate::{
    Config, MemoryAdapter, MigrateError, Migrator, SchemaRegistry, Strategy, TableSpec,
};
use clap::{Parser, Subcommand};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "auto-migrate")]
#[command(about = "Reconcile model schema definitions against physical tables")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file [default: migrate.yaml, if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the YAML model schema file
    #[arg(short, long, default_value = "models.yaml")]
    models: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every model's table spec and report every problem found
    Check,

    /// Print the derived table specs without touching any datastore
    Plan,

    /// Run the configured strategy against in-memory datastores
    Simulate {
        /// Override the migration strategy (safe, create, drop)
        #[arg(long)]
        strategy: Option<String>,

        /// Override number of workers
        #[arg(long)]
        workers: Option<usize>,

        /// Treat the environment as production-like
        #[arg(long)]
        production: bool,

        /// Allow destructive strategies in a production-like environment
        #[arg(long)]
        allow_unsafe: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(MigrateError::Config)?;

    let mut config = load_config(cli.config.as_deref())?.with_auto_tuning();

    let registry = SchemaRegistry::load(&cli.models)?;
    info!("Loaded {} model(s) from {:?}", registry.len(), cli.models);

    match cli.command {
        Commands::Check => {
            let mut problems = 0usize;
            for model in registry.models() {
                match TableSpec::build(model) {
                    Ok(spec) => println!("  ✓ {} ({} columns)", model.identity, spec.len()),
                    Err(e) => {
                        problems += 1;
                        println!("  ✗ {}: {}", model.identity, e);
                    }
                }
            }

            if problems > 0 {
                return Err(MigrateError::Config(format!(
                    "schema check failed for {} model(s)",
                    problems
                )));
            }
            println!("\nAll {} model(s) check out", registry.len());
        }

        Commands::Plan => {
            let mut specs = BTreeMap::new();
            for model in registry.models() {
                specs.insert(model.identity.clone(), TableSpec::build(model)?);
            }
            print!("{}", serde_yaml::to_string(&specs)?);
        }

        Commands::Simulate {
            strategy,
            workers,
            production,
            allow_unsafe,
        } => {
            // Apply overrides
            if let Some(s) = strategy {
                config.migration.strategy = parse_strategy(&s)?;
            }
            if let Some(w) = workers {
                config.migration.workers = Some(w);
            }
            if production {
                config.environment.production = true;
            }
            if allow_unsafe {
                config.environment.allow_unsafe_migrations = true;
            }

            // One in-memory datastore per name the models reference
            let datastores: BTreeSet<String> =
                registry.models().map(|m| m.datastore.clone()).collect();

            let mut migrator = Migrator::new(config, registry);
            for name in datastores {
                migrator = migrator.register_datastore(name, Arc::new(MemoryAdapter::new()));
            }

            let result = migrator.run().await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nSimulation completed!");
                println!("  Run ID: {}", result.run_id);
                println!("  Strategy: {}", result.strategy);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!(
                    "  Models: {}/{}",
                    result.models_migrated, result.models_total
                );
            }
        }
    }

    Ok(())
}

/// Load the config file if one was named or the default path exists;
/// otherwise fall back to built-in defaults.
fn load_config(path: Option<&Path>) -> Result<Config, MigrateError> {
    match path {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            Ok(config)
        }
        None => {
            let default = Path::new("migrate.yaml");
            if default.exists() {
                let config = Config::load(default)?;
                info!("Loaded configuration from {:?}", default);
                Ok(config)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn parse_strategy(s: &str) -> Result<Strategy, MigrateError> {
    match s {
        "safe" => Ok(Strategy::Safe),
        "create" => Ok(Strategy::Create),
        "drop" => Ok(Strategy::Drop),
        other => Err(MigrateError::Config(format!(
            "unknown strategy `{}` (expected safe, create, or drop)",
            other
        ))),
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
