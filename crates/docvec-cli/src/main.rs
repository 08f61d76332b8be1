//! docvec CLI - Vector store migration and inspection
//!
//! Usage:
//!   docvec migrate --from memory --to qdrant
//!   docvec export --from memory --output backup.json
//!   docvec import --input backup.json --to qdrant
//!   docvec stats --store qdrant
//!   docvec health --store qdrant

use anyhow::Context;
use clap::{Parser, Subcommand};
use docvec_core::{LoggingConfig, StoreConfig};
use docvec_migrate::{DocumentOutcome, MigrationReport};
use docvec_vector::create_store;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docvec")]
#[command(about = "Document vector store migration tool")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables still override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy every document from one store to another
    Migrate {
        /// Source store type (memory, qdrant)
        #[arg(long)]
        from: String,
        /// Destination store type (memory, qdrant)
        #[arg(long)]
        to: String,
    },
    /// Export a store to a JSON snapshot
    Export {
        /// Source store type
        #[arg(long, default_value = "memory")]
        from: String,
        /// Snapshot file to write
        #[arg(long)]
        output: PathBuf,
    },
    /// Import a JSON snapshot into a store
    Import {
        /// Snapshot file to read
        #[arg(long)]
        input: PathBuf,
        /// Target store type
        #[arg(long)]
        to: String,
    },
    /// Show document and chunk counts
    Stats {
        /// Store type; defaults to the configured one
        #[arg(long)]
        store: Option<String>,
    },
    /// Check that a store is reachable
    Health {
        /// Store type; defaults to the configured one
        #[arg(long)]
        store: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Migrate { from, to } => {
            docvec_migrate::ensure_distinct_types(&from, &to)?;
            let source = create_store(Some(&from), &config)?;
            let target = create_store(Some(&to), &config)?;

            let report = docvec_migrate::run_migration(source.as_ref(), target.as_ref()).await?;
            print_report("migrated", &report);
        }
        Commands::Export { from, output } => {
            let store = create_store(Some(&from), &config)?;

            let report = docvec_migrate::run_export(store.as_ref(), &output).await?;
            print_report("exported", &report);
            println!("Snapshot written to {}", output.display());
        }
        Commands::Import { input, to } => {
            let store = create_store(Some(&to), &config)?;

            let report = docvec_migrate::run_import(store.as_ref(), &input).await?;
            print_report("imported", &report);
        }
        Commands::Stats { store } => {
            let store = create_store(store.as_deref(), &config)?;
            let stats = store.get_stats().await?;

            println!("Store: {}", store.name());
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Health { store } => {
            let store = create_store(store.as_deref(), &config)?;

            if store.health_check().await {
                println!("{}: healthy", store.name());
            } else {
                println!("{}: unhealthy", store.name());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<StoreConfig> {
    let config = match path {
        Some(path) => StoreConfig::from_file(path)
            .and_then(StoreConfig::with_env_override)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => StoreConfig::from_env().context("loading configuration from environment")?,
    };
    Ok(config)
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_report(verb: &str, report: &MigrationReport) {
    for entry in &report.outcomes {
        match &entry.outcome {
            DocumentOutcome::Succeeded => println!("  ok       {}", entry.document_id),
            DocumentOutcome::Partial(reason) => {
                println!("  partial  {} ({reason})", entry.document_id)
            }
            DocumentOutcome::Failed(reason) => {
                println!("  failed   {} ({reason})", entry.document_id)
            }
        }
    }
    println!(
        "{} documents {verb} of {} ({} not completed)",
        report.succeeded,
        report.total,
        report.failed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_migrate() {
        let cli = Cli::try_parse_from(["docvec", "migrate", "--from", "memory", "--to", "qdrant"])
            .unwrap();
        match cli.command {
            Commands::Migrate { from, to } => {
                assert_eq!(from, "memory");
                assert_eq!(to, "qdrant");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_export_source_defaults_to_memory() {
        let cli = Cli::try_parse_from(["docvec", "export", "--output", "backup.json"]).unwrap();
        match cli.command {
            Commands::Export { from, output } => {
                assert_eq!(from, "memory");
                assert_eq!(output, PathBuf::from("backup.json"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_import_requires_target() {
        assert!(Cli::try_parse_from(["docvec", "import", "--input", "backup.json"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["docvec", "stats", "--config", "docvec.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("docvec.toml")));
        assert!(matches!(cli.command, Commands::Stats { store: None }));
    }
}
