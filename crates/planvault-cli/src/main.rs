mod config;
mod serve_cmd;
#[cfg(test)]
mod test_util;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use planvault_core::{PlanRepository, PlanService};
use planvault_store::{KeyValueStore, MemoryStore, pool};

use config::{Overrides, PlanvaultConfig, StoreBackend};

#[derive(Parser)]
#[command(name = "planvault", about = "Plan document service with ETag support")]
struct Cli {
    /// Database URL (overrides PLANVAULT_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a planvault config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = planvault_store::config::DbConfig::DEFAULT_URL)]
        db_url: String,
        /// Address to listen on
        #[arg(long, default_value = config::DEFAULT_BIND)]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = config::DEFAULT_PORT)]
        port: u16,
        /// Store backend to serve from
        #[arg(long, value_enum, default_value_t = StoreBackend::Postgres)]
        store: StoreBackend,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database if needed and apply migrations
    DbInit,
    /// Run the HTTP server
    Serve {
        /// Address to listen on (overrides PLANVAULT_BIND)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides PLANVAULT_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Store backend (overrides PLANVAULT_STORE)
        #[arg(long, value_enum)]
        store: Option<StoreBackend>,
    },
}

/// Execute the `planvault init` command: write config file.
fn cmd_init(
    db_url: &str,
    bind: &str,
    port: u16,
    store: StoreBackend,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        server: config::ServerSection {
            bind: bind.to_string(),
            port,
        },
        store: config::StoreSection { backend: store },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  server = {bind}:{port}");
    println!("  store.backend = {store}");
    println!();
    if store == StoreBackend::Postgres {
        println!("Next: run `planvault db-init` to create and migrate the database.");
    } else {
        println!("Next: run `planvault serve`.");
    }

    Ok(())
}

/// Execute the `planvault db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = PlanvaultConfig::resolve(&Overrides {
        database_url: cli_db_url,
        ..Overrides::default()
    })?;

    println!(
        "Initializing planvault database at {}...",
        resolved.db_config.redacted_url()
    );

    let store = pool::provision(&resolved.db_config).await?;
    let count = store
        .entry_count()
        .await
        .context("failed to count stored entries");
    store.close().await;
    println!("Database ready. kv_entries: {} rows", count?);

    println!("planvault db-init complete.");
    Ok(())
}

/// Execute the `planvault serve` command.
async fn cmd_serve(resolved: PlanvaultConfig) -> anyhow::Result<()> {
    let pg_store = match resolved.backend {
        StoreBackend::Memory => None,
        StoreBackend::Postgres => Some(pool::open_store(&resolved.db_config).await?),
    };

    let store: Arc<dyn KeyValueStore> = match &pg_store {
        Some(pg) => Arc::new(pg.clone()),
        None => {
            tracing::warn!("using in-memory store; plans are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let service = PlanService::new(PlanRepository::new(store));
    let result = serve_cmd::run_serve(service, &resolved.bind, resolved.port)
        .await
        .context("server error");

    if let Some(pg) = pg_store {
        pg.close().await;
    }
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            bind,
            port,
            store,
            force,
        } => {
            cmd_init(&db_url, &bind, port, store, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port, store } => {
            let resolved = PlanvaultConfig::resolve(&Overrides {
                database_url: cli.database_url.as_deref(),
                bind: bind.as_deref(),
                port,
                backend: store,
            })?;
            cmd_serve(resolved).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands};
    use crate::config::StoreBackend;

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::try_parse_from([
            "planvault",
            "--database-url",
            "postgresql://h:5432/d",
            "serve",
            "--port",
            "9090",
            "--store",
            "memory",
        ])
        .unwrap();

        assert_eq!(cli.database_url.as_deref(), Some("postgresql://h:5432/d"));
        match cli.command {
            Commands::Serve { bind, port, store } => {
                assert_eq!(bind, None);
                assert_eq!(port, Some(9090));
                assert_eq!(store, Some(StoreBackend::Memory));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn init_has_defaults() {
        let cli = Cli::try_parse_from(["planvault", "init"]).unwrap();
        match cli.command {
            Commands::Init {
                db_url,
                bind,
                port,
                store,
                force,
            } => {
                assert_eq!(db_url, planvault_store::config::DbConfig::DEFAULT_URL);
                assert_eq!(bind, "0.0.0.0");
                assert_eq!(port, 8080);
                assert_eq!(store, StoreBackend::Postgres);
                assert!(!force);
            }
            _ => panic!("expected init"),
        }
    }

    #[test]
    fn rejects_unknown_store() {
        assert!(Cli::try_parse_from(["planvault", "serve", "--store", "redis"]).is_err());
    }
}
