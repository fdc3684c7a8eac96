//! exambank server binary.
//!
//! Reads `exambank.toml` (or the path given with `--config`) layered with
//! `EXAMBANK_*` environment variables, opens and migrates the SQLite store,
//! and serves the dispatcher over HTTP.
//!
//! # Maintenance modes
//!
//! ```text
//! exambank --migrate-only        # bring the schema up to date and exit
//! exambank --rollback-to 1       # revert migrations above v1 and exit
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use exambank_api::ServerConfig;
use exambank_store_sqlite::{Database, ExamBank, Migrator};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Exam bank server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "exambank.toml")]
  config: PathBuf,

  /// Apply pending migrations and exit.
  #[arg(long)]
  migrate_only: bool,

  /// Revert migrations down to this schema version and exit.
  #[arg(long, value_name = "VERSION", conflicts_with = "migrate_only")]
  rollback_to: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("database_path", "exambank.db")?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("EXAMBANK"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  let db_path = &server_cfg.database_path;

  if let Some(version) = cli.rollback_to {
    let db = Database::open(db_path)
      .await
      .with_context(|| format!("failed to open database at {db_path:?}"))?;
    let report = Migrator::builtin()
      .rollback(&db, version)
      .await
      .context("rollback failed")?;
    tracing::info!(
      rolled_back = ?report.rolled_back,
      skipped = ?report.skipped,
      "rollback complete"
    );
    db.close().await?;
    return Ok(());
  }

  // Migration failures abort startup here.
  let bank = ExamBank::open(db_path)
    .await
    .with_context(|| format!("failed to open exam bank at {db_path:?}"))?;

  if cli.migrate_only {
    let version = bank.schema_version().await?;
    tracing::info!(version, "schema up to date");
    bank.close().await?;
    return Ok(());
  }

  let bank = Arc::new(bank);
  let app = exambank_api::router(bank.clone());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  bank.close().await.context("failed to close the store")?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}
