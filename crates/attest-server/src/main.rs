//! attest-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`, overridable with
//! `ATTEST_*` environment variables), opens an in-process SQLite store and a
//! filesystem blob directory, and serves the provenance API over HTTP.

mod storage;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use attest_core::{ProvenanceEngine, authorization::ReauthorizePolicy};
use attest_store_sqlite::SqliteStore;
use clap::Parser;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::storage::FsStorage;

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  pub store_path:        PathBuf,
  pub blob_dir:          PathBuf,
  /// If `true`, terminal authorizations may be reset to pending through
  /// the API. Off by default.
  #[serde(default)]
  pub allow_reauthorize: bool,
}

#[derive(Parser)]
#[command(author, version, about = "Attest document provenance server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
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
    .set_default("store_path", "attest.db")?
    .set_default("blob_dir", "blobs")?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ATTEST"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| {
      format!("failed to open store at {:?}", server_cfg.store_path)
    })?;

  let blobs = FsStorage::open(&server_cfg.blob_dir).with_context(|| {
    format!("failed to open blob directory {:?}", server_cfg.blob_dir)
  })?;

  let reauthorize = if server_cfg.allow_reauthorize {
    ReauthorizePolicy::Allowed
  } else {
    ReauthorizePolicy::ManualOnly
  };
  let engine = ProvenanceEngine::new(store, blobs)
    .with_reauthorize_policy(reauthorize);

  let app = attest_api::api_router(Arc::new(engine))
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
