pub mod routes;
pub mod state;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;

use renova_core::{load_config_or_default, ConfigError};

use crate::state::AppState;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Renova license-renewal control service", long_about = None)]
pub struct Cli {
    /// Path to renova.toml
    #[arg(long, default_value = "configs/renova.toml")]
    pub config: PathBuf,
    /// Override the listening port from config/env
    #[arg(long)]
    pub port: Option<u16>,
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config_or_default(&cli.config)?;
    config.apply_env_overrides()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let app = AppState {
        state: Default::default(),
        config: Arc::new(config),
    };
    let router = routes::router(app);

    tracing::info!(%addr, "renova control service listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
