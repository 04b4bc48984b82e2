// Environment-driven server configuration

use anyhow::{bail, Context, Result};

const DEFAULT_PORT: u16 = 8090;

/// Storage backend selection.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    InMemory,
    Postgres { url: String },
}

impl BackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InMemory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

/// Server configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: BackendConfig,
}

impl Config {
    /// Read `ZFLOW_PORT`, `ZFLOW_BACKEND`, and (for postgres) `DATABASE_URL`.
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("ZFLOW_PORT") {
            Ok(value) => value.parse().context("ZFLOW_PORT must be a port number")?,
            Err(_) => DEFAULT_PORT,
        };

        let backend = match std::env::var("ZFLOW_BACKEND").as_deref() {
            Err(_) | Ok("memory") => BackendConfig::InMemory,
            Ok("postgres") => {
                let url = std::env::var("DATABASE_URL")
                    .context("DATABASE_URL environment variable required for postgres backend")?;
                BackendConfig::Postgres { url }
            }
            Ok(other) => bail!("unknown ZFLOW_BACKEND: {other}"),
        };

        Ok(Self { port, backend })
    }
}
