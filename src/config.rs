use std::path::PathBuf;

use anyhow::Context;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub export_dir: PathBuf,
}

impl Config {
    /// Reads settings from the environment, after any `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;
        let max_connections = match std::env::var("PANEL_MAX_CONNECTIONS") {
            Ok(value) => parse_connections(&value)?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Config {
            database_url,
            max_connections,
            export_dir: export_dir(),
        })
    }
}

/// Where `export` writes when no explicit path is given. Needs no database.
pub fn export_dir() -> PathBuf {
    std::env::var_os("PANEL_EXPORT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn parse_connections(value: &str) -> anyhow::Result<u32> {
    let parsed: u32 = value
        .trim()
        .parse()
        .with_context(|| format!("PANEL_MAX_CONNECTIONS must be a positive integer, got {value:?}"))?;
    anyhow::ensure!(parsed > 0, "PANEL_MAX_CONNECTIONS must be at least 1");
    Ok(parsed)
}
