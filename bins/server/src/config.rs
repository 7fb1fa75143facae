use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use weir_api::Limits;

#[derive(Parser)]
#[command(name = "weir-server", about = "External frame ingest server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the ingest server
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml", env = "CONFIG_PATH")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Ingest listen address.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Accepted connections queued while waiting for a session task.
    #[serde(default = "default_conn_buffer")]
    pub conn_buffer: usize,
    /// Wire reader guards.
    #[serde(default)]
    pub limits: Limits,
}

fn default_listen() -> String {
    "0.0.0.0:54321".to_string()
}
fn default_conn_buffer() -> usize {
    64
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, crate::error::ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        toml::from_str(&content)
            .map_err(|e| crate::error::ServerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }
}
