//! Command-line surface, modeled on `kimberlite-cli`'s `Start` command:
//! paths are explicit arguments rather than conventions, with sane
//! defaults for the common single-node-per-host layout.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser)]
#[command(name = "chronos")]
#[command(author, version, about = "Clustered, replicated timer service", long_about = None)]
pub struct Cli {
    /// Path to `chronos.conf` (process-local options).
    #[arg(long, default_value = "chronos.conf")]
    pub config: String,

    /// Path to `chronos_cluster.conf` (cluster membership).
    #[arg(long, default_value = "chronos_cluster.conf")]
    pub cluster_config: String,

    /// How often the cluster-config file is checked for changes.
    #[arg(long, default_value = "1000")]
    pub reload_interval_ms: u64,

    /// Replication factor, capped at cluster size (spec.md §3).
    #[arg(long, default_value_t = chronos_handler::DEFAULT_REPLICATION_FACTOR)]
    pub replication_factor: usize,
}

/// Combines `chronos.conf`'s `http.bind-address`/`http.bind-port` into a
/// `SocketAddr`.
pub fn resolve_bind_address(bind_address: &str, bind_port: u16) -> Result<SocketAddr> {
    format!("{bind_address}:{bind_port}")
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid bind address '{bind_address}:{bind_port}'"))
}
