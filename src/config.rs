//! Process configuration, built once at startup from the command line.

use crate::cli::Cli;
use crate::{LabelerError, Result};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Name of the node this process runs on. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity(String);

impl NodeIdentity {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LabelerError::ConfigError(
                "node name should not be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeIdentity,
    pub listen_addr: SocketAddr,
    pub node_exporter_port: u16,
    pub sync_timeout: Duration,
}

impl Config {
    /// Builds the configuration, resolving `--host` when it is a hostname.
    pub async fn from_cli(cli: &Cli) -> Result<Self> {
        let node = NodeIdentity::new(cli.node.clone().unwrap_or_default())?;
        let listen_addr = resolve_listen_addr(&cli.host, cli.port).await?;

        Ok(Self {
            node,
            listen_addr,
            node_exporter_port: cli.node_exporter_port,
            sync_timeout: Duration::from_secs(cli.sync_timeout),
        })
    }

    /// Scrape URL of the node exporter on the loopback interface.
    pub fn node_exporter_url(&self) -> String {
        format!("http://localhost:{}/metrics", self.node_exporter_port)
    }
}

async fn resolve_listen_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let invalid = |reason: String| {
        LabelerError::ConfigError(format!("invalid host {:?}: {}", host, reason))
    };

    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| invalid(e.to_string()))?
        .next()
        .ok_or_else(|| invalid("no addresses found".to_string()))
}
