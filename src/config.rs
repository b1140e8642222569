//! Node configuration.

use crate::error::{Error, Result};
use crate::storage::StoreBackend;
use std::net::SocketAddr;
use std::time::Duration;

/// How the node fronts the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMode {
    /// Index locally, no cluster.
    Single,

    /// Register with the cluster and serve a shard.
    Cluster,
}

/// Token-bucket admission-control parameters.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Bucket capacity.
    pub capacity: u64,

    /// Refill rate in tokens per second.
    pub rate: f64,

    /// Initial token count.
    pub initial_tokens: f64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            rate: 1000.0,
            initial_tokens: 1000.0,
        }
    }
}

/// Main configuration for an index node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Single-node or clustered operation.
    pub mode: NodeMode,

    /// Registry server addresses (`host:port`), cluster mode only.
    pub registry_addrs: Vec<String>,

    /// Lease renewal interval.
    pub heartbeat: Duration,

    /// Admission-control parameters for registry reads.
    pub limiter: LimiterConfig,

    /// Forward-store backend.
    pub store_backend: StoreBackend,

    /// Estimated document count, sizes the keyword table.
    pub doc_estimate: usize,

    /// Address to serve the RPC surface on. Port 0 picks an ephemeral
    /// port.
    pub listen_addr: SocketAddr,

    /// Relative node weight, drives partial reloads at startup.
    pub weight: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            mode: NodeMode::Single,
            registry_addrs: Vec::new(),
            heartbeat: Duration::from_secs(3),
            limiter: LimiterConfig::default(),
            store_backend: StoreBackend::Memory,
            doc_estimate: 10_000,
            listen_addr: "127.0.0.1:9000".parse().unwrap(),
            weight: 1.0,
        }
    }
}

impl NodeConfig {
    /// Configuration listening on `addr`.
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    /// Switch the node mode.
    pub fn with_mode(mut self, mode: NodeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the registry server addresses.
    pub fn with_registry_addrs(mut self, addrs: Vec<String>) -> Self {
        self.registry_addrs = addrs;
        self
    }

    /// Set the lease renewal interval.
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Set admission-control parameters.
    pub fn with_limiter(mut self, limiter: LimiterConfig) -> Self {
        self.limiter = limiter;
        self
    }

    /// Set the forward-store backend.
    pub fn with_store_backend(mut self, backend: StoreBackend) -> Self {
        self.store_backend = backend;
        self
    }

    /// Set the estimated document count.
    pub fn with_doc_estimate(mut self, doc_estimate: usize) -> Self {
        self.doc_estimate = doc_estimate;
        self
    }

    /// Set the relative node weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Reject malformed configuration. Called at startup; failures are
    /// fatal, no partially started node is acceptable.
    pub fn validate(&self) -> Result<()> {
        let port = self.listen_addr.port();
        if port != 0 && port <= 1024 {
            return Err(Error::Config(format!(
                "listen port {} must be above 1024",
                port
            )));
        }

        if !(self.weight > 0.0) {
            return Err(Error::Config(format!(
                "node weight {} must be positive",
                self.weight
            )));
        }

        if self.mode == NodeMode::Cluster {
            if self.registry_addrs.is_empty() {
                return Err(Error::Config(
                    "cluster mode needs at least one registry address".to_string(),
                ));
            }
            for addr in &self.registry_addrs {
                let well_formed = addr
                    .rsplit_once(':')
                    .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
                    .unwrap_or(false);
                if !well_formed {
                    return Err(Error::Config(format!("malformed registry address {addr}")));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        NodeConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_privileged_port() {
        let config = NodeConfig::new("127.0.0.1:80".parse().unwrap());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ephemeral_port_allowed() {
        let config = NodeConfig::new("127.0.0.1:0".parse().unwrap());
        config.validate().unwrap();
    }

    #[test]
    fn test_cluster_mode_needs_registry() {
        let config = NodeConfig::default().with_mode(NodeMode::Cluster);
        assert!(config.validate().is_err());

        let config = config.with_registry_addrs(vec!["not-an-addr".to_string()]);
        assert!(config.validate().is_err());

        let config =
            NodeConfig::default()
                .with_mode(NodeMode::Cluster)
                .with_registry_addrs(vec!["127.0.0.1:2379".to_string()]);
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_nonpositive_weight() {
        assert!(NodeConfig::default().with_weight(0.0).validate().is_err());
        assert!(NodeConfig::default().with_weight(-1.0).validate().is_err());
    }
}
