//! Service registry contract and the endpoint coordination layer.
//!
//! Worker nodes register themselves under a service name with a lease
//! that must be renewed on the heartbeat interval; the cluster-facing
//! coordinator discovers them through [`Registry::list`] and keeps its
//! local cache consistent through [`Registry::watch`].

pub mod balance;
pub mod hub;
pub mod limiter;
pub mod memory;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use balance::{LoadBalancer, Random, RoundRobin};
pub use hub::EndpointHub;
pub use limiter::{Limiter, TokenBucket, Unlimited};
pub use memory::MemoryRegistry;

/// Lease identifier. Zero means "create a new lease".
pub type LeaseId = u64;

/// A registered service endpoint: address plus relative weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// `host:port` address of the node.
    pub addr: String,

    /// Relative weight, used for weighted startup reloads.
    pub weight: f64,
}

impl Endpoint {
    /// Create an endpoint with the given address and weight.
    pub fn new(addr: impl Into<String>, weight: f64) -> Self {
        Self {
            addr: addr.into(),
            weight,
        }
    }

    /// True when the address looks like a well-formed `host:port` pair.
    pub fn is_well_formed(&self) -> bool {
        match self.addr.rsplit_once(':') {
            Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
            None => false,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// Change events delivered on a registry watch stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    /// An endpoint was registered or refreshed.
    Put(Endpoint),

    /// An endpoint was deregistered or its lease expired; carries the
    /// address.
    Delete(String),
}

/// Lease-based service registry contract.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Register `endpoint` under `service`.
    ///
    /// A zero `lease` creates a new lease; a non-zero lease renews it.
    /// Renewing an expired lease transparently re-registers. Returns the
    /// lease to use for the next renewal.
    async fn register(&self, service: &str, endpoint: &Endpoint, lease: LeaseId)
        -> Result<LeaseId>;

    /// Remove `addr` from `service`.
    async fn deregister(&self, service: &str, addr: &str) -> Result<()>;

    /// All live endpoints currently registered under `service`.
    async fn list(&self, service: &str) -> Result<Vec<Endpoint>>;

    /// Subscribe to endpoint changes for `service`.
    async fn watch(&self, service: &str) -> Result<mpsc::Receiver<RegistryEvent>>;

    /// Release the registry client.
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_well_formed() {
        assert!(Endpoint::new("127.0.0.1:9000", 1.0).is_well_formed());
        assert!(Endpoint::new("node-3:80", 1.0).is_well_formed());
        assert!(!Endpoint::new("nohost", 1.0).is_well_formed());
        assert!(!Endpoint::new(":9000", 1.0).is_well_formed());
        assert!(!Endpoint::new("host:notaport", 1.0).is_well_formed());
    }
}
