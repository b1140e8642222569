//! Load-balancing strategies for selecting a write target.

use crate::registry::Endpoint;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Pick one endpoint out of the live set.
pub trait LoadBalancer: Send + Sync {
    /// Select an endpoint; `None` when the set is empty.
    fn take(&self, endpoints: &[Endpoint]) -> Option<Endpoint>;
}

/// Round-robin selection. The default strategy.
#[derive(Debug, Default)]
pub struct RoundRobin {
    acc: AtomicU64,
}

impl LoadBalancer for RoundRobin {
    fn take(&self, endpoints: &[Endpoint]) -> Option<Endpoint> {
        if endpoints.is_empty() {
            return None;
        }
        let n = self.acc.fetch_add(1, Ordering::Relaxed);
        Some(endpoints[(n % endpoints.len() as u64) as usize].clone())
    }
}

/// Uniformly random selection.
#[derive(Debug, Default)]
pub struct Random;

impl LoadBalancer for Random {
    fn take(&self, endpoints: &[Endpoint]) -> Option<Endpoint> {
        if endpoints.is_empty() {
            return None;
        }
        let i = rand::thread_rng().gen_range(0..endpoints.len());
        Some(endpoints[i].clone())
    }
}
