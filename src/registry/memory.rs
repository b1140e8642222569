//! In-process registry implementation with lease expiry.
//!
//! Used by tests and single-process clusters; a distributed coordination
//! service slots in behind the same [`Registry`] trait.

use crate::error::{RegistryError, Result};
use crate::registry::{Endpoint, LeaseId, Registry, RegistryEvent};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone)]
struct Registration {
    endpoint: Endpoint,
    lease: LeaseId,
}

/// In-memory lease-based registry.
pub struct MemoryRegistry {
    /// service → addr → registration.
    services: DashMap<String, HashMap<String, Registration>>,

    /// lease → expiry instant.
    leases: DashMap<LeaseId, Instant>,

    /// service → live watch subscribers.
    watchers: Mutex<HashMap<String, Vec<mpsc::Sender<RegistryEvent>>>>,

    next_lease: AtomicU64,
    lease_ttl: Duration,
    closed: AtomicBool,
}

impl MemoryRegistry {
    /// Create a registry whose leases expire after `lease_ttl` without
    /// renewal.
    pub fn new(lease_ttl: Duration) -> Self {
        Self {
            services: DashMap::new(),
            leases: DashMap::new(),
            watchers: Mutex::new(HashMap::new()),
            next_lease: AtomicU64::new(1),
            lease_ttl,
            closed: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RegistryError::Closed.into());
        }
        Ok(())
    }

    fn notify(&self, service: &str, event: RegistryEvent) {
        let mut watchers = self.watchers.lock();
        if let Some(subs) = watchers.get_mut(service) {
            subs.retain(|tx| tx.try_send(event.clone()).is_ok());
        }
    }

    /// Drop registrations whose lease has expired, emitting Delete events.
    fn expire(&self, service: &str) {
        let now = Instant::now();
        let mut expired = Vec::new();

        if let Some(mut regs) = self.services.get_mut(service) {
            regs.retain(|addr, reg| {
                let live = self
                    .leases
                    .get(&reg.lease)
                    .map(|deadline| *deadline > now)
                    .unwrap_or(false);
                if !live {
                    expired.push(addr.clone());
                }
                live
            });
        }

        for addr in expired {
            debug!(service, addr = %addr, "lease expired, dropping endpoint");
            self.notify(service, RegistryEvent::Delete(addr));
        }
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn register(
        &self,
        service: &str,
        endpoint: &Endpoint,
        lease: LeaseId,
    ) -> Result<LeaseId> {
        self.check_open()?;

        if lease != 0 {
            // Renewal path: an expired or unknown lease falls through to
            // a fresh registration.
            if let Some(mut deadline) = self.leases.get_mut(&lease) {
                if *deadline > Instant::now() {
                    *deadline = Instant::now() + self.lease_ttl;
                    return Ok(lease);
                }
            }
            self.leases.remove(&lease);
        }

        let lease = self.next_lease.fetch_add(1, Ordering::SeqCst);
        self.leases.insert(lease, Instant::now() + self.lease_ttl);
        self.services.entry(service.to_string()).or_default().insert(
            endpoint.addr.clone(),
            Registration {
                endpoint: endpoint.clone(),
                lease,
            },
        );

        debug!(service, addr = %endpoint.addr, lease, "endpoint registered");
        self.notify(service, RegistryEvent::Put(endpoint.clone()));
        Ok(lease)
    }

    async fn deregister(&self, service: &str, addr: &str) -> Result<()> {
        self.check_open()?;

        let removed = self
            .services
            .get_mut(service)
            .and_then(|mut regs| regs.remove(addr));

        if let Some(reg) = removed {
            self.leases.remove(&reg.lease);
            debug!(service, addr, "endpoint deregistered");
            self.notify(service, RegistryEvent::Delete(addr.to_string()));
        }
        Ok(())
    }

    async fn list(&self, service: &str) -> Result<Vec<Endpoint>> {
        self.check_open()?;
        self.expire(service);

        Ok(self
            .services
            .get(service)
            .map(|regs| regs.values().map(|reg| reg.endpoint.clone()).collect())
            .unwrap_or_default())
    }

    async fn watch(&self, service: &str) -> Result<mpsc::Receiver<RegistryEvent>> {
        self.check_open()?;

        let (tx, rx) = mpsc::channel(64);
        self.watchers
            .lock()
            .entry(service.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.watchers.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVC: &str = "svc";

    #[tokio::test]
    async fn test_register_and_list() {
        let registry = MemoryRegistry::new(Duration::from_secs(5));
        let ep = Endpoint::new("127.0.0.1:9000", 1.0);

        let lease = registry.register(SVC, &ep, 0).await.unwrap();
        assert_ne!(lease, 0);

        let eps = registry.list(SVC).await.unwrap();
        assert_eq!(eps, vec![ep]);
    }

    #[tokio::test]
    async fn test_renewal_keeps_lease() {
        let registry = MemoryRegistry::new(Duration::from_secs(5));
        let ep = Endpoint::new("127.0.0.1:9000", 1.0);

        let lease = registry.register(SVC, &ep, 0).await.unwrap();
        let renewed = registry.register(SVC, &ep, lease).await.unwrap();
        assert_eq!(lease, renewed);
    }

    #[tokio::test]
    async fn test_expired_lease_reregisters() {
        let registry = MemoryRegistry::new(Duration::from_millis(10));
        let ep = Endpoint::new("127.0.0.1:9000", 1.0);

        let lease = registry.register(SVC, &ep, 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Expired endpoints disappear from list().
        assert!(registry.list(SVC).await.unwrap().is_empty());

        // Renewing the dead lease transparently creates a new one.
        let renewed = registry.register(SVC, &ep, lease).await.unwrap();
        assert_ne!(lease, renewed);
        assert_eq!(registry.list(SVC).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_watch_sees_put_and_delete() {
        let registry = MemoryRegistry::new(Duration::from_secs(5));
        let mut rx = registry.watch(SVC).await.unwrap();

        let ep = Endpoint::new("127.0.0.1:9000", 1.0);
        registry.register(SVC, &ep, 0).await.unwrap();
        registry.deregister(SVC, &ep.addr).await.unwrap();

        assert_eq!(rx.recv().await, Some(RegistryEvent::Put(ep.clone())));
        assert_eq!(rx.recv().await, Some(RegistryEvent::Delete(ep.addr)));
    }

    #[tokio::test]
    async fn test_deregister_unknown_is_noop() {
        let registry = MemoryRegistry::new(Duration::from_secs(5));
        registry.deregister(SVC, "127.0.0.1:1").await.unwrap();
    }
}
