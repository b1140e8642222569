//! Endpoint coordination: registry client + local cache + limiter.
//!
//! The hub is constructed explicitly and passed to its dependents; it
//! owns the watch tasks that keep the per-service endpoint cache
//! consistent with the registry.

use crate::error::Result;
use crate::registry::{Endpoint, Limiter, Registry, RegistryEvent};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Budget for the admission-control wait before a registry read.
const ADMISSION_DEADLINE: Duration = Duration::from_millis(100);

/// Registry-backed endpoint source with a watch-maintained local cache
/// and admission control.
pub struct EndpointHub {
    registry: Arc<dyn Registry>,
    limiter: Arc<dyn Limiter>,

    /// service → addr → endpoint, kept consistent by the watch tasks.
    cache: Arc<DashMap<String, HashMap<String, Endpoint>>>,

    /// Services with a live watch task.
    watched: DashMap<String, ()>,
}

impl EndpointHub {
    /// Create a hub over a registry client and an admission-control
    /// policy.
    pub fn new(registry: Arc<dyn Registry>, limiter: Arc<dyn Limiter>) -> Self {
        Self {
            registry,
            limiter,
            cache: Arc::new(DashMap::new()),
            watched: DashMap::new(),
        }
    }

    /// All live endpoints of `service`.
    ///
    /// Serves from the local cache once the service has been synced; the
    /// first lookup performs a full registry read and spawns the watch
    /// task. An admission-control timeout degrades to an empty set.
    pub async fn endpoints(&self, service: &str) -> Vec<Endpoint> {
        if let Err(e) = self.limiter.allow(ADMISSION_DEADLINE).await {
            warn!(service, error = %e, "admission control rejected registry read");
            return Vec::new();
        }

        if let Some(cached) = self.cache.get(service) {
            return cached.values().cloned().collect();
        }

        let endpoints = match self.registry.list(service).await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                warn!(service, error = %e, "registry list failed");
                return Vec::new();
            }
        };

        let by_addr: HashMap<String, Endpoint> = endpoints
            .iter()
            .map(|ep| (ep.addr.clone(), ep.clone()))
            .collect();
        self.cache.insert(service.to_string(), by_addr);
        self.spawn_watch(service).await;

        endpoints
    }

    /// Start the watch task for `service` unless one is already running.
    async fn spawn_watch(&self, service: &str) {
        if self.watched.insert(service.to_string(), ()).is_some() {
            return;
        }

        let mut events = match self.registry.watch(service).await {
            Ok(events) => events,
            Err(e) => {
                warn!(service, error = %e, "registry watch failed");
                self.watched.remove(service);
                return;
            }
        };

        info!(service, "watching registry for endpoint changes");
        let cache = self.cache.clone();
        let service = service.to_string();

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let mut entry = cache.entry(service.clone()).or_default();
                match event {
                    RegistryEvent::Put(endpoint) => {
                        debug!(service = %service, addr = %endpoint.addr, "endpoint added");
                        entry.insert(endpoint.addr.clone(), endpoint);
                    }
                    RegistryEvent::Delete(addr) => {
                        debug!(service = %service, addr = %addr, "endpoint removed");
                        entry.remove(&addr);
                    }
                }
            }
            debug!(service = %service, "registry watch stream closed");
        });
    }

    /// Release the underlying registry client.
    pub async fn close(&self) -> Result<()> {
        self.registry.close().await
    }
}

impl std::fmt::Debug for EndpointHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointHub")
            .field("services", &self.cache.len())
            .finish()
    }
}
