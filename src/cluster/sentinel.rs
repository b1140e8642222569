//! Scatter-gather coordinator over the cluster's index workers.
//!
//! Writes are routed to one balanced endpoint; deletes, searches and
//! counts fan out to every endpoint concurrently, fail soft per endpoint
//! and merge the partial results.

use crate::error::{Error, Result};
use crate::index::Bitmap;
use crate::network::client::Connection;
use crate::network::rpc::{Request, Response, SearchRequest};
use crate::query::TermQuery;
use crate::registry::{EndpointHub, Endpoint, LoadBalancer, RoundRobin};
use crate::types::Document;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::worker::INDEX_SERVICE;

/// Bound of the relay channel used to merge fan-out search results.
const SEARCH_RELAY_CAPACITY: usize = 100;

/// Connection pool keyed by endpoint address.
///
/// Read concurrently by fan-out tasks; eviction races are benign (last
/// writer wins) and the losing task closes its spare connection.
pub struct ConnectionPool {
    conns: DashMap<String, Arc<Connection>>,
    connect_timeout: Duration,
    call_timeout: Duration,
}

impl ConnectionPool {
    /// Create a pool with the given dial and call deadlines.
    pub fn new(connect_timeout: Duration, call_timeout: Duration) -> Self {
        Self {
            conns: DashMap::new(),
            connect_timeout,
            call_timeout,
        }
    }

    /// Return the cached connection for `endpoint`, evicting and
    /// redialing it when unhealthy.
    pub async fn get(&self, endpoint: &Endpoint) -> Result<Arc<Connection>> {
        if let Some(existing) = self.conns.get(&endpoint.addr) {
            let conn = existing.clone();
            drop(existing);
            if conn.is_healthy() {
                return Ok(conn);
            }
            debug!(addr = %endpoint.addr, "evicting unhealthy connection");
            self.conns
                .remove_if(&endpoint.addr, |_, cached| Arc::ptr_eq(cached, &conn));
            conn.close().await;
        }

        let fresh = Arc::new(
            Connection::dial(&endpoint.addr, self.connect_timeout, self.call_timeout).await?,
        );

        // Two tasks may race the redial; keep the winner and close the
        // loser's spare connection.
        let raced = match self.conns.entry(endpoint.addr.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get().clone();
                if existing.is_healthy() {
                    Some(existing)
                } else {
                    occupied.insert(fresh.clone());
                    None
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh.clone());
                None
            }
        };

        if let Some(existing) = raced {
            fresh.close().await;
            return Ok(existing);
        }
        Ok(fresh)
    }

    /// Close every pooled connection.
    pub async fn close_all(&self) {
        let addrs: Vec<String> = self.conns.iter().map(|e| e.key().clone()).collect();
        for addr in addrs {
            if let Some((_, conn)) = self.conns.remove(&addr) {
                conn.close().await;
            }
        }
    }
}

/// Cluster-facing coordinator: registry-backed endpoint set, pooled
/// connections, and a load-balancing strategy for writes.
pub struct Sentinel {
    hub: Arc<EndpointHub>,
    pool: Arc<ConnectionPool>,
    balancer: Box<dyn LoadBalancer>,
}

impl Sentinel {
    /// Create a sentinel with round-robin write balancing and the default
    /// deadlines.
    pub fn new(hub: Arc<EndpointHub>) -> Self {
        Self::with_balancer(hub, Box::new(RoundRobin::default()))
    }

    /// Create a sentinel with a custom load-balancing strategy.
    pub fn with_balancer(hub: Arc<EndpointHub>, balancer: Box<dyn LoadBalancer>) -> Self {
        Self {
            hub,
            pool: Arc::new(ConnectionPool::new(
                Duration::from_millis(500),
                Duration::from_millis(500),
            )),
            balancer,
        }
    }

    /// Route a document write to one balanced endpoint.
    pub async fn add_doc(&self, doc: Document) -> Result<u64> {
        let endpoints = self.hub.endpoints(INDEX_SERVICE).await;
        let target = self
            .balancer
            .take(&endpoints)
            .ok_or_else(|| Error::NoAliveWorker(INDEX_SERVICE.to_string()))?;

        let conn = self.pool.get(&target).await?;
        match conn.call(&Request::AddDoc(doc)).await? {
            Response::Affected(n) => {
                info!(addr = %target.addr, affected = n, "document added");
                Ok(n)
            }
            Response::Error(msg) => Err(Error::Remote(msg)),
            other => Err(Error::Internal(format!(
                "unexpected add response: {:?}",
                other
            ))),
        }
    }

    /// Delete a document on every worker. Returns 1 when any worker
    /// removed it, 0 otherwise.
    pub async fn delete_doc(&self, doc_id: &str) -> u64 {
        let endpoints = self.hub.endpoints(INDEX_SERVICE).await;
        if endpoints.is_empty() {
            return 0;
        }

        let mut tasks = JoinSet::new();
        for endpoint in endpoints {
            let pool = self.pool.clone();
            let request = Request::DeleteDoc {
                doc_id: doc_id.to_string(),
            };
            tasks.spawn(async move {
                match call_endpoint(&pool, &endpoint, &request).await {
                    Ok(Response::Affected(n)) => n > 0,
                    Ok(other) => {
                        warn!(addr = %endpoint.addr, response = ?other, "unexpected delete response");
                        false
                    }
                    Err(e) => {
                        warn!(addr = %endpoint.addr, error = %e, "delete fan-out failed");
                        false
                    }
                }
            });
        }

        let mut deleted = false;
        while let Some(res) = tasks.join_next().await {
            deleted |= res.unwrap_or(false);
        }
        deleted as u64
    }

    /// Search every worker concurrently and merge the results.
    ///
    /// Producers relay documents through a bounded channel into a
    /// collector task; once every producer has finished the senders are
    /// dropped, the collector drains what is in flight and confirms the
    /// drained set back before the merge returns.
    pub async fn search(
        &self,
        query: &TermQuery,
        on_flag: Option<&Bitmap>,
        off_flag: Option<&Bitmap>,
        or_flags: &[Bitmap],
    ) -> Vec<Document> {
        let endpoints = self.hub.endpoints(INDEX_SERVICE).await;
        if endpoints.is_empty() {
            return Vec::new();
        }

        let request = Request::Search(SearchRequest {
            query: query.clone(),
            on_flag: on_flag.cloned(),
            off_flag: off_flag.cloned(),
            or_flags: or_flags.to_vec(),
        });

        let (relay_tx, mut relay_rx) = mpsc::channel::<Document>(SEARCH_RELAY_CAPACITY);
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut merged = Vec::new();
            while let Some(doc) = relay_rx.recv().await {
                merged.push(doc);
            }
            let _ = done_tx.send(merged);
        });

        let mut tasks = JoinSet::new();
        for endpoint in endpoints {
            let pool = self.pool.clone();
            let request = request.clone();
            let relay = relay_tx.clone();
            tasks.spawn(async move {
                match call_endpoint(&pool, &endpoint, &request).await {
                    Ok(Response::Docs(docs)) => {
                        debug!(addr = %endpoint.addr, hits = docs.len(), "merged worker results");
                        for doc in docs {
                            if relay.send(doc).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(other) => {
                        warn!(addr = %endpoint.addr, response = ?other, "unexpected search response");
                    }
                    Err(e) => {
                        warn!(addr = %endpoint.addr, error = %e, "search fan-out failed");
                    }
                }
            });
        }

        // Producers first, then the relay closes, then the collector's
        // confirmation. This ordering guarantees no in-flight result is
        // lost and the bounded channel cannot deadlock.
        while tasks.join_next().await.is_some() {}
        drop(relay_tx);
        done_rx.await.unwrap_or_default()
    }

    /// Sum the document counts of every worker.
    pub async fn count(&self) -> u64 {
        let endpoints = self.hub.endpoints(INDEX_SERVICE).await;
        if endpoints.is_empty() {
            return 0;
        }

        let mut tasks = JoinSet::new();
        for endpoint in endpoints {
            let pool = self.pool.clone();
            tasks.spawn(async move {
                match call_endpoint(&pool, &endpoint, &Request::Count).await {
                    Ok(Response::Count(n)) => n,
                    Ok(other) => {
                        warn!(addr = %endpoint.addr, response = ?other, "unexpected count response");
                        0
                    }
                    Err(e) => {
                        warn!(addr = %endpoint.addr, error = %e, "count fan-out failed");
                        0
                    }
                }
            });
        }

        let mut total = 0;
        while let Some(res) = tasks.join_next().await {
            total += res.unwrap_or(0);
        }
        total
    }

    /// Close every pooled connection and the endpoint hub.
    pub async fn close(&self) -> Result<()> {
        self.pool.close_all().await;
        self.hub.close().await
    }
}

async fn call_endpoint(
    pool: &ConnectionPool,
    endpoint: &Endpoint,
    request: &Request,
) -> Result<Response> {
    let conn = pool.get(endpoint).await?;
    conn.call(request).await
}

impl std::fmt::Debug for Sentinel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sentinel").finish()
    }
}
