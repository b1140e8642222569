//! Per-node index worker: serves the RPC surface and keeps its registry
//! lease alive.

use crate::config::NodeConfig;
use crate::error::Result;
use crate::index::Indexer;
use crate::network::rpc::{Request, Response};
use crate::network::server::{NetworkServer, RequestHandler};
use crate::registry::{Endpoint, Registry};
use crate::storage::open_store;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Registry service name under which index workers register.
pub const INDEX_SERVICE: &str = "index_service";

/// Slack subtracted from the heartbeat interval so renewal lands before
/// the lease expires.
const RENEWAL_SLACK: Duration = Duration::from_millis(100);

/// Dispatches incoming requests to the node's indexer.
pub struct WorkerHandler {
    indexer: Arc<Indexer>,
}

impl WorkerHandler {
    /// Create a handler over the node's indexer.
    pub fn new(indexer: Arc<Indexer>) -> Self {
        Self { indexer }
    }
}

impl RequestHandler for WorkerHandler {
    fn handle(&self, request: Request) -> Response {
        match request {
            Request::AddDoc(doc) => match self.indexer.add_doc(doc) {
                Ok(n) => Response::Affected(n),
                Err(e) => Response::Error(e.to_string()),
            },
            Request::DeleteDoc { doc_id } => Response::Affected(self.indexer.delete_doc(&doc_id)),
            Request::Search(search) => Response::Docs(self.indexer.search(
                &search.query,
                search.on_flag.as_ref(),
                search.off_flag.as_ref(),
                &search.or_flags,
            )),
            Request::Count => Response::Count(self.indexer.count()),
            Request::Forward(envelope) => match envelope.unwrap() {
                Ok(inner) => self.handle(inner),
                Err(e) => Response::Error(e.to_string()),
            },
        }
    }
}

/// A running index node: indexer, RPC server, and registry lease.
pub struct IndexWorker {
    indexer: Arc<Indexer>,
    endpoint: Endpoint,
    local_addr: SocketAddr,
    server_shutdown: mpsc::Sender<()>,
    registration: Mutex<Option<RegistrationState>>,
}

struct RegistrationState {
    registry: Arc<dyn Registry>,
    heartbeat_shutdown: mpsc::Sender<()>,
}

impl IndexWorker {
    /// Validate the configuration, open the forward store, replay it into
    /// the reverse index weighted by the node weight, and start serving.
    pub async fn start(config: NodeConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let store = open_store(config.store_backend)?;
        let indexer = Arc::new(Indexer::new(store, config.doc_estimate));
        indexer.load(config.weight);

        let handler = Arc::new(WorkerHandler::new(indexer.clone()));
        let (server, server_shutdown) = NetworkServer::bind(config.listen_addr, handler).await?;
        let local_addr = server.local_addr();
        tokio::spawn(server.run());

        info!(addr = %local_addr, "index worker started");
        Ok(Arc::new(Self {
            indexer,
            endpoint: Endpoint::new(local_addr.to_string(), config.weight),
            local_addr,
            server_shutdown,
            registration: Mutex::new(None),
        }))
    }

    /// The address the worker is serving on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The endpoint this worker registers under.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The node's indexer.
    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    /// Register with the registry and keep renewing the lease every
    /// `heartbeat` until the worker closes.
    pub async fn register(&self, registry: Arc<dyn Registry>, heartbeat: Duration) -> Result<()> {
        let mut lease = registry.register(INDEX_SERVICE, &self.endpoint, 0).await?;
        info!(addr = %self.endpoint.addr, lease, "registered with service registry");

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let renewal_registry = registry.clone();
        let endpoint = self.endpoint.clone();
        let interval = heartbeat.saturating_sub(RENEWAL_SLACK);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(interval) => {
                        match renewal_registry.register(INDEX_SERVICE, &endpoint, lease).await {
                            Ok(renewed) => lease = renewed,
                            Err(e) => {
                                warn!(addr = %endpoint.addr, error = %e, "lease renewal failed");
                            }
                        }
                    }
                }
            }
        });

        *self.registration.lock() = Some(RegistrationState {
            registry,
            heartbeat_shutdown: shutdown_tx,
        });
        Ok(())
    }

    /// Deregister, stop the server, and close the indexer.
    pub async fn close(&self) -> Result<()> {
        let registration = self.registration.lock().take();
        if let Some(state) = registration {
            let _ = state.heartbeat_shutdown.send(()).await;
            if let Err(e) = state
                .registry
                .deregister(INDEX_SERVICE, &self.endpoint.addr)
                .await
            {
                warn!(addr = %self.endpoint.addr, error = %e, "deregistration failed");
            }
        }

        let _ = self.server_shutdown.send(()).await;
        self.indexer.close()
    }
}

impl std::fmt::Debug for IndexWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWorker")
            .field("addr", &self.local_addr)
            .finish()
    }
}
