//! TCP server exposing the index worker's RPC surface.

use crate::error::{NetworkError, Result};
use crate::network::rpc::{
    decode_request, encode_response, Request, Response, MAX_FRAME_SIZE,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Handler for incoming requests.
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle a request and produce its response.
    fn handle(&self, request: Request) -> Response;
}

/// Length-prefixed TCP server for the cluster RPC surface.
pub struct NetworkServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: Arc<dyn RequestHandler>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl NetworkServer {
    /// Bind to `addr` (port 0 picks an ephemeral port) and return the
    /// server together with its shutdown sender.
    pub async fn bind(
        addr: SocketAddr,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(Self, mpsc::Sender<()>)> {
        let listener = TcpListener::bind(addr).await.map_err(NetworkError::Io)?;
        let local_addr = listener.local_addr().map_err(NetworkError::Io)?;
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        Ok((
            Self {
                listener,
                local_addr,
                handler,
                shutdown_rx,
            },
            shutdown_tx,
        ))
    }

    /// The address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the shutdown sender fires.
    pub async fn run(mut self) -> Result<()> {
        info!(addr = %self.local_addr, "index server listening");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!(peer = %peer, "accepted connection");
                            let handler = self.handler.clone();
                            tokio::spawn(async move {
                                if let Err(e) = Self::handle_connection(stream, handler).await {
                                    debug!(error = %e, "connection handler error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!(addr = %self.local_addr, "index server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_connection(
        mut stream: TcpStream,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<()> {
        loop {
            let mut len_buf = [0u8; 4];
            match stream.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(NetworkError::Io(e).into()),
            }

            let len = u32::from_be_bytes(len_buf) as usize;
            if len > MAX_FRAME_SIZE {
                return Err(NetworkError::ReceiveFailed("frame too large".to_string()).into());
            }

            let mut data = vec![0u8; len];
            stream
                .read_exact(&mut data)
                .await
                .map_err(NetworkError::Io)?;

            let response = match decode_request(&data) {
                Ok(request) => handler.handle(request),
                Err(e) => Response::Error(e.to_string()),
            };

            let payload = encode_response(&response)?;
            stream
                .write_all(&(payload.len() as u32).to_be_bytes())
                .await
                .map_err(NetworkError::Io)?;
            stream.write_all(&payload).await.map_err(NetworkError::Io)?;
            stream.flush().await.map_err(NetworkError::Io)?;
        }
    }
}
