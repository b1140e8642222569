//! Client connection to an index worker.

use crate::error::{Error, NetworkError, Result};
use crate::network::rpc::{
    decode_response, encode_request, frame, Request, Response, MAX_FRAME_SIZE,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// A pooled request/response connection to one worker address.
///
/// Calls are serialized over the single stream; a transport failure or a
/// deadline miss marks the connection broken so the pool evicts and
/// redials it.
pub struct Connection {
    addr: String,
    stream: Mutex<TcpStream>,
    broken: AtomicBool,
    call_timeout: Duration,
}

impl Connection {
    /// Dial `addr` under `connect_timeout`; subsequent calls are bounded
    /// by `call_timeout`.
    pub async fn dial(
        addr: &str,
        connect_timeout: Duration,
        call_timeout: Duration,
    ) -> Result<Self> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| NetworkError::ConnectionFailed {
                addr: addr.to_string(),
                reason: "connect timeout".to_string(),
            })?
            .map_err(|e| NetworkError::ConnectionFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        debug!(addr, "connected to index worker");
        Ok(Self {
            addr: addr.to_string(),
            stream: Mutex::new(stream),
            broken: AtomicBool::new(false),
            call_timeout,
        })
    }

    /// The remote address of this connection.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// False once a call has failed on this connection.
    pub fn is_healthy(&self) -> bool {
        !self.broken.load(Ordering::Acquire)
    }

    /// Perform one request/response exchange under the call deadline.
    pub async fn call(&self, request: &Request) -> Result<Response> {
        let payload = frame(&encode_request(request)?);

        let result = tokio::time::timeout(self.call_timeout, self.exchange(&payload)).await;
        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                self.broken.store(true, Ordering::Release);
                Err(e)
            }
            Err(_) => {
                self.broken.store(true, Ordering::Release);
                Err(Error::Timeout)
            }
        }
    }

    async fn exchange(&self, payload: &[u8]) -> Result<Response> {
        let mut stream = self.stream.lock().await;

        stream
            .write_all(payload)
            .await
            .map_err(|e| NetworkError::SendFailed(e.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|e| NetworkError::SendFailed(e.to_string()))?;

        let mut len_buf = [0u8; 4];
        stream
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| NetworkError::ReceiveFailed(e.to_string()))?;

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(NetworkError::ReceiveFailed("frame too large".to_string()).into());
        }

        let mut data = vec![0u8; len];
        stream
            .read_exact(&mut data)
            .await
            .map_err(|e| NetworkError::ReceiveFailed(e.to_string()))?;

        decode_response(&data)
    }

    /// Shut down the underlying stream. Further calls fail.
    pub async fn close(&self) {
        self.broken.store(true, Ordering::Release);
        let mut stream = self.stream.lock().await;
        let _ = stream.shutdown().await;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("addr", &self.addr)
            .field("healthy", &self.is_healthy())
            .finish()
    }
}
