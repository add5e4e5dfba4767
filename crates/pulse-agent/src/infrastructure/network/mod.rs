//! TCP adapters for the application layer.
//!
//! - [`TcpConnector`] implements [`Connector`] with a plain `TcpStream`.
//! - [`bind_listener`] binds the status listener once at startup.

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::application::heartbeat::Connector;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Opens a fresh TCP connection per heartbeat.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect((host, port)).await?;
        // Each message is a single small write.
        stream.set_nodelay(true)?;
        debug!(local = ?stream.local_addr().ok(), "tcp connection opened");
        Ok(stream)
    }
}

/// Binds the status listener on `host:port`.
///
/// # Errors
///
/// Returns [`NetworkError::BindFailed`] if the address is in use, cannot be
/// resolved, or the process lacks permission to bind it.
pub async fn bind_listener(host: &str, port: u16) -> Result<TcpListener, NetworkError> {
    TcpListener::bind((host, port))
        .await
        .map_err(|source| NetworkError::BindFailed {
            addr: format!("{host}:{port}"),
            source,
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
