//! Application layer: the heartbeat sender, the status responder, and the
//! scheduler that drives the sender.
//!
//! Transport details live behind the [`heartbeat::Connector`] trait and plain
//! `AsyncRead + AsyncWrite` streams, so everything here can be exercised with
//! scripted in-memory streams.

pub mod counter;
pub mod heartbeat;
pub mod scheduler;
pub mod status;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of the buffer used for every read on a pulse connection.
///
/// A message larger than this is truncated by the read and will fail to
/// decode.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Where a single heartbeat tick is (or stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Idle,
    Connecting,
    Sent,
    AwaitingAck,
    Done,
    Failed,
}

impl TickPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            TickPhase::Idle => "idle",
            TickPhase::Connecting => "connecting",
            TickPhase::Sent => "sent",
            TickPhase::AwaitingAck => "awaiting-ack",
            TickPhase::Done => "done",
            TickPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for TickPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that can end a single exchange early.
///
/// None of these are fatal to the agent: the sender logs and waits for the
/// next tick, the responder logs and drops the connection.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The peer refused the connection or could not be reached.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// `io_timeout` elapsed while waiting.
    #[error("timed out while {phase}")]
    Timeout { phase: &'static str },
    /// The remote side closed the connection (a read returned zero bytes).
    #[error("connection closed by peer while {phase}")]
    ConnectionClosed { phase: &'static str },
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The outgoing message could not be encoded.
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Awaits `fut`, bounded by `limit` when one is configured.
pub(crate) async fn bounded<F, T>(
    limit: Option<Duration>,
    phase: &'static str,
    fut: F,
) -> Result<T, ExchangeError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ExchangeError::Timeout { phase })?
            .map_err(ExchangeError::from),
        None => fut.await.map_err(ExchangeError::from),
    }
}

/// Reads one message (up to [`READ_BUFFER_SIZE`] bytes).
///
/// Returns the bytes read; an empty vector means the peer closed the
/// connection.
pub(crate) async fn read_message<S>(
    stream: &mut S,
    limit: Option<Duration>,
    phase: &'static str,
) -> Result<Vec<u8>, ExchangeError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let n = bounded(limit, phase, stream.read(&mut buf)).await?;
    buf.truncate(n);
    Ok(buf)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
