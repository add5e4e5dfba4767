//! Outbound side of the agent: one heartbeat exchange per tick.
//!
//! A tick walks `Idle → Connecting → Sent → AwaitingAck` and ends in either
//! `Done` or `Failed`.  Failures are logged and reported in the returned
//! [`TickOutcome`]; they never propagate, so the scheduler simply moves on to
//! the next tick.  There is no retry within a tick.
//!
//! ```text
//!  agent                                   peer
//!    │ ── connect ────────────────────────▶ │
//!    │ ── HeartbeatMessage ("I’m here!") ─▶ │
//!    │ ◀───────────────────────── reply ─── │   (any kind, logged)
//!    │ ── shutdown ───────────────────────▶ │
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use pulse_core::{HeartbeatMessage, Message, MessageDispatcher};

use crate::application::counter::{CountPolicy, CounterReader, HeartbeatCounter};
use crate::application::{bounded, read_message, ExchangeError, TickPhase};

/// Text carried by every scheduled heartbeat.
pub const HEARTBEAT_TEXT: &str = "I’m here!";

/// Text carried by the one-off greeting sent at startup.
pub const GREETING_TEXT: &str = "First Message";

/// Opens outbound connections to the peer.
///
/// The production implementation is
/// [`TcpConnector`](crate::infrastructure::network::TcpConnector); tests
/// hand back scripted in-memory streams.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self, host: &str, port: u16) -> std::io::Result<Self::Stream>;
}

/// Static parameters of the heartbeat exchange.
#[derive(Debug, Clone)]
pub struct SenderSettings {
    pub peer_host: String,
    pub peer_port: u16,
    /// Host placed in `origin_host` so the peer knows where to probe.
    pub advertise_host: String,
    /// Port of our own status listener, placed in `origin_port`.
    pub listen_port: u16,
    pub identifier: u32,
    pub policy: CountPolicy,
    pub io_timeout: Option<Duration>,
}

impl SenderSettings {
    fn peer_addr(&self) -> String {
        format!("{}:{}", self.peer_host, self.peer_port)
    }
}

/// Result of one tick.
#[derive(Debug)]
pub struct TickOutcome {
    /// `Done` or `Failed`.
    pub phase: TickPhase,
    /// Phase the tick was in when it failed.
    pub failed_in: Option<TickPhase>,
    /// Counter value after the tick.
    pub count: u64,
    /// Decoded reply, when one arrived.
    pub reply: Option<Message>,
    pub error: Option<ExchangeError>,
}

impl TickOutcome {
    pub fn is_done(&self) -> bool {
        self.phase == TickPhase::Done
    }
}

/// Sends heartbeats to the peer and owns the heartbeat counter.
pub struct HeartbeatSender<C: Connector> {
    connector: C,
    counter: HeartbeatCounter,
    settings: SenderSettings,
}

impl<C: Connector> HeartbeatSender<C> {
    pub fn new(connector: C, counter: HeartbeatCounter, settings: SenderSettings) -> Self {
        Self {
            connector,
            counter,
            settings,
        }
    }

    /// Read-only handle on the heartbeat counter, for the status responder.
    pub fn counter(&self) -> CounterReader {
        self.counter.reader()
    }

    pub fn settings(&self) -> &SenderSettings {
        &self.settings
    }

    /// Runs one heartbeat exchange.
    pub async fn tick(&self) -> TickOutcome {
        if self.settings.policy == CountPolicy::Attempts {
            self.counter.record();
        }

        let mut phase = TickPhase::Idle;
        let result = self.exchange(HEARTBEAT_TEXT, &mut phase).await;

        match result {
            Ok(reply) => {
                if self.settings.policy == CountPolicy::Successes {
                    self.counter.record();
                }
                let count = self.counter.get();
                info!(
                    peer = %self.settings.peer_addr(),
                    count,
                    reply = ?reply,
                    "heartbeat acknowledged"
                );
                TickOutcome {
                    phase: TickPhase::Done,
                    failed_in: None,
                    count,
                    reply: Some(reply),
                    error: None,
                }
            }
            Err(e) => {
                let count = self.counter.get();
                warn!(
                    peer = %self.settings.peer_addr(),
                    phase = %phase,
                    count,
                    error = %e,
                    "heartbeat failed"
                );
                TickOutcome {
                    phase: TickPhase::Failed,
                    failed_in: Some(phase),
                    count,
                    reply: None,
                    error: Some(e),
                }
            }
        }
    }

    /// Sends the startup greeting.  Does not touch the counter.
    pub async fn send_greeting(&self) -> Result<Message, ExchangeError> {
        let mut phase = TickPhase::Idle;
        let result = self.exchange(GREETING_TEXT, &mut phase).await;
        match &result {
            Ok(reply) => info!(peer = %self.settings.peer_addr(), reply = ?reply, "greeting acknowledged"),
            Err(e) => warn!(
                peer = %self.settings.peer_addr(),
                phase = %phase,
                error = %e,
                "greeting failed"
            ),
        }
        result
    }

    /// Connects, converses, and always shuts the stream down afterwards.
    async fn exchange(&self, text: &str, phase: &mut TickPhase) -> Result<Message, ExchangeError> {
        let s = &self.settings;
        *phase = TickPhase::Connecting;

        let connect = self.connector.connect(&s.peer_host, s.peer_port);
        let connected = match s.io_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| ExchangeError::Timeout {
                    phase: TickPhase::Connecting.as_str(),
                })?,
            None => connect.await,
        };
        let mut stream = connected.map_err(|source| ExchangeError::Connect {
            addr: s.peer_addr(),
            source,
        })?;
        debug!(peer = %s.peer_addr(), "connected");

        let result = self.converse(&mut stream, text, phase).await;
        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "shutdown after heartbeat failed");
        }
        if result.is_ok() {
            *phase = TickPhase::Done;
        }
        result
    }

    async fn converse(
        &self,
        stream: &mut C::Stream,
        text: &str,
        phase: &mut TickPhase,
    ) -> Result<Message, ExchangeError> {
        let s = &self.settings;
        let heartbeat = HeartbeatMessage::new(
            text,
            s.advertise_host.clone(),
            u32::from(s.listen_port),
            s.identifier,
        );
        let bytes = MessageDispatcher::encode(&heartbeat.into())
            .map_err(|e| ExchangeError::Encode(e.text))?;

        *phase = TickPhase::Sent;
        bounded(s.io_timeout, TickPhase::Sent.as_str(), async {
            stream.write_all(&bytes).await?;
            stream.flush().await
        })
        .await?;

        *phase = TickPhase::AwaitingAck;
        let reply = read_message(stream, s.io_timeout, TickPhase::AwaitingAck.as_str()).await?;
        if reply.is_empty() {
            return Err(ExchangeError::ConnectionClosed {
                phase: TickPhase::AwaitingAck.as_str(),
            });
        }
        Ok(MessageDispatcher::decode_any(&reply))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
