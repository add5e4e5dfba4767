//! Inbound side of the agent: answers status probes with the heartbeat count.
//!
//! Per connection:
//!
//! 1. Read one request (up to 1 KiB).  Zero bytes means the prober hung up;
//!    only this connection is abandoned.
//! 2. Decode and log the request.  Its content does not change the answer.
//! 3. Reply with a [`StatusMessage`] carrying the current count.
//! 4. Read and log one acknowledgement, if the prober sends one.
//! 5. Shut the connection down, whatever happened above.
//!
//! The accept loop in [`StatusResponder::run`] hands every connection to its
//! own task so that a slow prober never delays the next one.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use pulse_core::{MessageDispatcher, StatusMessage};

use crate::application::counter::CounterReader;
use crate::application::{bounded, read_message, ExchangeError};

const PHASE_REQUEST: &str = "reading request";
const PHASE_REPLY: &str = "sending status";
const PHASE_ACK: &str = "reading acknowledgement";

/// Serves status probes from a read-only view of the heartbeat counter.
#[derive(Debug, Clone)]
pub struct StatusResponder {
    counter: CounterReader,
    identifier: u32,
    io_timeout: Option<Duration>,
}

impl StatusResponder {
    pub fn new(counter: CounterReader, identifier: u32, io_timeout: Option<Duration>) -> Self {
        Self {
            counter,
            identifier,
            io_timeout,
        }
    }

    /// Accepts connections forever, serving each on its own task.
    ///
    /// Accept errors (for example running out of file descriptors) are logged
    /// and the loop keeps going.
    pub async fn run(self, listener: TcpListener) {
        match listener.local_addr() {
            Ok(addr) => info!(%addr, "status responder listening"),
            Err(e) => warn!(error = %e, "status responder listening on unknown address"),
        }

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let responder = self.clone();
                    let span = info_span!("status", session = %Uuid::new_v4(), %peer);
                    tokio::spawn(
                        async move { responder.handle_connection(stream, peer).await }
                            .instrument(span),
                    );
                }
                Err(e) => error!(error = %e, "accept error"),
            }
        }
    }

    async fn handle_connection<S>(&self, stream: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.serve(stream).await {
            Ok(status) => info!(%peer, count = status.heartbeat_count, "status served"),
            Err(e) => warn!(%peer, error = %e, "status probe aborted"),
        }
    }

    /// Runs the request/reply/acknowledge exchange on one connection and
    /// shuts it down.
    ///
    /// Returns the status that was sent.
    pub async fn serve<S>(&self, mut stream: S) -> Result<StatusMessage, ExchangeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = self.converse(&mut stream).await;
        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "shutdown after status reply failed");
        }
        result
    }

    async fn converse<S>(&self, stream: &mut S) -> Result<StatusMessage, ExchangeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request = read_message(stream, self.io_timeout, PHASE_REQUEST).await?;
        if request.is_empty() {
            return Err(ExchangeError::ConnectionClosed {
                phase: PHASE_REQUEST,
            });
        }
        debug!(request = ?MessageDispatcher::decode_any(&request), "probe received");

        let status = StatusMessage {
            heartbeat_count: self.counter.get(),
            identifier: self.identifier,
        };
        let bytes = MessageDispatcher::encode(&status.into())
            .map_err(|e| ExchangeError::Encode(e.text))?;
        bounded(self.io_timeout, PHASE_REPLY, async {
            stream.write_all(&bytes).await?;
            stream.flush().await
        })
        .await?;

        // The status is already delivered; a missing ack does not undo that.
        match read_message(stream, self.io_timeout, PHASE_ACK).await {
            Ok(ack) if ack.is_empty() => debug!("prober closed without acknowledgement"),
            Ok(ack) => {
                debug!(ack = ?MessageDispatcher::decode_any(&ack), "acknowledgement received")
            }
            Err(e) => debug!(error = %e, "no acknowledgement after status reply"),
        }
        Ok(status)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::counter::HeartbeatCounter;
    use pulse_core::protocol::{encode_heartbeat, encode_status};
    use pulse_core::HeartbeatMessage;
    use tokio_test::io::Builder;

    fn probe() -> Vec<u8> {
        encode_heartbeat(&HeartbeatMessage::new("send me count please", "0.0.0.0", 4000, 7)).unwrap()
    }

    fn responder_with_count(n: u64) -> (HeartbeatCounter, StatusResponder) {
        let counter = HeartbeatCounter::new();
        for _ in 0..n {
            counter.record();
        }
        let responder = StatusResponder::new(counter.reader(), 1234, None);
        (counter, responder)
    }

    #[tokio::test]
    async fn test_serve_replies_with_current_count() {
        // Arrange
        let (_counter, responder) = responder_with_count(5);
        let expected = encode_status(&StatusMessage {
            heartbeat_count: 5,
            identifier: 1234,
        });
        let stream = Builder::new()
            .read(&probe())
            .write(&expected)
            .read(&probe())
            .build();

        // Act
        let status = responder.serve(stream).await.unwrap();

        // Assert
        assert_eq!(status.heartbeat_count, 5);
        assert_eq!(status.identifier, 1234);
    }

    #[tokio::test]
    async fn test_serve_tolerates_missing_acknowledgement() {
        let (_counter, responder) = responder_with_count(0);
        let expected = encode_status(&StatusMessage {
            heartbeat_count: 0,
            identifier: 1234,
        });
        let stream = Builder::new().read(&probe()).write(&expected).build();

        let status = responder.serve(stream).await.unwrap();

        assert_eq!(status.heartbeat_count, 0);
    }

    #[tokio::test]
    async fn test_zero_byte_request_aborts_without_reply() {
        let (_counter, responder) = responder_with_count(3);
        // No write is scripted: any reply would fail the mock.
        let stream = Builder::new().build();

        let result = responder.serve(stream).await;

        assert!(matches!(
            result,
            Err(ExchangeError::ConnectionClosed {
                phase: PHASE_REQUEST
            })
        ));
    }

    #[tokio::test]
    async fn test_undecodable_request_is_still_answered() {
        let (_counter, responder) = responder_with_count(2);
        let expected = encode_status(&StatusMessage {
            heartbeat_count: 2,
            identifier: 1234,
        });
        let stream = Builder::new().read(&[0xFF, 0xFF]).write(&expected).build();

        assert!(responder.serve(stream).await.is_ok());
    }

    #[tokio::test]
    async fn test_reply_reflects_counter_at_request_time() {
        // Arrange
        let (counter, responder) = responder_with_count(1);
        counter.record();
        let expected = encode_status(&StatusMessage {
            heartbeat_count: 2,
            identifier: 1234,
        });
        let stream = Builder::new().read(&probe()).write(&expected).build();

        // Act
        let status = responder.serve(stream).await.unwrap();

        // Assert
        assert_eq!(status.heartbeat_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_prober_times_out_when_limit_configured() {
        let counter = HeartbeatCounter::new();
        let responder = StatusResponder::new(counter.reader(), 1, Some(Duration::from_secs(2)));
        let stream = Builder::new().wait(Duration::from_secs(60)).build();

        let result = responder.serve(stream).await;

        assert!(matches!(
            result,
            Err(ExchangeError::Timeout {
                phase: PHASE_REQUEST
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_timeout_after_reply_still_counts_as_served() {
        // Arrange
        let (_counter, responder) = responder_with_count(4);
        let responder = StatusResponder {
            io_timeout: Some(Duration::from_secs(2)),
            ..responder
        };
        let expected = encode_status(&StatusMessage {
            heartbeat_count: 4,
            identifier: 1234,
        });
        let stream = Builder::new()
            .read(&probe())
            .write(&expected)
            .wait(Duration::from_secs(60))
            .build();

        // Act
        let result = responder.serve(stream).await;

        // Assert
        assert_eq!(result.unwrap().heartbeat_count, 4);
    }

    #[tokio::test]
    async fn test_ack_read_error_after_reply_still_counts_as_served() {
        let (_counter, responder) = responder_with_count(1);
        let expected = encode_status(&StatusMessage {
            heartbeat_count: 1,
            identifier: 1234,
        });
        let stream = Builder::new()
            .read(&probe())
            .write(&expected)
            .read_error(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
            .build();

        let status = responder.serve(stream).await.unwrap();

        assert_eq!(status.heartbeat_count, 1);
    }
}
