//! Stateless façade over the codec with a single failure shape.
//!
//! Whatever goes wrong below this layer (a missing required field, a payload
//! meant for another decoder, truncated bytes) reaches the caller as an
//! [`ErrorMessage`].  Callers never match on [`CodecError`] variants; they
//! check `message.kind() == MessageKind::Error` and move on.
//!
//! ```rust
//! use pulse_core::protocol::{MessageDispatcher, MessageKind, StatusMessage};
//!
//! let bytes = MessageDispatcher::encode(&StatusMessage::default().into()).unwrap();
//! let reply = MessageDispatcher::decode(MessageKind::Heartbeat, &bytes);
//! assert_eq!(reply.kind(), MessageKind::Error);
//! ```

use tracing::debug;

use crate::protocol::codec::{
    self, decode_error, decode_heartbeat, decode_status, encode_error, encode_heartbeat,
    encode_status, CodecError,
};
use crate::protocol::messages::{ErrorMessage, Message, MessageKind};

/// Routes messages to the codec path for their kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageDispatcher;

impl MessageDispatcher {
    /// Encodes any [`Message`].
    ///
    /// # Errors
    ///
    /// Returns the in-band [`ErrorMessage`] describing why the message could
    /// not be encoded.  Only heartbeats can fail; error messages never do, so
    /// the returned value can always be put on the wire with
    /// `encode(&err.into())`.
    pub fn encode(msg: &Message) -> Result<Vec<u8>, ErrorMessage> {
        match msg {
            Message::Heartbeat(m) => encode_heartbeat(m).map_err(|e| {
                debug!(error = %e, "heartbeat encode rejected");
                ErrorMessage::from(e)
            }),
            Message::Status(m) => Ok(encode_status(m)),
            Message::Error(m) => Ok(encode_error(m)),
        }
    }

    /// Decodes `bytes` with the decoder for `kind`.
    ///
    /// Never fails: a decode failure is returned as [`Message::Error`].
    pub fn decode(kind: MessageKind, bytes: &[u8]) -> Message {
        let result = match kind {
            MessageKind::Heartbeat => decode_heartbeat(bytes).map(Message::Heartbeat),
            MessageKind::Status => decode_status(bytes).map(Message::Status),
            MessageKind::Error => decode_error(bytes).map(Message::Error),
        };
        Self::settle(result, bytes.len())
    }

    /// Decodes `bytes` by reading the kind tag first.
    ///
    /// Used where the reply is only logged, so the caller does not have to
    /// guess which schema the peer chose.
    pub fn decode_any(bytes: &[u8]) -> Message {
        Self::settle(codec::decode_any(bytes), bytes.len())
    }

    fn settle(result: Result<Message, CodecError>, len: usize) -> Message {
        result.unwrap_or_else(|e| {
            debug!(error = %e, len, "decode produced an error message");
            Message::Error(e.into())
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
