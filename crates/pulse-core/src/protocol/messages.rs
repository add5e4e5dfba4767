//! All pulse protocol message types.
//!
//! Every message is a small protobuf-style record (see [`crate::protocol::wire`]).
//! Field numbers and wire types are fixed by the schema tables at the bottom of
//! this file; the codec consults them both when encoding and when deciding
//! whether a decoded payload really belongs to the schema that was asked for.

use std::fmt;

// ── Message kinds ─────────────────────────────────────────────────────────────

/// Discriminant carried in field 1 of every message.
///
/// The zero value (`Heartbeat`) is never written to the wire: a payload with
/// no field 1 *is* a heartbeat.  The value `2` sits between `Status` and
/// `Error` and has no producer; it is deliberately not a variant, so any
/// payload carrying it fails every decoder's shape check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Heartbeat = 0,
    Status = 1,
    Error = 3,
}

impl MessageKind {
    /// Wire value of this kind.
    pub fn as_u64(self) -> u64 {
        self as u64
    }

    /// Human-readable name used in log lines and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::Heartbeat => "heartbeat",
            MessageKind::Status => "status",
            MessageKind::Error => "error",
        }
    }
}

impl TryFrom<u64> for MessageKind {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, u64> {
        match value {
            0 => Ok(MessageKind::Heartbeat),
            1 => Ok(MessageKind::Status),
            3 => Ok(MessageKind::Error),
            other => Err(other),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Per-message payload structs ───────────────────────────────────────────────

/// HEARTBEAT (kind 0): liveness announcement sent by the agent to its peer.
///
/// `text` and `origin_host` are required.  They are `Option`s only so that a
/// missing value can be represented and rejected by the encoder with a
/// readable diagnostic; the decoder always produces `Some`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeartbeatMessage {
    /// Human-readable greeting.
    pub text: Option<String>,
    /// Host the sender can be reached on for status probes.
    pub origin_host: Option<String>,
    /// Port the sender's status listener is bound to.
    pub origin_port: u32,
    /// Identifier of the sending agent.
    pub identifier: u32,
}

impl HeartbeatMessage {
    /// Builds a heartbeat with every required field present.
    pub fn new(
        text: impl Into<String>,
        origin_host: impl Into<String>,
        origin_port: u32,
        identifier: u32,
    ) -> Self {
        Self {
            text: Some(text.into()),
            origin_host: Some(origin_host.into()),
            origin_port,
            identifier,
        }
    }
}

/// STATUS (kind 1): reply carrying how many heartbeats the agent has sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusMessage {
    pub heartbeat_count: u64,
    pub identifier: u32,
}

/// ERROR (kind 3): in-band diagnostic.
///
/// Every codec failure is converted into one of these so callers only ever
/// branch on the message kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorMessage {
    pub text: String,
}

impl ErrorMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// A logical protocol message.  The kind is derived from the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Heartbeat(HeartbeatMessage),
    Status(StatusMessage),
    Error(ErrorMessage),
}

impl Message {
    /// Returns the [`MessageKind`] discriminant for this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Heartbeat(_) => MessageKind::Heartbeat,
            Message::Status(_) => MessageKind::Status,
            Message::Error(_) => MessageKind::Error,
        }
    }

    /// `true` when this is the in-band error variant.
    pub fn is_error(&self) -> bool {
        matches!(self, Message::Error(_))
    }
}

impl From<HeartbeatMessage> for Message {
    fn from(m: HeartbeatMessage) -> Self {
        Message::Heartbeat(m)
    }
}

impl From<StatusMessage> for Message {
    fn from(m: StatusMessage) -> Self {
        Message::Status(m)
    }
}

impl From<ErrorMessage> for Message {
    fn from(m: ErrorMessage) -> Self {
        Message::Error(m)
    }
}

// ── Field numbers ─────────────────────────────────────────────────────────────

/// Field 1 of every schema.
pub const FIELD_KIND: u32 = 1;

pub mod heartbeat_fields {
    pub const TEXT: u32 = 2;
    pub const ORIGIN_HOST: u32 = 3;
    pub const ORIGIN_PORT: u32 = 4;
    pub const IDENTIFIER: u32 = 5;
}

pub mod status_fields {
    pub const HEARTBEAT_COUNT: u32 = 2;
    pub const IDENTIFIER: u32 = 3;
}

pub mod error_fields {
    pub const TEXT: u32 = 2;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
