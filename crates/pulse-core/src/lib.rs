//! # pulse-core
//!
//! Shared library for the pulse liveness agent containing the wire codec and
//! the message dispatcher.  It has no dependency on sockets or an async
//! runtime; the agent crate owns all I/O.
//!
//! # Architecture overview (for beginners)
//!
//! A pulse agent talks to one peer using three message kinds:
//!
//! - **Heartbeat** – "I'm alive", sent by the agent on a fixed interval.
//! - **Status** – "I have sent N heartbeats", sent in reply to a probe.
//! - **Error** – an in-band diagnostic produced when a message cannot be
//!   encoded or decoded.
//!
//! Messages are small protobuf-compatible records: each field is a varint tag
//! (`field_number << 3 | wire_type`) followed by a varint or a
//! length-prefixed string.  The [`protocol::wire`] module holds those
//! primitives, [`protocol::codec`] knows the three schemas, and
//! [`protocol::MessageDispatcher`] turns every failure into an
//! [`protocol::ErrorMessage`] so callers only ever inspect a message kind.

pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `pulse_core::Message` instead of `pulse_core::protocol::messages::Message`.
pub use protocol::{
    CodecError, ErrorMessage, HeartbeatMessage, Message, MessageDispatcher, MessageKind,
    StatusMessage,
};
