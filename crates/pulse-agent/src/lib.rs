//! pulse-agent library crate.
//!
//! A pulse agent does two things at once:
//!
//! - every `interval` it connects to its peer and sends a heartbeat;
//! - it listens for status probes and answers with how many heartbeats it
//!   has sent so far.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────── pulse-agent ────────────────────┐
//!   peer ◀─────── │ HeartbeatScheduler → HeartbeatSender ─┐             │
//!                 │                                       │ counter     │
//!   prober ─────▶ │ StatusResponder  ◀── CounterReader ───┘             │
//!                 └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Layer rules
//!
//! - `application` depends on `pulse-core` and on `tokio`'s I/O traits only.
//!   Sockets are reached through the [`application::heartbeat::Connector`]
//!   trait, which keeps every exchange testable with scripted streams.
//! - `infrastructure` provides TCP, configuration and logging.
//! - [`agent`] wires the two together.

/// Application layer: heartbeat sender, status responder, scheduler.
pub mod application;

/// Infrastructure layer: TCP adapters, config file, logging.
pub mod infrastructure;

/// Top-level wiring.
pub mod agent;

pub use agent::Agent;
pub use infrastructure::storage::config::AgentConfig;
