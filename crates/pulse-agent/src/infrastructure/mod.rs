//! Infrastructure layer: OS-facing adapters.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `pulse_core`, but the application layer never imports it.
//!
//! - **`network`** – `TcpConnector` and the status listener bind.
//! - **`storage`** – `AgentConfig` and the TOML config file.
//! - **`logging`** – tracing subscriber with optional append-mode log file.

pub mod logging;
pub mod network;
pub mod storage;
