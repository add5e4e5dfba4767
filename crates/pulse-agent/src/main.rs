//! pulse-agent entry point.
//!
//! Sends a heartbeat to a peer every interval and answers status probes with
//! the number of heartbeats sent so far.
//!
//! # Usage
//!
//! ```text
//! pulse-agent [OPTIONS]
//!
//! Options:
//!   --config <FILE>          TOML config file
//!   --peer-host <HOST>       Peer that receives heartbeats [default: 127.0.0.1]
//!   --peer-port <PORT>       [default: 4000]
//!   --listen-host <HOST>     Status listener bind address [default: 0.0.0.0]
//!   --listen-port <PORT>     [default: 2222]
//!   --advertise-host <HOST>  Host sent in heartbeats [default: listen host]
//!   --identifier <ID>        [default: 1]
//!   --interval <SECS>        Heartbeat interval [default: 60]
//!   --count-policy <POLICY>  attempts | successes [default: attempts]
//!   --io-timeout <SECS>      Bound on connect/read waits [default: none]
//!   --no-greeting            Skip the startup "First Message" heartbeat
//!   --log-level <FILTER>     [default: info]
//!   --log-file <FILE>        Also append logs to this file
//!   --ticks <N>              Stop heartbeating after N ticks
//! ```
//!
//! # Where settings come from
//!
//! Later sources win:
//!
//! 1. built-in defaults;
//! 2. the TOML file named by `--config` / `PULSE_CONFIG`;
//! 3. `PULSE_*` environment variables, including those loaded from `.env`;
//! 4. command-line flags.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use pulse_agent::application::counter::CountPolicy;
use pulse_agent::infrastructure::logging::init_tracing;
use pulse_agent::infrastructure::storage::config::load_config_file;
use pulse_agent::{Agent, AgentConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Dual-role liveness agent.
#[derive(Debug, Parser)]
#[command(
    name = "pulse-agent",
    about = "Periodic heartbeats out, heartbeat-count status replies in",
    version
)]
struct Cli {
    /// TOML configuration file.  Flags and environment variables override it.
    #[arg(long, env = "PULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Host of the peer that receives heartbeats.
    #[arg(long, env = "PULSE_PEER_HOST")]
    peer_host: Option<String>,

    #[arg(long, env = "PULSE_PEER_PORT")]
    peer_port: Option<u16>,

    /// Address the status listener binds to.
    #[arg(long, env = "PULSE_LISTEN_HOST")]
    listen_host: Option<String>,

    #[arg(long, env = "PULSE_LISTEN_PORT")]
    listen_port: Option<u16>,

    /// Host placed in outgoing heartbeats so the peer knows where to probe.
    #[arg(long, env = "PULSE_ADVERTISE_HOST")]
    advertise_host: Option<String>,

    /// Identifier of this agent, carried in every message it sends.
    #[arg(long, env = "PULSE_IDENTIFIER")]
    identifier: Option<u32>,

    /// Heartbeat interval in seconds.
    #[arg(long, env = "PULSE_HEARTBEAT_INTERVAL_SECONDS")]
    interval: Option<u64>,

    /// Count every attempt, or only acknowledged heartbeats.
    #[arg(long, value_enum, env = "PULSE_COUNT_POLICY")]
    count_policy: Option<CountPolicy>,

    /// Bound, in seconds, on connect and read waits.
    #[arg(long, env = "PULSE_IO_TIMEOUT_SECONDS")]
    io_timeout: Option<u64>,

    /// Do not send the startup greeting.
    #[arg(long)]
    no_greeting: bool,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, env = "PULSE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Append log lines to this file as well as the console.
    #[arg(long, env = "PULSE_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Stop heartbeating after this many ticks; status probes are still
    /// answered until Ctrl+C.
    #[arg(long)]
    ticks: Option<u64>,
}

impl Cli {
    /// Builds the effective [`AgentConfig`] and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the result
    /// fails validation.
    fn into_agent_config(&self) -> anyhow::Result<AgentConfig> {
        let mut cfg = match &self.config {
            Some(path) => load_config_file(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => AgentConfig::default(),
        };

        if let Some(v) = &self.peer_host {
            cfg.peer_host = v.clone();
        }
        if let Some(v) = self.peer_port {
            cfg.peer_port = v;
        }
        if let Some(v) = &self.listen_host {
            cfg.listen_host = v.clone();
        }
        if let Some(v) = self.listen_port {
            cfg.listen_port = v;
        }
        if let Some(v) = &self.advertise_host {
            cfg.advertise_host = Some(v.clone());
        }
        if let Some(v) = self.identifier {
            cfg.identifier = v;
        }
        if let Some(v) = self.interval {
            cfg.heartbeat_interval_secs = v;
        }
        if let Some(v) = self.count_policy {
            cfg.count_policy = v;
        }
        if let Some(v) = self.io_timeout {
            cfg.io_timeout_secs = Some(v);
        }
        if self.no_greeting {
            cfg.send_greeting = false;
        }
        if let Some(v) = &self.log_level {
            cfg.log_level = v.clone();
        }
        if let Some(v) = &self.log_file {
            cfg.log_file = Some(v.clone());
        }

        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing `.env` is normal; the variables may come from the real
    // environment instead.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = cli.into_agent_config()?;

    init_tracing(&config.log_level, config.log_file.as_deref())
        .context("failed to initialise logging")?;

    info!(
        peer = %format!("{}:{}", config.peer_host, config.peer_port),
        listen = %format!("{}:{}", config.listen_host, config.listen_port),
        advertise = config.advertise_host(),
        identifier = config.identifier,
        interval_secs = config.heartbeat_interval_secs,
        policy = ?config.count_policy,
        "pulse agent starting"
    );

    let agent = Agent::new(config);

    tokio::select! {
        result = agent.run(cli.ticks) => result?,
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => error!(error = %e, "failed to listen for Ctrl+C"),
        },
    }

    info!("pulse agent stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};

    /// Parses `args` with every `PULSE_*` fallback removed, so the
    /// developer's own environment cannot leak into the result.
    fn parse(args: &[&str]) -> Cli {
        let cmd = Cli::command().mut_args(|arg| arg.env(None::<&'static str>));
        Cli::from_arg_matches(&cmd.get_matches_from(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_unset_flags_keep_defaults() {
        // Arrange
        let defaults = AgentConfig::default();

        // Act
        let cfg = parse(&["pulse-agent"]).into_agent_config().unwrap();

        // Assert
        assert_eq!(cfg.peer_host, defaults.peer_host);
        assert_eq!(cfg.peer_port, defaults.peer_port);
        assert_eq!(cfg.listen_port, defaults.listen_port);
        assert_eq!(cfg.identifier, defaults.identifier);
        assert_eq!(cfg.heartbeat_interval_secs, defaults.heartbeat_interval_secs);
        assert_eq!(cfg.count_policy, defaults.count_policy);
        assert_eq!(cfg.log_file, None);
    }

    #[test]
    fn test_flags_override_defaults() {
        // Arrange
        let cli = parse(&[
            "pulse-agent",
            "--peer-host",
            "10.0.0.2",
            "--peer-port",
            "5000",
            "--identifier",
            "1234",
            "--interval",
            "5",
            "--count-policy",
            "successes",
            "--no-greeting",
        ]);

        // Act
        let cfg = cli.into_agent_config().unwrap();

        // Assert
        assert_eq!(cfg.peer_host, "10.0.0.2");
        assert_eq!(cfg.peer_port, 5000);
        assert_eq!(cfg.identifier, 1234);
        assert_eq!(cfg.heartbeat_interval_secs, 5);
        assert_eq!(cfg.count_policy, CountPolicy::Successes);
        assert!(!cfg.send_greeting);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let cli = parse(&["pulse-agent", "--interval", "0"]);
        let err = cli.into_agent_config().unwrap_err();
        assert!(format!("{err:#}").contains("heartbeat_interval_secs"));
    }

    #[test]
    fn test_ticks_flag_is_parsed() {
        let cli = parse(&["pulse-agent", "--ticks", "3"]);
        assert_eq!(cli.ticks, Some(3));
    }

    #[test]
    fn test_missing_config_file_is_reported_with_path() {
        let cli = parse(&["pulse-agent", "--config", "/nonexistent/pulse.toml"]);
        let err = cli.into_agent_config().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pulse.toml"));
    }

    #[test]
    fn test_flags_override_config_file() {
        // Arrange
        let path = std::env::temp_dir().join(format!("pulse-cli-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "identifier = 7\npeer_port = 4100\n").unwrap();
        let cli = parse(&[
            "pulse-agent",
            "--config",
            path.to_str().unwrap(),
            "--identifier",
            "8",
        ]);

        // Act
        let result = cli.into_agent_config();
        std::fs::remove_file(&path).ok();

        // Assert
        let cfg = result.unwrap();
        assert_eq!(cfg.identifier, 8);
        assert_eq!(cfg.peer_port, 4100);
    }
}
