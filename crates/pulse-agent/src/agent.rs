//! Wires configuration, transport and application services into one agent.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::info;

use crate::application::counter::{CounterReader, HeartbeatCounter};
use crate::application::heartbeat::{Connector, HeartbeatSender, SenderSettings};
use crate::application::scheduler::HeartbeatScheduler;
use crate::application::status::StatusResponder;
use crate::infrastructure::network::{bind_listener, TcpConnector};
use crate::infrastructure::storage::config::AgentConfig;

/// A running heartbeat agent: one scheduler plus one status responder.
pub struct Agent<C: Connector = TcpConnector> {
    config: AgentConfig,
    scheduler: HeartbeatScheduler<C>,
}

impl Agent<TcpConnector> {
    pub fn new(config: AgentConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> Agent<C> {
    pub fn with_connector(config: AgentConfig, connector: C) -> Self {
        let settings = SenderSettings {
            peer_host: config.peer_host.clone(),
            peer_port: config.peer_port,
            advertise_host: config.advertise_host().to_string(),
            listen_port: config.listen_port,
            identifier: config.identifier,
            policy: config.count_policy,
            io_timeout: config.io_timeout(),
        };
        let sender = HeartbeatSender::new(connector, HeartbeatCounter::new(), settings);
        let scheduler = HeartbeatScheduler::new(sender, config.interval());
        Self { config, scheduler }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn counter(&self) -> CounterReader {
        self.scheduler.sender().counter()
    }

    /// Binds the status listener, spawns the responder, and sends the
    /// greeting.
    ///
    /// Returns the bound address and the responder task.
    ///
    /// # Errors
    ///
    /// Fails only if the status listener cannot be bound.
    pub async fn start(&self) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = bind_listener(&self.config.listen_host, self.config.listen_port)
            .await
            .context("failed to start status responder")?;
        let addr = listener
            .local_addr()
            .context("status listener has no local address")?;
        let responder = StatusResponder::new(
            self.counter(),
            self.config.identifier,
            self.config.io_timeout(),
        );
        let handle = tokio::spawn(responder.run(listener));

        if self.config.send_greeting {
            // Failure is already logged by the sender.
            let _ = self.scheduler.sender().send_greeting().await;
        }
        Ok((addr, handle))
    }

    /// Runs the scheduler for `n` iterations.
    pub async fn run_ticks(&self, n: u64) {
        self.scheduler.run_ticks(n).await;
        info!(ticks = n, count = self.counter().get(), "scheduled heartbeats finished");
    }

    /// Runs the agent until the process is stopped.
    ///
    /// With `ticks = Some(n)` the scheduler stops after `n` heartbeats and the
    /// agent keeps answering status probes.
    ///
    /// # Errors
    ///
    /// Fails only if the status listener cannot be bound.
    pub async fn run(&self, ticks: Option<u64>) -> anyhow::Result<()> {
        let (_, responder) = self.start().await?;
        match ticks {
            Some(n) => {
                self.run_ticks(n).await;
                responder.await.context("status responder task failed")?;
            }
            None => self.scheduler.run().await,
        }
        Ok(())
    }
}
