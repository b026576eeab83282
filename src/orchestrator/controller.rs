use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::metrics::MetricsSnapshot;
use crate::models::{ActivityRecord, ActivityStatistics, FusedResult, StabilizedActivity};

use super::engine::EngineCore;
use super::events::{EngineCommand, EngineEvent};
use super::loop_worker::engine_loop;
use super::wiring::Collaborators;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

/// Host-facing handle to the engine task.
///
/// ```ignore
/// let mut engine = EngineController::new(config, collaborators)?;
/// engine.start()?;
/// let now = engine.force_immediate_cycle().await?;
/// engine.stop().await?;
/// ```
pub struct EngineController {
    config: EngineConfig,
    collaborators: Collaborators,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    command_tx: Option<mpsc::Sender<EngineCommand>>,
    current_tx: Arc<watch::Sender<Option<StabilizedActivity>>>,
    current_rx: watch::Receiver<Option<StabilizedActivity>>,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl EngineController {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate().context("invalid engine configuration")?;
        collaborators
            .validate()
            .context("invalid detector wiring")?;

        let (current_tx, current_rx) = watch::channel(None);
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);

        Ok(Self {
            config,
            collaborators,
            handle: None,
            cancel_token: None,
            command_tx: None,
            current_tx: Arc::new(current_tx),
            current_rx,
            events_tx,
        })
    }

    /// Spawn the engine task. Must be called inside a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            bail!("engine already running");
        }

        // a fresh engine starts without a committed activity
        self.current_tx.send_replace(None);

        let cancel_token = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let core = EngineCore::new(
            self.config.clone(),
            self.collaborators.clone(),
            Arc::clone(&self.current_tx),
            self.events_tx.clone(),
        );

        let handle = tokio::spawn(engine_loop(core, command_rx, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.command_tx = Some(command_tx);
        log_info!(
            "engine started with {} detector(s)",
            self.collaborators.detector_kinds().len()
        );
        Ok(())
    }

    /// Cancel the engine task and wait for it. In-flight detector calls are
    /// dropped. Safe to call when not running.
    pub async fn stop(&mut self) -> Result<()> {
        self.command_tx = None;

        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle.await.context("engine task failed to join")?;
            log_info!("engine stopped");
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Last committed activity, read without a round-trip to the engine.
    pub fn current_activity(&self) -> Option<StabilizedActivity> {
        self.current_rx.borrow().clone()
    }

    /// Receiver that wakes on every commit.
    pub fn watch_activity(&self) -> watch::Receiver<Option<StabilizedActivity>> {
        self.current_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    /// Run one cycle now, with every family treated as due.
    pub async fn force_immediate_cycle(&self) -> Result<Option<StabilizedActivity>> {
        self.request(|reply| EngineCommand::ForceCycle { reply }).await
    }

    /// Fused results at or after `since`, most recent first.
    pub async fn history(&self, since: Option<DateTime<Utc>>, limit: usize) -> Result<Vec<FusedResult>> {
        self.request(|reply| EngineCommand::History { since, limit, reply })
            .await
    }

    /// Committed activities at or after `since`, most recent first.
    pub async fn activity_history(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>> {
        self.request(|reply| EngineCommand::ActivityHistory { since, limit, reply })
            .await
    }

    /// Summary of the fused results in the trailing `window`.
    pub async fn statistics(&self, window: chrono::Duration) -> Result<ActivityStatistics> {
        self.request(|reply| EngineCommand::Statistics { window, reply })
            .await
    }

    /// Returns how many history entries were removed.
    pub async fn clear_history_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.request(|reply| EngineCommand::ClearHistoryOlderThan { cutoff, reply })
            .await
    }

    pub async fn metrics(&self) -> Result<MetricsSnapshot> {
        self.request(|reply| EngineCommand::Metrics { reply }).await
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand) -> Result<T> {
        let sender = self
            .command_tx
            .as_ref()
            .ok_or_else(|| anyhow!("engine is not running"))?;
        let (reply_tx, reply_rx) = oneshot::channel();

        sender
            .send(build(reply_tx))
            .await
            .map_err(|_| anyhow!("engine task has stopped"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("engine task terminated before replying"))
    }
}

impl Drop for EngineController {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}
