//! Wires provisioning and the background tasks into one supervised run

use crate::compaction::run_compaction;
use crate::config::{HeapgrowConfig, HookMode};
use crate::error::{HeapgrowError, Result};
use crate::hooks::{self, ProvisionReport};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::notifications::run_listener;
use crate::shutdown::Shutdown;
use crate::stats::run_poller;
use crate::workload::run_writer;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};

/// A configured load run
///
/// `run` provisions hooks, then keeps the writers, the compaction trigger,
/// the stat poller and (optionally) the notification listener going until
/// the [`Shutdown`] fires or one of them fails fatally.
pub struct Harness {
    config: Arc<HeapgrowConfig>,
    metrics: Arc<Metrics>,
}

impl Harness {
    pub fn new(config: HeapgrowConfig) -> Self {
        Self { config: Arc::new(config), metrics: Arc::new(Metrics::new()) }
    }

    pub fn config(&self) -> &HeapgrowConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Register the configured hooks or channels and stop
    pub async fn provision(&self) -> Result<ProvisionReport> {
        hooks::provision(&self.config, &self.metrics).await
    }

    /// Full load run; the error, if any, is the first fatal task failure
    pub async fn run(&self, shutdown: Shutdown) -> Result<MetricsSnapshot> {
        let report = tokio::select! {
            res = self.provision() => res?,
            _ = shutdown.triggered() => return Ok(self.metrics.snapshot()),
        };

        let mut tasks = JoinSet::new();
        tasks.spawn(run_compaction(
            Arc::clone(&self.config),
            Arc::clone(&self.metrics),
            shutdown.clone(),
        ));
        self.spawn_poller(&mut tasks, &shutdown);
        for worker_id in 0..self.config.workload.clients {
            tasks.spawn(run_writer(
                worker_id,
                Arc::clone(&self.config),
                Arc::clone(&self.metrics),
                shutdown.clone(),
            ));
        }
        if self.config.hooks.subscribe && self.config.hooks.mode == HookMode::Channel {
            tasks.spawn(run_listener(
                Arc::clone(&self.config),
                report.registered,
                Arc::clone(&self.metrics),
                shutdown.clone(),
            ));
        }
        log::info!(
            "Load started: {} writers, pipeline {}, TTL {}..{}s against {}",
            self.config.workload.clients,
            self.config.workload.pipeline,
            self.config.workload.min_ttl,
            self.config.workload.max_ttl,
            self.config.server.addr
        );

        let outcome = self.supervise(tasks, &shutdown).await;

        if outcome.is_ok() && self.config.hooks.cleanup_on_exit {
            if let Err(e) = hooks::cleanup(&self.config).await {
                log::warn!("Hook cleanup failed: {}", e);
            }
        }
        outcome.map(|()| self.metrics.snapshot())
    }

    /// Stat poller and reporter only, no load
    pub async fn watch(&self, shutdown: Shutdown) -> Result<MetricsSnapshot> {
        let mut tasks = JoinSet::new();
        self.spawn_poller(&mut tasks, &shutdown);
        self.supervise(tasks, &shutdown).await?;
        Ok(self.metrics.snapshot())
    }

    fn spawn_poller(&self, tasks: &mut JoinSet<Result<()>>, shutdown: &Shutdown) {
        let config = Arc::clone(&self.config);
        let metrics = Arc::clone(&self.metrics);
        let shutdown = shutdown.clone();
        tasks.spawn(async move {
            let high = run_poller(config, metrics, shutdown, std::io::stdout()).await?;
            log::debug!("Stat poller stopped, high heap {} bytes", high);
            Ok(())
        });
    }

    /// Wait for shutdown or the first fatal error, then drain within the grace period
    async fn supervise(&self, mut tasks: JoinSet<Result<()>>, shutdown: &Shutdown) -> Result<()> {
        let mut first_error: Option<HeapgrowError> = None;

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(res) => {
                        if let Err(e) = flatten(res) {
                            log::error!("Fatal: {}; stopping run", e);
                            first_error = Some(e);
                            break;
                        }
                    }
                },
                _ = shutdown.triggered() => break,
            }
        }
        shutdown.trigger();

        let deadline = tokio::time::Instant::now() + self.config.monitor.shutdown_grace();
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(res)) => {
                    if let Err(e) = flatten(res) {
                        if first_error.is_none() {
                            first_error = Some(e);
                        } else {
                            log::debug!("Further task error during shutdown: {}", e);
                        }
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    log::warn!("Shutdown grace expired, aborting {} task(s)", tasks.len());
                    tasks.abort_all();
                    break;
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn flatten(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    joined?
}
