//! Periodic AOFSHRINK on a dedicated connection

use crate::config::HeapgrowConfig;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::resp::{Command, Connection};
use crate::shutdown::Shutdown;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;

/// Issue one compaction per interval, the first immediately
pub async fn run_compaction(
    config: Arc<HeapgrowConfig>,
    metrics: Arc<Metrics>,
    shutdown: Shutdown,
) -> Result<()> {
    let policy = config.policies.compaction;
    let mut slot: Option<Connection> = None;
    let mut ticker = tokio::time::interval(config.monitor.compaction_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.triggered() => break,
        }

        let result = tokio::select! {
            res = shrink_once(&mut slot, &config) => res,
            _ = shutdown.triggered() => break,
        };

        match result {
            Ok(()) => {
                metrics.record_compaction();
                log::debug!("AOFSHRINK #{} issued", metrics.compactions());
            }
            Err(e) if policy.is_fatal() => {
                log::error!("AOFSHRINK failed: {}", e);
                return Err(e);
            }
            Err(e) => {
                log::warn!("AOFSHRINK failed: {}", e);
                metrics.record_client_error();
            }
        }
    }
    Ok(())
}

async fn shrink_once(slot: &mut Option<Connection>, config: &HeapgrowConfig) -> Result<()> {
    let mut conn =
        Connection::take_or_open(slot, &config.server.addr, config.server.connect_timeout()).await?;
    conn.query_ok(Command::new("AOFSHRINK")).await?;
    *slot = Some(conn);
    Ok(())
}
