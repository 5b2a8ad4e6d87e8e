use super::{Reporter, ServerStats};
use crate::config::HeapgrowConfig;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::resp::{Command, Connection};
use crate::shutdown::Shutdown;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::MissedTickBehavior;

type StatMaps = (HashMap<String, String>, HashMap<String, String>);

/// Poll `SERVER` and `SERVER EXT` every tick and feed the reporter
///
/// Returns the high-heap watermark once shutdown is triggered.
pub async fn run_poller<W: Write>(
    config: Arc<HeapgrowConfig>,
    metrics: Arc<Metrics>,
    shutdown: Shutdown,
    out: W,
) -> Result<u64> {
    let policies = config.policies;
    let mut reporter = Reporter::new(out, config.monitor.summary_interval(), Instant::now());
    let mut slot: Option<Connection> = None;
    let mut ticker = tokio::time::interval(config.monitor.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.triggered() => break,
        }

        let polled = tokio::select! {
            res = poll_once(&mut slot, &config) => res,
            _ = shutdown.triggered() => break,
        };

        let (server, ext) = match polled {
            Ok(maps) => maps,
            Err(e) if policies.stats_query.is_fatal() => {
                log::error!("Stat query failed: {}", e);
                return Err(e);
            }
            Err(e) => {
                log::warn!("Stat query failed: {}", e);
                metrics.record_client_error();
                continue;
            }
        };

        let stats = ServerStats::from_maps(&server, &ext, policies.stats_fields)?;
        reporter.observe(&stats, metrics.client_errors(), Instant::now())?;
        metrics.publish_high_heap(reporter.high_heap());
    }

    reporter.finish()?;
    Ok(reporter.high_heap())
}

async fn poll_once(slot: &mut Option<Connection>, config: &HeapgrowConfig) -> Result<StatMaps> {
    let mut conn =
        Connection::take_or_open(slot, &config.server.addr, config.server.connect_timeout()).await?;
    let server = conn.query(Command::new("SERVER")).await?.into_string_map()?;
    let ext = conn.query(Command::new("SERVER").arg("EXT")).await?.into_string_map()?;
    *slot = Some(conn);
    Ok((server, ext))
}
