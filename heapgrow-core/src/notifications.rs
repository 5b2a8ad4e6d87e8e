//! Counts geofence notifications delivered on the provisioned channels

use crate::config::HeapgrowConfig;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::resp::{Command, Connection, Value};
use crate::shutdown::Shutdown;
use crate::workload::Backoff;
use std::sync::Arc;

/// Subscribe to `channels` and bump the notification counter per message
pub async fn run_listener(
    config: Arc<HeapgrowConfig>,
    channels: Vec<String>,
    metrics: Arc<Metrics>,
    shutdown: Shutdown,
) -> Result<()> {
    if channels.is_empty() {
        return Ok(());
    }
    let policy = config.policies.subscribe;
    let mut backoff =
        Backoff::new(config.workload.reconnect_backoff(), config.workload.max_backoff());

    while !shutdown.is_triggered() {
        let result = tokio::select! {
            res = listen(&config, &channels, &metrics, &mut backoff) => res,
            _ = shutdown.triggered() => break,
        };
        let Err(e) = result else {
            continue;
        };
        if policy.is_fatal() {
            log::error!("Notification listener failed: {}", e);
            return Err(e);
        }
        metrics.record_client_error();
        let delay = backoff.next_delay();
        log::warn!("Notification listener failed: {} (retry in {:?})", e, delay);
        if !shutdown.sleep(delay).await {
            break;
        }
    }
    Ok(())
}

async fn listen(
    config: &HeapgrowConfig,
    channels: &[String],
    metrics: &Metrics,
    backoff: &mut Backoff,
) -> Result<()> {
    let mut conn = Connection::open(&config.server.addr, config.server.connect_timeout()).await?;
    let cmd = channels.iter().fold(Command::new("SUBSCRIBE"), |cmd, ch| cmd.arg(ch));
    conn.send(cmd).await?;
    conn.flush().await?;
    backoff.reset();
    log::info!("Listening for notifications on {} channels", channels.len());

    loop {
        let reply = conn.receive().await?;
        match push_kind(&reply).as_deref() {
            Some("message") => metrics.record_notification(),
            Some("subscribe") => log::trace!("Subscription confirmed: {}", reply),
            _ => log::debug!("Ignoring unexpected push {}", reply),
        }
    }
}

/// First element of a pushed array, e.g. `message` or `subscribe`
fn push_kind(reply: &Value) -> Option<String> {
    match reply {
        Value::Array(Some(items)) => items.first().and_then(Value::as_text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_message_pushes() {
        let push = Value::Array(Some(vec![
            Value::bulk("message"),
            Value::bulk("__tmpchan__:1"),
            Value::bulk("{\"detect\":\"enter\"}"),
        ]));
        assert_eq!(push_kind(&push).as_deref(), Some("message"));
        assert_eq!(push_kind(&Value::Simple("OK".into())), None);
        assert_eq!(push_kind(&Value::Array(Some(vec![]))), None);
    }
}
