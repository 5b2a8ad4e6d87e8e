use super::{IdGenerator, RecordSampler};
use crate::config::HeapgrowConfig;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::resp::Connection;
use crate::shutdown::Shutdown;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

/// Capped exponential reconnect delay
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max, current: initial }
    }

    /// Delay to wait now; doubles the next one up to the cap
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// One write worker: owns its connection and RNG, runs until shutdown or a fatal error
pub async fn run_writer(
    worker_id: usize,
    config: Arc<HeapgrowConfig>,
    metrics: Arc<Metrics>,
    shutdown: Shutdown,
) -> Result<()> {
    let workload = &config.workload;
    let policies = config.policies;
    let sampler = RecordSampler::new(workload.min_ttl, workload.max_ttl);
    let mut ids = IdGenerator::new(StdRng::from_entropy());
    let mut backoff = Backoff::new(workload.reconnect_backoff(), workload.max_backoff());

    log::debug!("Writer {} starting against {}", worker_id, config.server.addr);

    while !shutdown.is_triggered() {
        let opened = tokio::select! {
            res = Connection::open(&config.server.addr, config.server.connect_timeout()) => res,
            _ = shutdown.triggered() => break,
        };

        let mut conn = match opened {
            Ok(conn) => {
                backoff.reset();
                conn
            }
            Err(e) => {
                if policies.write_connect.is_fatal() {
                    log::error!("Writer {}: connect failed: {}", worker_id, e);
                    return Err(e);
                }
                metrics.record_client_error();
                let delay = backoff.next_delay();
                log::warn!("Writer {}: connect failed: {} (retry in {:?})", worker_id, e, delay);
                if !shutdown.sleep(delay).await {
                    break;
                }
                continue;
            }
        };

        let result = tokio::select! {
            res = write_batches(
                &mut conn,
                &mut ids,
                &sampler,
                workload.pipeline,
                &workload.collection,
                &metrics,
            ) => res,
            _ = shutdown.triggered() => break,
        };

        if let Err(e) = result {
            if policies.write_command.is_fatal() {
                log::error!("Writer {}: write failed: {}", worker_id, e);
                return Err(e);
            }
            metrics.record_client_error();
            let delay = backoff.next_delay();
            log::warn!("Writer {}: write failed: {} (reconnect in {:?})", worker_id, e, delay);
            if !shutdown.sleep(delay).await {
                break;
            }
        }
    }

    log::debug!("Writer {} stopped", worker_id);
    Ok(())
}

/// Pipelined write loop; only returns on error
async fn write_batches<R: Rng>(
    conn: &mut Connection,
    ids: &mut IdGenerator<R>,
    sampler: &RecordSampler,
    pipeline: usize,
    collection: &str,
    metrics: &Metrics,
) -> Result<()> {
    loop {
        for _ in 0..pipeline {
            let id = ids.next_id();
            let record = sampler.sample(ids.rng_mut(), id);
            conn.send(record.to_command(collection)).await?;
            metrics.record_write();
        }
        conn.flush().await?;
        for _ in 0..pipeline {
            conn.receive().await?;
        }
        log::trace!("{}: batch of {} acknowledged", conn.addr(), pipeline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_to_cap_and_resets() {
        let mut b = Backoff::new(Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(b.next_delay(), Duration::from_millis(100));
        assert_eq!(b.next_delay(), Duration::from_millis(200));
        assert_eq!(b.next_delay(), Duration::from_millis(350));
        assert_eq!(b.next_delay(), Duration::from_millis(350));
        b.reset();
        assert_eq!(b.next_delay(), Duration::from_millis(100));
    }
}
