//! Geofence subscriptions registered before the load starts

use crate::config::{HeapgrowConfig, HookMode, HooksConfig};
use crate::error::Result;
use crate::metrics::Metrics;
use crate::resp::{Command, Connection, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Bounding box `(x, y, x + span, y + span)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fence {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Fence {
    /// Corner at x in [-180, 180), y in [-90, 90)
    pub fn random<R: Rng>(rng: &mut R, span: f64) -> Self {
        let x = rng.gen::<f64>() * 360.0 - 180.0;
        let y = rng.gen::<f64>() * 180.0 - 90.0;
        Self { min_x: x, min_y: y, max_x: x + span, max_y: y + span }
    }
}

/// Registration command for the `index`th subscription
pub fn subscription_command(
    hooks: &HooksConfig,
    collection: &str,
    index: usize,
    fence: &Fence,
) -> Command {
    let cmd = match hooks.mode {
        HookMode::Hook => Command::new("SETHOOK").arg(hooks.name(index)).arg(&hooks.endpoint),
        HookMode::Channel => Command::new("SETCHAN").arg(hooks.name(index)),
    };
    let cmd = cmd.arg("INTERSECTS").arg(collection).arg("DETECT").arg("enter,exit");
    let cmd = match hooks.mode {
        HookMode::Hook => cmd.arg("FENCE"),
        HookMode::Channel => cmd,
    };
    cmd.arg("BOUNDS").arg(fence.min_x).arg(fence.min_y).arg(fence.max_x).arg(fence.max_y)
}

/// Outcome of a provisioning pass
#[derive(Debug, Default, Clone)]
pub struct ProvisionReport {
    /// Names that the server accepted, in registration order
    pub registered: Vec<String>,
    pub failed: usize,
}

/// Register `hooks.count` subscriptions on a dedicated connection
///
/// Under a fatal `provision` policy the first failure is returned; under
/// degrade each failure is counted as a client error and skipped.
pub async fn provision(config: &HeapgrowConfig, metrics: &Metrics) -> Result<ProvisionReport> {
    let hooks = &config.hooks;
    let policy = config.policies.provision;
    let mut report = ProvisionReport::default();
    if hooks.count == 0 {
        return Ok(report);
    }

    let mut conn = match Connection::open(&config.server.addr, config.server.connect_timeout()).await
    {
        Ok(conn) => conn,
        Err(e) if policy.is_fatal() => return Err(e),
        Err(e) => {
            log::warn!("Hook provisioning skipped, cannot connect: {}", e);
            metrics.record_client_error();
            report.failed = hooks.count;
            return Ok(report);
        }
    };

    let mut rng = StdRng::from_entropy();
    for index in 0..hooks.count {
        let fence = Fence::random(&mut rng, hooks.span);
        let cmd = subscription_command(hooks, &config.workload.collection, index, &fence);
        // `:1` for a new or changed hook, `:0` when unchanged; only error replies fail.
        match conn.query(cmd).await {
            Ok(_) => report.registered.push(hooks.name(index)),
            Err(e) if policy.is_fatal() => {
                log::error!("Registering {} failed: {}", hooks.name(index), e);
                return Err(e);
            }
            Err(e) => {
                log::warn!("Registering {} failed: {}", hooks.name(index), e);
                metrics.record_client_error();
                report.failed += 1;
            }
        }
    }

    if let Err(e) = conn.close().await {
        log::debug!("Closing provisioning connection: {}", e);
    }
    log::info!(
        "Provisioned {} {}s on {} ({} failed)",
        report.registered.len(),
        mode_label(hooks.mode),
        config.workload.collection,
        report.failed
    );
    Ok(report)
}

/// Delete every subscription under the active prefix; returns how many the server removed
pub async fn cleanup(config: &HeapgrowConfig) -> Result<i64> {
    let hooks = &config.hooks;
    let name = match hooks.mode {
        HookMode::Hook => "PDELHOOK",
        HookMode::Channel => "PDELCHAN",
    };
    let mut conn = Connection::open(&config.server.addr, config.server.connect_timeout()).await?;
    let reply = conn.query(Command::new(name).arg(format!("{}:*", hooks.prefix()))).await?;
    let removed = match reply {
        Value::Integer(n) => n,
        _ => 0,
    };
    log::info!("Removed {} {}s matching {}:*", removed, mode_label(hooks.mode), hooks.prefix());
    Ok(removed)
}

fn mode_label(mode: HookMode) -> &'static str {
    match mode {
        HookMode::Hook => "hook",
        HookMode::Channel => "channel",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10_000 {
            let f = Fence::random(&mut rng, 5.0);
            assert!((-180.0..180.0).contains(&f.min_x));
            assert!((-90.0..90.0).contains(&f.min_y));
            assert!(f.min_x <= f.max_x && f.min_y <= f.max_y);
            assert!((f.max_x - f.min_x - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn hook_mode_targets_endpoint_with_fence() {
        let hooks = HooksConfig::default();
        let fence = Fence { min_x: 1.0, min_y: 2.0, max_x: 6.0, max_y: 7.0 };
        let cmd = subscription_command(&hooks, "__tmpkey__", 4, &fence);
        assert_eq!(
            cmd.to_string(),
            format!(
                "SETHOOK __tmphook__:4 {} INTERSECTS __tmpkey__ DETECT enter,exit FENCE BOUNDS 1 2 6 7",
                hooks.endpoint
            )
        );
    }

    #[test]
    fn channel_mode_has_no_endpoint() {
        let hooks = HooksConfig { mode: HookMode::Channel, ..HooksConfig::default() };
        let fence = Fence { min_x: -10.5, min_y: 0.0, max_x: -5.5, max_y: 5.0 };
        let cmd = subscription_command(&hooks, "fleet", 0, &fence);
        assert_eq!(
            cmd.to_string(),
            "SETCHAN __tmpchan__:0 INTERSECTS fleet DETECT enter,exit BOUNDS -10.5 0 -5.5 5"
        );
    }
}
