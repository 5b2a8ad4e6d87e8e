//! # heapgrow-core
//!
//! Load harness for watching a Tile38-style geospatial server's heap under
//! sustained writes with randomized TTLs.
//!
//! A run registers a set of geofence hooks, then keeps these going side by side:
//!
//! - **writers**: one connection each, pipelined `SET ... EX ... POINT` batches
//! - **compaction**: `AOFSHRINK` on a fixed period
//! - **stat poller**: `SERVER` / `SERVER EXT` every tick, printed as a live line
//! - **listener** (channel mode, optional): counts delivered notifications
//!
//! They share nothing but [`Metrics`] and the server itself. Failures follow
//! the per-call-site [`ErrorPolicies`]: fatal ones stop the run, degraded ones
//! are counted and the task carries on.
//!
//! ```no_run
//! use heapgrow_core::{Harness, HeapgrowConfig, Shutdown};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = HeapgrowConfig::load()?;
//! config.validate()?;
//! let shutdown = Shutdown::new();
//! let summary = Harness::new(config).run(shutdown).await?;
//! summary.print_report();
//! # Ok(())
//! # }
//! ```

pub mod compaction;
pub mod config;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod notifications;
pub mod resp;
pub mod runner;
pub mod shutdown;
pub mod stats;
pub mod workload;

pub use config::{HeapgrowConfig, HookMode};
pub use error::{ErrorPolicies, ErrorPolicy, HeapgrowError, Result};
pub use metrics::{Metrics, MetricsSnapshot};
pub use runner::Harness;
pub use shutdown::Shutdown;
