//! heapgrow: sustained TTL write load with a live heap readout.
//!
//! ```bash
//! # Full run: 100 hooks, then writes + AOFSHRINK + live stats until Ctrl+C
//! heapgrow run
//!
//! # 50 writers, 10-deep pipelines, TTLs between 10 and 60 seconds, for 10 minutes
//! heapgrow run --clients 50 --pipeline 10 --min-ttl 10 --max-ttl 60 --duration 600
//!
//! # Only register hooks / only watch the stats / show the effective config
//! heapgrow hooks --hook-mode channel
//! heapgrow watch
//! heapgrow config
//! ```
//!
//! Settings come from `heapgrow.toml` (or `--config`), then `HG_*` environment
//! variables, then the flags below.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use heapgrow_core::config::{HeapgrowConfig, DEFAULT_CONFIG_FILE};
use heapgrow_core::{Harness, HookMode, MetricsSnapshot, Shutdown};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "heapgrow",
    about = "Heap-growth load harness for Tile38-style geospatial servers",
    version
)]
struct Cli {
    /// TOML config file (default: ./heapgrow.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision hooks, then write, compact and report until stopped
    Run {
        #[command(flatten)]
        overrides: Overrides,
        /// Stop after this many seconds instead of waiting for Ctrl+C
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Register the hooks or channels and exit
    Hooks {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Only poll and print server stats
    Watch {
        #[command(flatten)]
        overrides: Overrides,
        /// Stop after this many seconds instead of waiting for Ctrl+C
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Highest-priority settings, applied over file and environment
#[derive(Args)]
struct Overrides {
    /// Server address (host:port)
    #[arg(short, long)]
    addr: Option<String>,
    /// Concurrent writer connections
    #[arg(short = 'j', long)]
    clients: Option<usize>,
    /// Writes per pipelined batch
    #[arg(short, long)]
    pipeline: Option<usize>,
    /// Minimum TTL in seconds
    #[arg(long)]
    min_ttl: Option<f64>,
    /// Maximum TTL in seconds
    #[arg(long)]
    max_ttl: Option<f64>,
    /// Number of geofence subscriptions to register
    #[arg(long)]
    hooks: Option<usize>,
    /// Subscription kind
    #[arg(long, value_enum)]
    hook_mode: Option<HookMode>,
    /// Log filter when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut HeapgrowConfig) {
        if let Some(addr) = self.addr {
            config.server.addr = addr;
        }
        if let Some(n) = self.clients {
            config.workload.clients = n;
        }
        if let Some(n) = self.pipeline {
            config.workload.pipeline = n;
        }
        if let Some(t) = self.min_ttl {
            config.workload.min_ttl = t;
        }
        if let Some(t) = self.max_ttl {
            config.workload.max_ttl = t;
        }
        if let Some(n) = self.hooks {
            config.hooks.count = n;
        }
        if let Some(mode) = self.hook_mode {
            config.hooks.mode = mode;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

fn load_config(path: Option<PathBuf>, overrides: Overrides) -> Result<HeapgrowConfig> {
    let mut config = match path {
        Some(path) => {
            if !path.exists() {
                bail!("Config file {} not found", path.display());
            }
            HeapgrowConfig::load_from(&path)?
        }
        None => HeapgrowConfig::load_from(DEFAULT_CONFIG_FILE)?,
    };
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

/// Shutdown wired to Ctrl+C and, when given, a run deadline
fn shutdown_on_signal(duration: Option<u64>) -> Shutdown {
    let shutdown = Shutdown::new();

    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("Ctrl+C received, stopping"),
            Err(e) => log::error!("Cannot listen for Ctrl+C: {}", e),
        }
        on_signal.trigger();
    });

    if let Some(secs) = duration {
        let on_deadline = shutdown.clone();
        tokio::spawn(async move {
            if on_deadline.sleep(Duration::from_secs(secs)).await {
                log::info!("Run duration of {}s reached, stopping", secs);
                on_deadline.trigger();
            }
        });
    }
    shutdown
}

fn print_banner(config: &HeapgrowConfig) {
    println!("═══════════════════════════════════════════════════════════════");
    println!("  HEAPGROW");
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Server:       {}", config.server.addr);
    println!("  Writers:      {} (pipeline {})", config.workload.clients, config.workload.pipeline);
    println!("  TTL:          {}s .. {}s", config.workload.min_ttl, config.workload.max_ttl);
    println!("  Hooks:        {} ({:?})", config.hooks.count, config.hooks.mode);
    println!("  Compaction:   every {:?}", config.monitor.compaction_interval());
    println!("═══════════════════════════════════════════════════════════════");
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { overrides, duration } => {
            let config = load_config(cli.config, overrides)?;
            init_logging(&config.logging.level);
            print_banner(&config);
            let harness = Harness::new(config);
            let result = harness.run(shutdown_on_signal(duration)).await;
            finish(&harness, result)
        }
        Commands::Hooks { overrides } => {
            let config = load_config(cli.config, overrides)?;
            init_logging(&config.logging.level);
            let harness = Harness::new(config);
            let report = harness.provision().await.context("Hook provisioning failed")?;
            println!(
                "Registered {} of {} {:?} subscriptions ({} failed)",
                report.registered.len(),
                harness.config().hooks.count,
                harness.config().hooks.mode,
                report.failed
            );
            Ok(())
        }
        Commands::Watch { overrides, duration } => {
            let config = load_config(cli.config, overrides)?;
            init_logging(&config.logging.level);
            let harness = Harness::new(config);
            let result = harness.watch(shutdown_on_signal(duration)).await;
            finish(&harness, result)
        }
        Commands::Config { overrides } => {
            let config = load_config(cli.config, overrides)?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Print the run report either way; a fatal error still fails the process
fn finish(harness: &Harness, result: heapgrow_core::Result<MetricsSnapshot>) -> Result<()> {
    match result {
        Ok(summary) => {
            summary.print_report();
            Ok(())
        }
        Err(e) => {
            harness.metrics().snapshot().print_report();
            Err(e).context("Run aborted")
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
