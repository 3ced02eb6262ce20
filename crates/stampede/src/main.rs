mod config;
mod target;

use clap::Parser;
use config::Config;
use stampede_swarm::Swarm;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use target::HttpTarget;
use tracing_subscriber::EnvFilter;

/// Stampede load generator: swarms of virtual users for metric ingestion services.
#[derive(Parser)]
#[command(name = "stampede")]
struct Args {
    /// Base URL of the target service
    #[arg(long)]
    target_url: Option<String>,

    /// Total virtual users, rescaling the configured profile mix
    #[arg(long)]
    users: Option<usize>,

    /// Users spawned per second during ramp-up
    #[arg(long)]
    ramp_rate: Option<f64>,

    /// Stop after this many seconds (omit to run until interrupted)
    #[arg(long)]
    run_time_secs: Option<u64>,

    /// Seconds granted to in-flight requests once a stop is requested
    #[arg(long)]
    grace_secs: Option<u64>,

    /// Base RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = if let Some(path) = &args.config {
        Config::load(path)
            .unwrap_or_else(|e| panic!("failed to load config {}: {e}", path.display()))
    } else if Path::new("stampede.toml").exists() {
        match Config::load(Path::new("stampede.toml")) {
            Ok(c) => {
                tracing::info!("loaded config from stampede.toml");
                c
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load stampede.toml, using defaults");
                Config::default_config()
            }
        }
    } else {
        tracing::info!("no stampede.toml found, using defaults");
        Config::default_config()
    };

    // CLI flags win over the file
    if let Some(url) = args.target_url {
        config.target_url = url;
    }
    if let Some(users) = args.users {
        config.scale_users(users);
    }
    if let Some(rate) = args.ramp_rate {
        config.ramp_rate = rate;
    }
    if let Some(secs) = args.run_time_secs {
        config.run_duration_secs = Some(secs);
    }
    if let Some(secs) = args.grace_secs {
        config.grace_secs = secs;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    let seed = config.seed.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_nanos() as u64
    });

    let swarm_config = config
        .swarm_config(seed)
        .unwrap_or_else(|e| panic!("invalid configuration: {e}"));

    tracing::info!(
        target = %config.target_url,
        users = config.total_users(),
        profiles = config.profiles.len(),
        ramp_rate = config.ramp_rate,
        run_time_secs = ?config.run_duration_secs,
        seed,
        "stampede starting"
    );

    let target = Arc::new(HttpTarget::new(&config.target_url));
    let started = std::time::Instant::now();

    let swarm = Swarm::start(swarm_config, target.clone())
        .unwrap_or_else(|e| panic!("invalid configuration: {e}"));

    // Stop the swarm on Ctrl+C / SIGTERM
    let signal_handle = swarm.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received, stopping swarm...");
        signal_handle.stop();
    });

    // Log throughput every 5 seconds
    let stats_target = Arc::clone(&target);
    let stats_handle = swarm.handle();
    tokio::spawn(async move {
        let mut prev = 0u64;
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            let stats = stats_target.stats();
            let delta = stats.requests - prev;
            prev = stats.requests;
            tracing::info!(
                active_users = stats_handle.active_users(),
                total = stats.requests,
                failed = stats.failures,
                rps = format!("{:.0}", delta as f64 / 5.0),
                p50_ms = format!("{:.1}", stats.p50_ms),
                p99_ms = format!("{:.1}", stats.p99_ms),
                "throughput"
            );
        }
    });

    swarm.wait().await;

    let stats = target.stats();
    tracing::info!(
        total = stats.requests,
        failed = stats.failures,
        p50_ms = format!("{:.1}", stats.p50_ms),
        p95_ms = format!("{:.1}", stats.p95_ms),
        p99_ms = format!("{:.1}", stats.p99_ms),
        seconds = format!("{:.1}", started.elapsed().as_secs_f64()),
        "run complete"
    );
}

/// Listen for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
