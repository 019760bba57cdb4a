mod input;
mod report;
mod source;
mod worker;

use lumacheck_common::config::Config;
use lumacheck_metrics::sharpness::{CpuBackend, SharpnessEstimator};
use lumacheck_metrics::{BrightnessThreshold, CapturePolicy};
use report::Reporter;
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use worker::FrameWorker;

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let cli_paths: Vec<PathBuf> = args.map(PathBuf::from).collect();

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .with_writer(std::io::stderr)
        .init();

    let paths = if cli_paths.is_empty() {
        config.source.paths.clone()
    } else {
        cli_paths
    };
    if paths.is_empty() {
        error!("no frames to process: pass image paths or set source.paths");
        std::process::exit(1);
    }

    info!(
        frames = paths.len(),
        threshold = config.brightness.threshold,
        kernel = ?config.sharpness.kernel,
        min_variance = ?config.sharpness.min_variance,
        capture_on = ?config.monitor.capture_on_frames,
        "starting lumacheck monitor"
    );

    let mut backend = CpuBackend::new();
    if let Some(limit) = config.sharpness.memory_limit_bytes {
        backend = backend.with_memory_limit(limit);
    }
    let estimator = SharpnessEstimator::new(backend).with_kernel(config.sharpness.kernel.into());
    let policy = CapturePolicy::new(config.sharpness.min_variance);

    // Each line on stdin sets a new level for the following frames.
    let (threshold_tx, threshold_rx) =
        watch::channel(BrightnessThreshold::new(config.brightness.threshold));
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        input::follow_thresholds(stdin.lock(), &threshold_tx)
    });

    let (job_tx, job_rx) = mpsc::channel(config.monitor.channel_capacity);
    let (reading_tx, reading_rx) = mpsc::channel(config.monitor.channel_capacity);

    let worker = FrameWorker::new(estimator, policy, threshold_rx);
    let worker_task = tokio::spawn(worker.run(job_rx, reading_tx));
    let report_task = tokio::spawn(Reporter::new(config.output.json).run(reading_rx));

    let sent = source::play(paths, &config.monitor.capture_on_frames, job_tx).await;

    let processed = match worker_task.await {
        Ok(n) => n,
        Err(e) => {
            error!(error = %e, "frame worker panicked");
            std::process::exit(1);
        }
    };

    let summary = match report_task.await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "reporter panicked");
            std::process::exit(1);
        }
    };

    info!(
        sent,
        processed,
        too_dark = summary.too_dark,
        captures = summary.captures,
        retakes = summary.retakes,
        "monitor finished"
    );
}
