//! aggrolog runtime - feed → aggregator + time-bucketed log router
//!
//! Reads feed lines (`<topic> [timestamp] <payload...>`) from stdin, appends
//! every message to per-topic daily logs and reports per-channel means for the
//! watched topics.
//!
//! ## Usage
//!
//! ```bash
//! sensor_sim | cargo run --release --bin aggrolog -- --backend sqlite
//! ```
//!
//! ## Environment Variables
//!
//! - LOG_ROOT - Base directory for topic logs (default: logs)
//! - MAX_DRIFT_SECS - Accepted sender clock drift (default: 300)
//! - CLEANUP_INTERVAL_SECS - Stale log stream sweep period (default: 60)
//! - WATCH_TOPICS - `variable=topic` pairs to aggregate (default: none)
//! - STEP_INTERVAL_MS - Aggregator sampling period (default: 1000)
//! - STEPS_PER_REPORT - Samples per report (default: 60)
//! - REPORT_OUTPUT_PATH - Report file (default: reports/aggregates.jsonl)
//! - ENABLE_LOG_ROUTER - Write topic logs (default: true)
//! - RUST_LOG - Logging level (default: info)

use aggrolog::config::{BackendType, RuntimeConfig};
use aggrolog::ingest::{parse_feed_line, run_ingestion, IngestTargets};
use aggrolog::report::{report_writer_task, ReportRecord, ReportWriter, ReportWriterBackend};
use aggrolog::{AggregationReport, LogRouter, PeriodicAggregator};
use std::io::BufRead;
use tokio::sync::mpsc;

const FEED_CHANNEL_BUFFER: usize = 10_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = RuntimeConfig::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.rust_log))
        .target(env_logger::Target::Stderr)
        .init();

    let backend = RuntimeConfig::parse_backend_from_args();
    let report_path = match backend {
        BackendType::Sqlite if config.report_output_path.extension().map_or(false, |e| e == "jsonl") => {
            config.report_output_path.with_extension("db")
        }
        _ => config.report_output_path.clone(),
    };

    log::info!("🚀 Starting aggrolog");
    log::info!("   Log root: {}", config.log_root.display());
    log::info!("   Log router: {}", if config.enable_log_router { "enabled" } else { "disabled" });
    log::info!("   Max drift: {}s", config.max_drift_secs);
    log::info!("   Watched topics: {}", config.watch_topics.len());
    for watch in &config.watch_topics {
        log::info!("      {} ← {}", watch.variable, watch.topic);
    }
    log::info!(
        "   Report every {} × {}ms → {}",
        config.steps_per_report,
        config.step_interval_ms,
        report_path.display()
    );

    // Report sink
    let writer = ReportWriter::new(backend, &report_path)?;
    log::info!("📊 Backend: {}", writer.backend_type());
    let (report_tx, report_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(report_writer_task(report_rx, writer));

    let mut targets = IngestTargets::new().watch_all(&config.watch_topics);

    // Aggregator
    let aggregator = if config.watch_topics.is_empty() {
        log::warn!("⚠️  WATCH_TOPICS is empty; no reports will be produced");
        drop(report_tx);
        None
    } else {
        let mut aggregator = PeriodicAggregator::new(
            config.aggregator_config(),
            Box::new(move |values: AggregationReport| {
                if report_tx.send(ReportRecord::now(values)).is_err() {
                    log::warn!("⚠️  Report writer gone; dropping report");
                }
            }),
        )?;
        aggregator.start()?;
        targets = targets.with_aggregator(aggregator.handle());
        Some(aggregator)
    };

    // Log router
    let mut cleanup = None;
    let router = if config.enable_log_router {
        let router = LogRouter::new(config.router_config());
        cleanup = Some(router.start_auto_cleanup()?);
        targets = targets.with_router(router.clone());
        Some(router)
    } else {
        None
    };

    // Feed: stdin lines → ingestion. A plain thread, so a pending read
    // never holds up runtime shutdown.
    let (feed_tx, feed_rx) = mpsc::channel(FEED_CHANNEL_BUFFER);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if let Some(event) = parse_feed_line(&line) {
                        if feed_tx.blocking_send(event).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    log::error!("❌ Feed read error: {}", e);
                    return;
                }
            }
        }
        log::info!("📭 Feed input closed");
    });
    let mut ingest_task = tokio::spawn(run_ingestion(feed_rx, targets));

    log::info!("✅ aggrolog running - reading feed from stdin");

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        result = &mut ingest_task => {
            if let Err(e) = result {
                log::error!("❌ Ingestion task failed: {}", e);
            }
            false
        }
    };
    if interrupted {
        log::info!("🛑 Interrupt received, shutting down");
        ingest_task.abort();
        let _ = ingest_task.await;
    }

    if let Some(task) = cleanup.take() {
        task.cancel();
    }
    if let Some(router) = &router {
        router.shutdown().await;
    }

    // Stopping the aggregator releases the report sender, ending the writer
    drop(aggregator);

    match writer_task.await {
        Ok(count) => log::info!("✅ Wrote {} reports", count),
        Err(e) => log::error!("❌ Report writer task failed: {}", e),
    }

    log::info!("👋 aggrolog stopped");
    Ok(())
}
