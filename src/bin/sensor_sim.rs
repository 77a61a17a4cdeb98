//! Sensor simulator - synthetic feed for local testing
//!
//! Prints `<topic> <value>` feed lines to stdout for a set of random-walk
//! sensors. Pipe into `aggrolog`.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin sensor_sim -- --node AA:BB:CC:DD:EE:FF --interval-ms 2000
//! ```
//!
//! ## Environment Variables
//!
//! - SIM_NODE_ID - Node id prefix for topics (default: AA:BB:CC:DD:EE:FF)
//! - SIM_READ_INTERVAL_MS - Read period (default: 2000)
//! - RUST_LOG - Logging level (default: info)

use aggrolog::simulator::{default_sensors, SensorSimulator};
use std::env;
use std::io::Write;
use std::time::Instant;
use tokio::time::{interval, Duration};

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|idx| args.get(idx + 1).cloned())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let node_id = arg_value(&args, "--node")
        .or_else(|| env::var("SIM_NODE_ID").ok())
        .unwrap_or_else(|| "AA:BB:CC:DD:EE:FF".to_string());

    let interval_ms: u64 = arg_value(&args, "--interval-ms")
        .or_else(|| env::var("SIM_READ_INTERVAL_MS").ok())
        .map(|s| s.parse::<u64>())
        .transpose()
        .map_err(|e| format!("invalid read interval: {}", e))?
        .unwrap_or(2_000);
    if interval_ms == 0 {
        return Err("read interval must be greater than 0".into());
    }

    let mut rng = rand::thread_rng();
    let mut simulator = SensorSimulator::new(
        default_sensors(&node_id),
        Duration::from_millis(interval_ms),
        &mut rng,
    );

    log::info!("🚀 Simulating {} sensors under {}", simulator.sensors().len(), node_id);
    log::info!("   Read interval: {}ms", interval_ms);

    let mut ticker = interval(simulator.read_interval());
    ticker.tick().await; // Skip first immediate tick

    let stdout = std::io::stdout();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("🛑 Interrupt received, stopping simulator");
                break;
            }
            _ = ticker.tick() => {
                let readings = simulator.poll(Instant::now(), &mut rng);
                let mut out = stdout.lock();
                for reading in &readings {
                    writeln!(out, "{}", reading.to_feed_line())?;
                }
                out.flush()?;
                log::debug!("Published {} readings", readings.len());
            }
        }
    }

    Ok(())
}
