//! Runtime configuration from environment variables
//!
//! Environment variables:
//! - `LOG_ROOT` (default: logs)
//! - `MAX_DRIFT_SECS` (default: 300)
//! - `CLEANUP_INTERVAL_SECS` (default: 60)
//! - `WATCH_TOPICS` (default: empty) - comma-separated `variable=topic` pairs;
//!   a bare `topic` watches the topic under its own name
//! - `STEP_INTERVAL_MS` (default: 1000)
//! - `STEPS_PER_REPORT` (default: 60)
//! - `REPORT_OUTPUT_PATH` (default: reports/aggregates.jsonl)
//! - `ENABLE_LOG_ROUTER` (default: true)
//! - `RUST_LOG` (default: info)

use crate::aggregator::AggregatorConfig;
use crate::router::RouterConfig;
use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Jsonl,
    Sqlite,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// One aggregator channel fed from a feed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTopic {
    pub variable: String,
    pub topic: String,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub log_root: PathBuf,
    pub max_drift_secs: u64,
    pub cleanup_interval_secs: u64,
    pub watch_topics: Vec<WatchTopic>,
    pub step_interval_ms: u64,
    pub steps_per_report: u64,
    pub report_output_path: PathBuf,
    pub enable_log_router: bool,
    pub rust_log: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_root: PathBuf::from("logs"),
            max_drift_secs: 300,
            cleanup_interval_secs: 60,
            watch_topics: Vec::new(),
            step_interval_ms: 1_000,
            steps_per_report: 60,
            report_output_path: PathBuf::from("reports/aggregates.jsonl"),
            enable_log_router: true,
            rust_log: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let watch_topics = match env::var("WATCH_TOPICS") {
            Ok(list) => parse_watch_topics(&list)?,
            Err(_) => defaults.watch_topics,
        };

        let config = Self {
            log_root: env::var("LOG_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_root),

            max_drift_secs: parse_number("MAX_DRIFT_SECS", defaults.max_drift_secs)?,

            cleanup_interval_secs: parse_number("CLEANUP_INTERVAL_SECS", defaults.cleanup_interval_secs)?,

            watch_topics,

            step_interval_ms: parse_number("STEP_INTERVAL_MS", defaults.step_interval_ms)?,

            steps_per_report: parse_number("STEPS_PER_REPORT", defaults.steps_per_report)?,

            report_output_path: env::var("REPORT_OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.report_output_path),

            enable_log_router: env::var("ENABLE_LOG_ROUTER")
                .ok()
                .and_then(|s| s.to_lowercase().parse().ok())
                .unwrap_or(defaults.enable_log_router),

            rust_log: env::var("RUST_LOG").unwrap_or(defaults.rust_log),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "STEP_INTERVAL_MS must be greater than 0".to_string(),
            ));
        }
        if self.steps_per_report == 0 {
            return Err(ConfigError::InvalidValue(
                "STEPS_PER_REPORT must be greater than 0".to_string(),
            ));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "CLEANUP_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            watch_keys: self.watch_topics.iter().map(|w| w.variable.clone()).collect(),
            step_interval: Duration::from_millis(self.step_interval_ms),
            steps_per_report: self.steps_per_report,
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            log_root: self.log_root.clone(),
            max_drift: Duration::from_secs(self.max_drift_secs),
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
        }
    }

    pub fn parse_backend_from_args() -> BackendType {
        let args: Vec<String> = env::args().collect();
        backend_from_args(&args)
    }
}

fn backend_from_args(args: &[String]) -> BackendType {
    if let Some(idx) = args.iter().position(|x| x == "--backend") {
        match args.get(idx + 1).map(|s| s.as_str()) {
            Some("sqlite") => return BackendType::Sqlite,
            Some("jsonl") => return BackendType::Jsonl,
            Some(other) => log::warn!("Unknown backend '{}', defaulting to JSONL", other),
            None => {}
        }
    }

    BackendType::Jsonl
}

fn parse_number(var: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(s) => s
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{} must be a whole number, got '{}'", var, s))),
        Err(_) => Ok(default),
    }
}

/// Parse `var=topic,var2=topic2`. A variable or topic listed twice is a
/// conflicting option.
pub fn parse_watch_topics(list: &str) -> Result<Vec<WatchTopic>, ConfigError> {
    let mut watched = Vec::new();
    let mut variables = HashSet::new();
    let mut topics = HashSet::new();

    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (variable, topic) = match entry.split_once('=') {
            Some((v, t)) => (v.trim(), t.trim()),
            None => (entry, entry),
        };

        if variable.is_empty() || topic.is_empty() {
            return Err(ConfigError::InvalidValue(format!(
                "WATCH_TOPICS entry '{}' must be variable=topic",
                entry
            )));
        }
        if !variables.insert(variable.to_string()) {
            return Err(ConfigError::InvalidValue(format!(
                "WATCH_TOPICS lists variable '{}' more than once",
                variable
            )));
        }
        if !topics.insert(topic.to_string()) {
            return Err(ConfigError::InvalidValue(format!(
                "WATCH_TOPICS lists topic '{}' more than once",
                topic
            )));
        }

        watched.push(WatchTopic {
            variable: variable.to_string(),
            topic: topic.to_string(),
        });
    }

    Ok(watched)
}
