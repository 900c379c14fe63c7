use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::inference::{RetryPolicy, OPENROUTER_BASE_URL};

/// Application-level constants
pub const APP_NAME: &str = "substrate-replenishment";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Model used when none is given on the command line.
pub const DEFAULT_MODEL: &str = "x-ai/grok-4-fast";

/// Models known to follow the output format. Any other id is accepted too.
pub const KNOWN_MODELS: &[&str] = &[
    "x-ai/grok-4-fast",
    "google/gemini-2.5-flash",
    "google/gemini-2.5-pro",
];

pub fn is_known_model(model: &str) -> bool {
    KNOWN_MODELS.contains(&model.trim())
}

/// Env vars holding the inference API key, in lookup order.
pub const API_KEY_VARS: &[&str] = &["OPENROUTER_API_KEY", "VITE_OPEN_ROUTER_API_KEY"];

/// Optional `HTTP-Referer` sent to the inference provider.
pub const REFERER_VAR: &str = "OPENROUTER_REFERER";

/// Log filter applied when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "substrate_replenishment=info,warn"
}

/// Get the application data directory
/// Platform data dir (e.g. ~/.local/share/substrate-replenishment), or the
/// working directory when the platform has none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn default_database_path() -> PathBuf {
    app_data_dir().join("stock.db")
}

pub fn default_checkpoint_path() -> PathBuf {
    app_data_dir().join("progress.json")
}

/// Where undecodable model responses are dumped.
pub fn default_debug_dir() -> PathBuf {
    app_data_dir().join("debug")
}

/// First non-blank key among [`API_KEY_VARS`].
pub fn api_key_from_env() -> Option<String> {
    first_present(API_KEY_VARS.iter().map(|var| std::env::var(var).ok()))
}

fn first_present(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Batch processing knobs.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Families dispatched together before the join barrier.
    pub concurrency: usize,
    /// Checkpoint after this many batches (and always after the last).
    pub save_every_batches: usize,
    /// Pause between two batches.
    pub batch_delay: Duration,
    /// Retries after the first attempt on 429/503/network failures.
    pub max_retries: u32,
    /// Linear backoff unit: attempt `n` waits `n + 1` units.
    pub retry_base_delay: Duration,
    /// Bound on each HTTP request.
    pub request_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            save_every_batches: 10,
            batch_delay: Duration::from_millis(1000),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(2000),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl BatchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_base_delay)
    }
}

/// Everything a run needs, resolved from CLI flags, env and defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub debug_dir: PathBuf,
    pub system_prompt_path: Option<PathBuf>,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub batch: BatchConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            checkpoint_path: default_checkpoint_path(),
            debug_dir: default_debug_dir(),
            system_prompt_path: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: OPENROUTER_BASE_URL.to_string(),
            api_key: None,
            batch: BatchConfig::default(),
        }
    }
}
