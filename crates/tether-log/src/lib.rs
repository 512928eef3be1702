//! Structured logging for the Tether overlay.
//!
//! Provides structured, filterable logging via the `tracing` ecosystem:
//! console output with timestamps and module paths, plus optional JSON file
//! logging for post-mortem analysis of desync reports. Integrates with the
//! configuration system for runtime log level control.

use std::path::Path;

use tether_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for the overlay.
///
/// Sets up:
/// - Console output with timestamps, module paths, and severity levels
/// - Optional JSON file logging (for attaching to desync reports)
/// - Environment-based filtering (respects RUST_LOG)
/// - Log level override from the config system
///
/// # Arguments
///
/// * `log_dir` - Optional directory for JSON log files
/// * `config` - Optional configuration supplying the log level override
pub fn init_logging(log_dir: Option<&Path>, config: Option<&Config>) {
    let filter_str = match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    };

    // RUST_LOG wins over the config value when set.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join("tether.log"))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Default filter: `info` everywhere, `debug` for the sync engine so codec
/// traces are visible without drowning in dependency noise.
const DEFAULT_FILTER: &str = "info,tether_sync=debug";

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
