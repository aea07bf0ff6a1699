//! Tracing subscriber setup.
//!
//! Logs always go to stderr; stdout carries answers and `--json` output.

use std::io::IsTerminal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// `filter` takes `EnvFilter` syntax (`"debug"`, `"docent_knowledge=trace"`).
/// With `json` set, every event is one JSON object per line and colour is
/// never used.
///
/// # Example
/// ```no_run
/// use docent_core::logging::init_logging;
///
/// init_logging(Some("docent_knowledge=debug"), false, false).expect("logging");
/// ```
pub fn init_logging(filter: Option<&str>, no_color: bool, json: bool) -> AppResult<()> {
    let env_filter = build_filter(filter)?;

    let layer = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_ansi(!no_color && supports_color())
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))
}

/// [`init_logging`] driven by the resolved configuration.
pub fn init_from_config(config: &AppConfig) -> AppResult<()> {
    init_logging(config.log_level.as_deref(), config.no_color, config.log_json)
}

fn build_filter(filter: Option<&str>) -> AppResult<EnvFilter> {
    EnvFilter::try_new(filter.unwrap_or(DEFAULT_FILTER))
        .map_err(|e| AppError::Config(format!("Invalid log filter: {}", e)))
}

fn supports_color() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal()
}
