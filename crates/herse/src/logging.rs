//! Structured logging setup.
//!
//! JSON output for production, pretty output for development; the level
//! comes from `RUST_LOG` when set, else from the CLI flag.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging subsystem.
pub fn init(level: &str, format: &str) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        "json" => init_json(filter),
        "pretty" => init_pretty(filter),
        other => Err(format!(
            "unknown log format '{}' (expected json or pretty)",
            other
        )),
    }
}

fn init_json(filter: EnvFilter) -> Result<(), String> {
    let json_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(false)
        .with_file(false)
        .with_line_number(false)
        .flatten_event(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e| e.to_string())
}

fn init_pretty(filter: EnvFilter) -> Result<(), String> {
    let pretty_layer = fmt::layer()
        .with_target(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(pretty_layer)
        .try_init()
        .map_err(|e| e.to_string())
}
