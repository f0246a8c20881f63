//! Logging setup
//!
//! `tracing-subscriber` registry with an `EnvFilter` and either a compact or
//! a JSON formatter.

use std::str::FromStr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Transport crates that get noisy at debug level
const QUIET_MODULES: &str = "hyper=info,hyper_util=info,reqwest=info,alloy_transport_http=info";

/// Build the filter directive string for `log_level`.
///
/// A bare level (`debug`) gets the quiet-module defaults appended; a full
/// directive list (anything with `,` or `=`) is used as-is. `None` falls
/// back to `RUST_LOG`, then `info`.
pub fn filter_spec(log_level: Option<&str>) -> String {
    let level = log_level
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    if level.contains(',') || level.contains('=') {
        level
    } else {
        format!("{},{}", level, QUIET_MODULES)
    }
}

pub fn setup_logging(log_level: Option<&str>, json_format: bool) {
    let spec = filter_spec(log_level);
    let filter = EnvFilter::from_str(&spec).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    if json_format {
        let json_layer = fmt::layer().json().with_target(false).with_current_span(false);
        subscriber.with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer().with_target(false).compact();
        subscriber.with(fmt_layer).init();
    }

    tracing::info!(
        "Logging initialized ({}, {})",
        spec,
        if json_format { "json" } else { "compact" }
    );
}
