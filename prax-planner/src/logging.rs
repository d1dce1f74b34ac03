//! Logging setup for the planner.
//!
//! The planner always emits `tracing` events; nothing is printed unless a
//! subscriber is installed. [`init`] installs one (with the
//! `tracing-subscriber` feature) based on environment variables:
//!
//! - `PRAX_DEBUG=true|1|yes` - debug-level output
//! - `PRAX_LOG_LEVEL=trace|debug|info|warn|error` - explicit level
//! - `PRAX_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! Plan and statement dumps are additionally gated by the `[debug]` section
//! of [`PlannerConfig`](crate::config::PlannerConfig).
//!
//! ```rust,no_run
//! use prax_planner::logging;
//!
//! logging::init();
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

/// Check if `PRAX_DEBUG` enables debug logging.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("PRAX_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Resolve the log level: `PRAX_LOG_LEVEL`, then `PRAX_DEBUG`, then `warn`.
pub fn log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("PRAX_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// Resolve the output format from `PRAX_LOG_FORMAT`.
pub fn log_format() -> LogFormat {
    match env::var("PRAX_LOG_FORMAT").map(|f| f.to_lowercase()) {
        Ok(f) if f == "pretty" => LogFormat::Pretty,
        Ok(f) if f == "compact" => LogFormat::Compact,
        _ => LogFormat::Json,
    }
}

/// Install the planner's subscriber. Later calls are no-ops.
///
/// Does nothing when neither `PRAX_DEBUG` nor `PRAX_LOG_LEVEL` is set, or
/// when the `tracing-subscriber` feature is disabled.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("PRAX_LOG_LEVEL").is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = log_level();
            let filter = EnvFilter::try_new(format!("prax_planner={level},prax_fetch={level}"))
                .unwrap_or_else(|_| EnvFilter::new("warn"));
            let registry = tracing_subscriber::registry().with(filter);

            // try_init: an application may already own the global subscriber.
            let installed = match log_format() {
                LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level, format = ?log_format(), "Planner logging initialized");
            }
        }
    });
}

/// Debug event emitted only when `PRAX_DEBUG` is set.
#[macro_export]
macro_rules! planner_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Trace event emitted only when `PRAX_DEBUG` is set.
#[macro_export]
macro_rules! planner_trace {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::trace!($($arg)*);
        }
    };
}
