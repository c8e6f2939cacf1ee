/*!
 * Structured Tracing
 * Subscriber setup and per-dispatch spans using the tracing crate
 *
 * Features:
 * - EnvFilter driven levels (RUST_LOG, default info)
 * - JSON-formatted logs for structured parsing
 * - Dispatch spans with wall-clock duration and outcome
 * - Slow dispatch warnings
 */

use crate::core::limits::SLOW_DISPATCH_THRESHOLD;
use crate::core::types::ProcessId;
use crate::process::ProcessStatus;
use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Environment variable switching log output to JSON
pub const ENV_TRACE_JSON: &str = "PROCSIM_TRACE_JSON";

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - PROCSIM_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_TRACE_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "structured tracing initialized");
    }
}

/// Span covering one dispatch, from switch-in to return
pub struct DispatchSpan {
    span: tracing::Span,
    start: Instant,
    pid: ProcessId,
}

impl DispatchSpan {
    pub fn new(pid: ProcessId, name: &str, from: ProcessStatus) -> Self {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            pid = pid,
            process = name,
            from = ?from,
            to = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );
        {
            let _entered = span.enter();
            debug!(pid, ?from, "dispatch started");
        }
        Self {
            span,
            start: Instant::now(),
            pid,
        }
    }

    /// Record the status the process was left in
    pub fn record_status(&self, status: ProcessStatus) {
        self.span.record("to", tracing::field::debug(status));
    }
}

impl Drop for DispatchSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration > SLOW_DISPATCH_THRESHOLD {
            warn!(
                pid = self.pid,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow dispatch detected"
            );
        } else {
            debug!(pid = self.pid, duration_us = duration.as_micros() as u64, "dispatch completed");
        }
    }
}
