/*!
 * Structured Tracing
 * Subscriber setup and wait spans built on the tracing crate
 *
 * Features:
 * - Compact human output or JSON output selected by environment
 * - One span per blocking wait with its outcome recorded
 * - Slow-wait reporting against the configured threshold
 */

use std::cell::Cell;
use std::time::{Duration, Instant};
use tracing::{debug, info, span, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Environment variable switching the subscriber to JSON output
pub const TRACE_JSON_ENV: &str = "SYNCH_TRACE_JSON";

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - SYNCH_TRACE_JSON: Enable JSON output (default: false)
///
/// Does nothing if a global subscriber is already installed; use
/// [`try_init_tracing`] to observe that case.
pub fn init_tracing() {
    if try_init_tracing().is_ok() {
        info!("Structured tracing initialized");
    }
}

/// Initialize structured tracing, failing if a subscriber is already set
pub fn try_init_tracing() -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init()
    }
}

/// Span covering one wait call
pub struct WaitSpan {
    span: tracing::Span,
    start: Instant,
    slow_threshold: Option<Duration>,
    blocked: Cell<bool>,
    outcome: Option<String>,
}

impl WaitSpan {
    pub fn new(policy: &str, objects: usize, slow_threshold: Option<Duration>) -> Self {
        let span = span!(
            Level::TRACE,
            "wait",
            policy = policy,
            objects = objects,
            outcome = tracing::field::Empty,
            waited_us = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            slow_threshold,
            blocked: Cell::new(false),
            outcome: None,
        }
    }

    /// Mark that the wait had to park
    pub fn record_blocked(&self) {
        self.blocked.set(true);
    }

    pub fn record_outcome(&mut self, outcome: &dyn std::fmt::Display) {
        let outcome = outcome.to_string();
        self.span.record("outcome", outcome.as_str());
        self.outcome = Some(outcome);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for WaitSpan {
    fn drop(&mut self) {
        let waited = self.start.elapsed();
        self.span.record("waited_us", waited.as_micros() as u64);
        let _entered = self.span.enter();

        let slow = self.blocked.get()
            && self
                .slow_threshold
                .is_some_and(|threshold| waited >= threshold);
        if slow {
            debug!(
                outcome = self.outcome.as_deref().unwrap_or("unresolved"),
                waited_ms = waited.as_millis() as u64,
                slow = true,
                "Slow wait"
            );
        }
    }
}

/// Create a span for a wait call
pub fn span_wait(policy: &str, objects: usize, slow_threshold: Option<Duration>) -> WaitSpan {
    WaitSpan::new(policy, objects, slow_threshold)
}
