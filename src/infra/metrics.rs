//! Lock-free request counters and Prometheus rendering
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Lock-free metrics collector
///
/// All counters are monotonic; `snapshot()` loads a point-in-time view.
#[derive(Default)]
pub struct Metrics {
    /// Inbound webhook POSTs (monotonic)
    requests_total: AtomicU64,
    /// Events processed out of accepted batches (monotonic)
    events_total: AtomicU64,
    /// Arrival records persisted (monotonic)
    arrivals_total: AtomicU64,
    /// Departure records persisted (monotonic)
    departures_total: AtomicU64,
    /// Text messages echoed (monotonic)
    echoes_total: AtomicU64,
    /// Team-channel notifications delivered (monotonic)
    notifications_total: AtomicU64,
    /// Team-channel notifications that failed to send (monotonic)
    notification_failures_total: AtomicU64,
    /// User replies that failed to send (monotonic)
    reply_failures_total: AtomicU64,
    /// Batches rejected for signature/parse reasons (monotonic)
    parse_failures_total: AtomicU64,
    /// Records that failed to persist (monotonic)
    persist_failures_total: AtomicU64,
}

/// Point-in-time counter values
#[derive(Debug, Clone, Copy)]
pub struct MetricsSummary {
    pub requests_total: u64,
    pub events_total: u64,
    pub arrivals_total: u64,
    pub departures_total: u64,
    pub echoes_total: u64,
    pub notifications_total: u64,
    pub notification_failures_total: u64,
    pub reply_failures_total: u64,
    pub parse_failures_total: u64,
    pub persist_failures_total: u64,
}

impl MetricsSummary {
    /// Log the summary as a single structured line
    pub fn log(&self) {
        info!(
            requests = %self.requests_total,
            events = %self.events_total,
            arrivals = %self.arrivals_total,
            departures = %self.departures_total,
            echoes = %self.echoes_total,
            notifications = %self.notifications_total,
            notification_failures = %self.notification_failures_total,
            reply_failures = %self.reply_failures_total,
            parse_failures = %self.parse_failures_total,
            persist_failures = %self.persist_failures_total,
            "metrics_summary"
        );
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_event(&self) {
        self.events_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_arrival(&self) {
        self.arrivals_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_departure(&self) {
        self.departures_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_echo(&self) {
        self.echoes_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_notification(&self) {
        self.notifications_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_notification_failure(&self) {
        self.notification_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reply_failure(&self) {
        self.reply_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_parse_failure(&self) {
        self.parse_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_persist_failure(&self) {
        self.persist_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSummary {
        MetricsSummary {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            events_total: self.events_total.load(Ordering::Relaxed),
            arrivals_total: self.arrivals_total.load(Ordering::Relaxed),
            departures_total: self.departures_total.load(Ordering::Relaxed),
            echoes_total: self.echoes_total.load(Ordering::Relaxed),
            notifications_total: self.notifications_total.load(Ordering::Relaxed),
            notification_failures_total: self
                .notification_failures_total
                .load(Ordering::Relaxed),
            reply_failures_total: self.reply_failures_total.load(Ordering::Relaxed),
            parse_failures_total: self.parse_failures_total.load(Ordering::Relaxed),
            persist_failures_total: self.persist_failures_total.load(Ordering::Relaxed),
        }
    }

    /// Format all counters in Prometheus text exposition format
    pub fn render_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut output = String::with_capacity(2048);

        write_counter(&mut output, "kintai_requests_total", "Inbound webhook requests", s.requests_total);
        write_counter(&mut output, "kintai_events_total", "Events processed", s.events_total);
        write_counter(&mut output, "kintai_arrivals_total", "Arrival records persisted", s.arrivals_total);
        write_counter(&mut output, "kintai_departures_total", "Departure records persisted", s.departures_total);
        write_counter(&mut output, "kintai_echoes_total", "Text messages echoed", s.echoes_total);
        write_counter(&mut output, "kintai_notifications_total", "Team notifications delivered", s.notifications_total);
        write_counter(
            &mut output,
            "kintai_notification_failures_total",
            "Team notifications that failed to send",
            s.notification_failures_total,
        );
        write_counter(&mut output, "kintai_reply_failures_total", "User replies that failed to send", s.reply_failures_total);
        write_counter(&mut output, "kintai_parse_failures_total", "Batches rejected at parse", s.parse_failures_total);
        write_counter(&mut output, "kintai_persist_failures_total", "Records that failed to persist", s.persist_failures_total);

        output
    }
}

/// Write a counter metric with HELP and TYPE lines
fn write_counter(output: &mut String, name: &str, help: &str, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} counter");
    let _ = writeln!(output, "{name} {val}");
}
