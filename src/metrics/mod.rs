//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Wizard step transitions
//! - Submission outcomes and wallet wait times
//! - Published lifecycle events

use crate::coordination::SubmissionKind;
use crate::error::{LaunchError, LaunchResult};
use crate::events::SubmissionEvent;
use crate::wizard::WizardStep;

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::{error, info};

lazy_static! {
    // Wizard metrics
    pub static ref WIZARD_TRANSITIONS: CounterVec = register_counter_vec!(
        "launchpad_wizard_transitions_total",
        "Wizard step transitions by step left and action",
        &["step", "action"]
    ).unwrap();

    // Submission metrics
    pub static ref SUBMISSIONS_STARTED: CounterVec = register_counter_vec!(
        "launchpad_submissions_started_total",
        "Submissions that passed validation and were encoded",
        &["kind"]
    ).unwrap();

    pub static ref SUBMISSIONS_COMPLETED: CounterVec = register_counter_vec!(
        "launchpad_submissions_completed_total",
        "Finished submissions by outcome",
        &["kind", "outcome"]
    ).unwrap();

    pub static ref SUBMISSIONS_IN_FLIGHT: Gauge = register_gauge!(
        "launchpad_submissions_in_flight",
        "Submissions waiting on the wallet"
    ).unwrap();

    pub static ref WALLET_WAIT: HistogramVec = register_histogram_vec!(
        "launchpad_wallet_wait_seconds",
        "Time between dispatch and the wallet result",
        &["kind"],
        vec![1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    ).unwrap();

    // Event metrics
    pub static ref EVENTS_PUBLISHED: CounterVec = register_counter_vec!(
        "launchpad_events_published_total",
        "Lifecycle events published by type",
        &["event_type"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> LaunchResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| LaunchError::Internal(format!("metrics bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| LaunchError::Internal(format!("metrics server: {}", e)))?;

        Ok(())
    }
}

pub async fn metrics_handler() -> (StatusCode, String) {
    match render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

/// Text exposition of every registered metric
pub fn render() -> LaunchResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| LaunchError::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| LaunchError::Internal(e.to_string()))
}

// Helper functions to record metrics

pub fn record_wizard_transition(step: WizardStep, action: &str) {
    WIZARD_TRANSITIONS
        .with_label_values(&[step.as_str(), action])
        .inc();
}

pub fn record_submission_started(kind: SubmissionKind) {
    SUBMISSIONS_STARTED
        .with_label_values(&[kind.as_str()])
        .inc();
    SUBMISSIONS_IN_FLIGHT.inc();
}

/// `outcome` is "succeeded" or an error kind
pub fn record_submission_completed(kind: SubmissionKind, outcome: &str, wait_secs: f64) {
    SUBMISSIONS_COMPLETED
        .with_label_values(&[kind.as_str(), outcome])
        .inc();
    WALLET_WAIT
        .with_label_values(&[kind.as_str()])
        .observe(wait_secs);
    SUBMISSIONS_IN_FLIGHT.dec();
}

/// Submission rejected before anything was dispatched
pub fn record_submission_rejected(kind: SubmissionKind, error_kind: &str) {
    SUBMISSIONS_COMPLETED
        .with_label_values(&[kind.as_str(), error_kind])
        .inc();
}

pub fn record_event(event: &SubmissionEvent) {
    EVENTS_PUBLISHED
        .with_label_values(&[event.name()])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_metrics() {
        record_wizard_transition(WizardStep::Identity, "next");
        record_submission_rejected(SubmissionKind::Swap, "catalog_lookup");

        let body = render().unwrap();
        assert!(body.contains("launchpad_wizard_transitions_total"));
        assert!(body.contains("launchpad_submissions_completed_total"));
    }
}
