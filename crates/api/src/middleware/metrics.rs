//! Prometheus metrics.
//!
//! HTTP request metrics, the `/metrics` endpoint, and fidelity program counters.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use domain::services::{AccrualOutcome, BulkReconciliationReport, VisitResult};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Middleware to record HTTP request metrics.
///
/// Records the following metrics:
/// - `http_requests_total`: Counter with labels (method, path, status)
/// - `http_request_duration_seconds`: Histogram with labels (method, path)
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = method_to_str(req.method());
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    counter!(
        "http_requests_total",
        "method" => method,
        "path" => path.clone(),
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(start.elapsed().as_secs_f64());

    response
}

/// Convert HTTP method to string for metric labels.
fn method_to_str(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}

fn outcome_label(outcome: AccrualOutcome) -> &'static str {
    match outcome {
        AccrualOutcome::Disabled => "disabled",
        AccrualOutcome::NotQualifying => "not_qualifying",
        AccrualOutcome::Deferred => "deferred",
        AccrualOutcome::Accrued => "accrued",
        AccrualOutcome::CourtesyEarned => "courtesy_earned",
        AccrualOutcome::AlreadyApplied => "already_applied",
    }
}

/// Records a processed visit and any courtesies it earned.
pub fn record_visit(result: &VisitResult) {
    counter!("loyalty_visits_total", "outcome" => outcome_label(result.outcome)).increment(1);
    if result.courtesies_earned > 0 {
        counter!("loyalty_courtesies_earned_total").increment(u64::from(result.courtesies_earned));
    }
}

pub fn record_courtesy_redeemed() {
    counter!("loyalty_courtesies_redeemed_total").increment(1);
}

/// Records reconciliation runs per client, labeled by result.
pub fn record_reconciliations(succeeded: usize, failed: usize) {
    if succeeded > 0 {
        counter!("loyalty_reconciliations_total", "result" => "success").increment(succeeded as u64);
    }
    if failed > 0 {
        counter!("loyalty_reconciliations_total", "result" => "failure").increment(failed as u64);
    }
}

pub fn record_unit_reconciliation(report: &BulkReconciliationReport) {
    record_reconciliations(report.succeeded, report.failed.len());
}

/// Handler for /metrics endpoint that returns Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Installs the global Prometheus recorder.
///
/// Call once at startup before any metrics are recorded. Later calls are no-ops.
pub fn init_metrics() -> Result<(), BuildError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&[0.001, 0.005, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0])?
        .install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle);
    Ok(())
}
