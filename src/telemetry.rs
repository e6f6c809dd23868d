//! Telemetry logic.
//! Support tracing, metrics and logging.
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics::Unit;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::trace::{Span, TraceError, Tracer};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::{LogError, SdkLogger, SdkLoggerProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;

/// Counter of `sync_user` calls, labelled by `outcome`.
pub const USERS_SYNCED: &str = "users_synced_total";
const HTTP_REQUESTS: &str = "http_requests_total";
const HTTP_REQUESTS_DURATION: &str = "http_requests_duration_seconds";
const UNMATCHED_ROUTE: &str = "unmatched";

fn ressources() -> Resource {
    Resource::builder().with_service_name("novus").build()
}

/// Create tracer for OLTP.
pub fn setup_tracer(endpoint: &str) -> Result<SdkTracerProvider, TraceError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(ressources())
        .build())
}

/// Create OLTP exporter for logs.
pub fn setup_logging(
    endpoint: &str,
) -> Result<OpenTelemetryTracingBridge<SdkLoggerProvider, SdkLogger>, LogError> {
    let exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let provider: SdkLoggerProvider = SdkLoggerProvider::builder()
        .with_resource(ressources())
        .with_batch_exporter(exporter)
        .build();
    Ok(OpenTelemetryTracingBridge::new(&provider))
}

/// Create recorder for Prometheus metrics.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    metrics::describe_counter!(
        USERS_SYNCED,
        Unit::Count,
        "User synchronizations, labelled by outcome."
    );
    metrics::describe_counter!(HTTP_REQUESTS, Unit::Count, "HTTP requests served.");
    metrics::describe_histogram!(
        HTTP_REQUESTS_DURATION,
        Unit::Seconds,
        "HTTP request latency."
    );

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUESTS_DURATION.to_owned()),
            EXPONENTIAL_SECONDS,
        )?
        .install_recorder()
}

/// Outcome of `POST /users/sync`, attached to the response by the handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncLabel(pub &'static str);

/// Route template of a request.
///
/// Raw paths carry external ids, so they are never used as labels.
fn route(req: &Request) -> &str {
    req.extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_ROUTE, MatchedPath::as_str)
}

/// Record a span and request metrics for every request.
pub async fn track(req: Request, next: Next) -> Response {
    let mut span = global::tracer("novus-http").start("http-request");
    span.set_attribute(KeyValue::new("http.route", route(&req).to_owned()));
    span.set_attribute(KeyValue::new(
        "http.request.method",
        req.method().to_string(),
    ));

    let labels = [
        ("method", req.method().to_string()),
        ("route", route(&req).to_owned()),
    ];
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    span.set_attribute(KeyValue::new(
        "http.response.status_code",
        i64::from(status),
    ));
    if let Some(SyncLabel(outcome)) = response.extensions().get::<SyncLabel>() {
        span.set_attribute(KeyValue::new("novus.sync.outcome", *outcome));
    }
    span.end();

    let [method, route] = labels;
    let labels = [method, route, ("status", status.to_string())];
    metrics::counter!(HTTP_REQUESTS, &labels).increment(1);
    metrics::histogram!(HTTP_REQUESTS_DURATION, &labels)
        .record(start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use axum::body::Body;

    use super::*;

    #[test]
    fn test_route_without_match_is_not_the_raw_path() {
        let req = Request::builder()
            .uri("/users/user_2abc")
            .body(Body::empty())
            .unwrap();

        assert_eq!(route(&req), UNMATCHED_ROUTE);
    }
}
