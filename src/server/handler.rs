// src/server/handler.rs
use hyper::header::{HeaderValue, ALLOW, CACHE_CONTROL, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;
use tracing::{debug, error, Instrument};
use uuid::Uuid;

use crate::health::{FailureBody, HealthSource, OverallStatus};
use crate::metrics::MetricsCollector;

pub const HEALTH_PATHS: &[&str] = &["/api/health", "/health"];

/// Serves `GET /api/health` from a [`HealthSource`].
#[derive(Clone)]
pub struct HealthHandler {
    source: Arc<dyn HealthSource>,
    metrics: Option<Arc<MetricsCollector>>,
    down_status: StatusCode,
}

impl HealthHandler {
    pub fn new(source: Arc<dyn HealthSource>) -> Self {
        Self {
            source,
            metrics: None,
            down_status: StatusCode::OK,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Status code used when the report is `Down`.
    pub fn with_down_status(mut self, status: StatusCode) -> Self {
        self.down_status = status;
        self
    }

    async fn handle(self, req: Request<Body>) -> Response<Body> {
        let path = req.uri().path().to_string();

        let response = if !HEALTH_PATHS.contains(&path.as_str()) {
            text_response(StatusCode::NOT_FOUND, "Not Found")
        } else if *req.method() != Method::GET {
            let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET"));
            response
        } else {
            self.health().await
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_request(&path, response.status().as_u16());
        }
        response
    }

    async fn health(&self) -> Response<Body> {
        let source = self.source.clone();

        // A panic inside the probe surfaces as a join error, not a dropped connection.
        let outcome = tokio::spawn(async move { source.report().await }).await;

        let report = match outcome {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                error!("Health report unavailable: {}", e);
                return failure_response(e.to_string());
            }
            Err(e) => {
                error!("Health probe task failed: {}", e);
                return failure_response("internal error");
            }
        };

        let status = if report.overall_status == OverallStatus::Down {
            self.down_status
        } else {
            StatusCode::OK
        };
        debug!(status = %report.overall_status, "Serving health report");

        match json_response(status, &report) {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to serialize health report: {}", e);
                failure_response("failed to serialize health report")
            }
        }
    }
}

impl Service<Request<Body>> for HealthHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "request",
            %request_id,
            method = %req.method(),
            path = %req.uri().path()
        );

        Box::pin(
            async move {
                let mut response = handler.handle(req).await;
                if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                    response.headers_mut().insert("x-request-id", value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

fn json_response<T: Serialize>(
    status: StatusCode,
    value: &T,
) -> Result<Response<Body>, serde_json::Error> {
    let body = serde_json::to_vec(value)?;
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

fn failure_response(error: impl Into<String>) -> Response<Body> {
    let body = FailureBody::new(error);
    json_response(StatusCode::INTERNAL_SERVER_ERROR, &body).unwrap_or_else(|_| {
        text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    })
}
