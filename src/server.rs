//! HTTP surface: `/metrics` serves the relabeled exporter output and
//! `/healthz` is a dependency-free liveness check.

use crate::k8s::cache::LabelSource;
use crate::metrics::fetcher::MetricSource;
use crate::metrics::pipeline::RelabelPipeline;
use crate::LabelerError;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tracing::error;

pub const METRICS_PATH: &str = "/metrics";
pub const HEALTHZ_PATH: &str = "/healthz";

/// Content type of the text exposition format.
pub const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

impl IntoResponse for LabelerError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", self),
        )
            .into_response()
    }
}

pub fn router<M, L>(pipeline: Arc<RelabelPipeline<M, L>>) -> Router
where
    M: MetricSource + 'static,
    L: LabelSource + 'static,
{
    Router::new()
        .route(METRICS_PATH, get(metrics_handler::<M, L>))
        .route(HEALTHZ_PATH, get(healthz))
        .with_state(pipeline)
}

async fn metrics_handler<M, L>(
    State(pipeline): State<Arc<RelabelPipeline<M, L>>>,
) -> Result<Response, LabelerError>
where
    M: MetricSource + 'static,
    L: LabelSource + 'static,
{
    match pipeline.run().await {
        Ok(body) => Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response()),
        Err(e) => {
            error!("Scrape for node {} failed: {}", pipeline.node(), e);
            Err(e)
        }
    }
}

async fn healthz() -> &'static str {
    "OK"
}
