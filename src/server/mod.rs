// src/server/mod.rs  -  GET /_calc_times JSON endpoint (axum)
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::acp::TimeCalculator;
use crate::calc::{self, CalcQuery, CalcResponse, Policy, RequestError};
use crate::config::AppConfig;

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub calc:   Arc<TimeCalculator>,
    pub policy: Policy,
}

#[derive(Debug, Serialize)]
struct ApiError {
    code:    &'static str,
    message: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(ApiError { code: "BAD_REQUEST", message }),
            )
                .into_response(),
        }
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/_calc_times", get(calc_times))
        .with_state(state)
}

/// GET /_calc_times?km=..&brevet_dist_km=..&begin_date=..
async fn calc_times(
    State(state): State<AppState>,
    query: Result<Query<CalcQuery>, QueryRejection>,
) -> Result<Json<CalcResponse>, AppError> {
    log::debug!("Got a JSON request");
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let resp = calc::calc_times(&state.calc, &state.policy, &query)?;
    Ok(Json(resp))
}

/// Bind `host:port` and serve until the process is stopped.
pub fn run(cfg: &AppConfig) -> Result<()> {
    let state = AppState {
        calc:   Arc::new(cfg.calculator()),
        policy: cfg.policy,
    };
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("Bad bind address {}:{}", cfg.host, cfg.port))?;

    let rt = tokio::runtime::Runtime::new().context("Starting tokio runtime")?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Binding {addr}"))?;
        log::info!("Opening for global access on http://{addr}");
        axum::serve(listener, create_router(state))
            .await
            .context("HTTP server")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn router() -> Router {
        create_router(AppState {
            calc:   Arc::new(TimeCalculator::default()),
            policy: Policy::default(),
        })
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn calc_times_returns_open_and_close() {
        let (status, v) =
            get_json("/_calc_times?km=200&brevet_dist_km=200&begin_date=2023-01-01T00:00").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["result"]["open"], "2023-01-01T05:53");
        assert_eq!(v["result"]["close"], "2023-01-01T13:20");
        assert_eq!(v["result"]["err_msg"], "");
    }

    #[tokio::test]
    async fn negative_control_reports_err_msg() {
        let (status, v) =
            get_json("/_calc_times?km=-5&brevet_dist_km=200&begin_date=2023-01-01T00:00").await;
        assert_eq!(status, StatusCode::OK);
        assert!(v["result"]["open"].is_null());
        assert!(!v["result"]["err_msg"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn huge_distance_still_answers() {
        let (status, v) =
            get_json("/_calc_times?km=1e12&brevet_dist_km=1e12&begin_date=2023-01-01T00:00").await;
        assert_eq!(status, StatusCode::OK);
        assert!(v["result"]["open"].is_null());
        assert!(v["result"]["err_msg"].as_str().unwrap().contains("out of range"));
    }

    #[tokio::test]
    async fn malformed_begin_date_is_400() {
        let (status, v) = get_json("/_calc_times?km=10&brevet_dist_km=200&begin_date=tomorrow").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn non_numeric_km_is_400() {
        let (status, v) = get_json("/_calc_times?km=far&brevet_dist_km=200").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["code"], "BAD_REQUEST");
    }
}
