//! Minimal downstream service for manual end-to-end runs.
//!
//! Serves `/api/v1/customers/{id}` and `/api/product/{id}` on 127.0.0.1:8081.
//! `?fail=true` answers 500, `?slow_ms=N` delays the answer.

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

async fn behave(params: &HashMap<String, String>) -> Option<StatusCode> {
    if let Some(ms) = params.get("slow_ms").and_then(|v| v.parse().ok()) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
    (params.get("fail").map(String::as_str) == Some("true"))
        .then_some(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn customer(
    Path(id): Path<u64>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(status) = behave(&params).await {
        return (status, Json(json!({ "error": "customer store down" }))).into_response();
    }
    tracing::info!(
        request_id = ?headers.get("x-request-id"),
        trace_id = ?headers.get("x-trace-id"),
        "customer lookup"
    );
    (
        [("server", "mock-backend"), ("x-powered-by", "axum")],
        Json(json!({ "id": id, "name": "Edwin", "tier": "gold" })),
    )
        .into_response()
}

async fn product(
    Path(id): Path<u64>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Some(status) = behave(&params).await {
        return (status, Json(json!({ "error": "catalog down" }))).into_response();
    }
    let color = params.get("color").cloned().unwrap_or_else(|| "black".into());
    Json(json!({ "id": id, "name": "Widget", "color": color })).into_response()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let app = Router::new()
        .route("/api/v1/customers/{id}", get(customer))
        .route("/api/product/{id}", get(product));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8081").await?;
    tracing::info!(address = %listener.local_addr()?, "mock backend listening");
    axum::serve(listener, app).await?;
    Ok(())
}
