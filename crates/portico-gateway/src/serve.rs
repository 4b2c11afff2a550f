//! # Axum Adapter
//!
//! Bridges the transport-agnostic [`Gateway`] onto an HTTP listener. The
//! route tree lives in the gateway, not in axum, so the router is a single
//! fallback service that converts every inbound request into an
//! [`InboundCall`] and renders the resulting [`GatewayResponse`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::{Query, Request, State};
use axum::http::{header::HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::dispatch::{Gateway, GatewayResponse, InboundCall};

/// Largest accepted request body, in bytes.
const BODY_LIMIT: usize = 1 << 20;

/// An axum router that forwards everything to the gateway.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .fallback(forward)
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// Bind and serve until the process is stopped.
pub async fn run(gateway: Arc<Gateway>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router(gateway)).await
}

async fn forward(
    State(gateway): State<Arc<Gateway>>,
    Query(query): Query<HashMap<String, String>>,
    request: Request,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let mut headers = HashMap::new();
    for (name, value) in request.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), value.to_string());
        }
    }

    let body = match to_bytes(request.into_body(), BODY_LIMIT).await {
        Ok(bytes) if bytes.is_empty() => None,
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": "bad-request", "reason": "body is not valid JSON" })),
                )
                    .into_response();
            }
        },
        Err(_) => {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(serde_json::json!({ "error": "payload-too-large" })),
            )
                .into_response();
        }
    };

    let outcome = gateway
        .handle(InboundCall {
            method,
            path,
            headers,
            query,
            body,
        })
        .await;
    render(outcome)
}

fn render(outcome: GatewayResponse) -> Response {
    let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = if status == StatusCode::NO_CONTENT {
        status.into_response()
    } else {
        (status, Json(outcome.body)).into_response()
    };
    for (name, value) in outcome.headers {
        let Ok(name) = HeaderName::try_from(name) else {
            continue;
        };
        let Ok(value) = HeaderValue::try_from(value) else {
            continue;
        };
        response.headers_mut().insert(name, value);
    }
    response
}
