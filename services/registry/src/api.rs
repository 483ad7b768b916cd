//! Registry HTTP surface
//!
//! - `GET  /gateway/:name`        resolve a gateway
//! - `PUT  /gateway/:name`        upsert a gateway id (JSON or YAML body)
//! - `PUT  /gateway/:name/token`  bind a write token to a gateway
//! - `GET  /gateways`             dump the directory
//! - `GET  /health`

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::directory::{Directory, DirectoryError};
use crate::types::{is_valid_name, GatewayPayload, GatewayReply, TokenUpdate};

#[derive(Clone)]
pub struct AppState {
    directory: Arc<dyn Directory>,
    write_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(directory: Arc<dyn Directory>, write_token: Option<String>) -> Self {
        Self {
            directory,
            write_token: write_token.filter(|t| !t.is_empty()).map(Arc::from),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/gateways", get(dump_gateways))
        .route("/gateway/:name", get(get_gateway).put(put_gateway))
        .route("/gateway/:name/token", put(put_gateway_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Shared-token equality check.
///
/// Writes are open when neither the server nor the entry carries a token.
/// Otherwise the supplied token must equal the server's shared token or
/// the token bound to the entry.
pub fn is_authorized(shared: Option<&str>, entry: Option<&str>, supplied: Option<&str>) -> bool {
    let entry = entry.filter(|t| !t.is_empty());
    if shared.is_none() && entry.is_none() {
        return true;
    }
    match supplied.filter(|t| !t.is_empty()) {
        Some(token) => shared == Some(token) || entry == Some(token),
        None => false,
    }
}

fn reply_error(status: StatusCode, name: &str, message: impl Into<String>) -> Response {
    (status, Json(GatewayReply::error(name, message))).into_response()
}

fn is_yaml(headers: &HeaderMap) -> bool {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .unwrap_or("");
    matches!(
        content_type,
        "application/yaml" | "application/x-yaml" | "text/yaml"
    )
}

fn decode_body<T: DeserializeOwned>(headers: &HeaderMap, body: &[u8]) -> Result<T, String> {
    if is_yaml(headers) {
        serde_yaml::from_slice(body).map_err(|e| e.to_string())
    } else {
        serde_json::from_slice(body).map_err(|e| e.to_string())
    }
}

impl AppState {
    /// Token currently bound to `name`, if the entry exists
    async fn entry_token(&self, name: &str) -> Result<Option<String>, DirectoryError> {
        match self.directory.get(name).await {
            Ok(entry) => Ok(entry.token),
            Err(DirectoryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn authorize(&self, name: &str, supplied: Option<&str>) -> Result<(), Response> {
        let entry_token = self.entry_token(name).await.map_err(|e| {
            error!(gateway = %name, error = %e, "Failed to read gateway for authorization");
            reply_error(StatusCode::INTERNAL_SERVER_ERROR, name, e.to_string())
        })?;

        if is_authorized(self.write_token.as_deref(), entry_token.as_deref(), supplied) {
            Ok(())
        } else {
            warn!(gateway = %name, "Rejected write with missing or incorrect token");
            Err(reply_error(
                StatusCode::UNAUTHORIZED,
                name,
                DirectoryError::Unauthorized.to_string(),
            ))
        }
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "gateway-registry",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn get_gateway(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    if !is_valid_name(&name) {
        return reply_error(StatusCode::BAD_REQUEST, &name, "malformed gateway name");
    }

    match state.directory.get(&name).await {
        Ok(entry) => {
            Json(GatewayReply::found(&entry.gateway_name, &entry.gateway_id)).into_response()
        }
        Err(e @ DirectoryError::NotFound(_)) => {
            reply_error(StatusCode::NOT_FOUND, &name, e.to_string())
        }
        Err(e) => {
            error!(gateway = %name, error = %e, "Directory read failed");
            reply_error(StatusCode::INTERNAL_SERVER_ERROR, &name, e.to_string())
        }
    }
}

async fn put_gateway(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_valid_name(&name) {
        return reply_error(StatusCode::BAD_REQUEST, &name, "malformed gateway name");
    }

    let payload: GatewayPayload = match decode_body(&headers, &body) {
        Ok(p) => p,
        Err(e) => {
            return reply_error(
                StatusCode::BAD_REQUEST,
                &name,
                format!("malformed body: {}", e),
            )
        }
    };
    if payload.gateway_id.is_empty() {
        return reply_error(
            StatusCode::BAD_REQUEST,
            &name,
            DirectoryError::EmptyGatewayId.to_string(),
        );
    }

    if let Err(response) = state.authorize(&name, payload.token.as_deref()).await {
        return response;
    }

    match state.directory.put(&name, &payload.gateway_id).await {
        Ok(entry) => {
            info!(
                gateway = %name,
                gateway_id = %entry.gateway_id,
                changes = entry.changes,
                "Gateway updated"
            );
            Json(GatewayReply::found(&entry.gateway_name, &entry.gateway_id)).into_response()
        }
        Err(e) => {
            error!(gateway = %name, error = %e, "Directory write failed");
            reply_error(StatusCode::INTERNAL_SERVER_ERROR, &name, e.to_string())
        }
    }
}

async fn put_gateway_token(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_valid_name(&name) {
        return reply_error(StatusCode::BAD_REQUEST, &name, "malformed gateway name");
    }

    let update: TokenUpdate = match decode_body(&headers, &body) {
        Ok(u) => u,
        Err(e) => {
            return reply_error(
                StatusCode::BAD_REQUEST,
                &name,
                format!("malformed body: {}", e),
            )
        }
    };
    if update.token.is_empty() {
        return reply_error(StatusCode::BAD_REQUEST, &name, "token must not be empty");
    }

    if let Err(response) = state.authorize(&name, update.write_token.as_deref()).await {
        return response;
    }

    match state.directory.put_token(&name, &update.token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e @ DirectoryError::NotFound(_)) => {
            reply_error(StatusCode::NOT_FOUND, &name, e.to_string())
        }
        Err(e) => {
            error!(gateway = %name, error = %e, "Token write failed");
            reply_error(StatusCode::INTERNAL_SERVER_ERROR, &name, e.to_string())
        }
    }
}

async fn dump_gateways(State(state): State<AppState>) -> Response {
    match state.directory.dump().await {
        Ok(entries) => {
            let entries: Vec<_> = entries.iter().map(|e| e.redacted()).collect();
            Json(entries).into_response()
        }
        Err(e) => {
            error!(error = %e, "Directory dump failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
