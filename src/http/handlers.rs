//! Request handlers for the visit counter endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use tracing::{error, info, instrument};

use super::page::PageSource;
use crate::error::VisitsError;
use crate::visits::{ClientIdentifier, VisitCounter};

/// State shared by all handlers.
pub struct AppState {
    pub counter: VisitCounter,
    pub page: PageSource,
}

/// Maps service errors onto HTTP responses.
///
/// Store failures and render failures both yield a server error, but they
/// are logged and reported separately.
pub struct AppError(VisitsError);

impl From<VisitsError> for AppError {
    fn from(err: VisitsError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            VisitsError::Store(e) if e.is_unavailable() => {
                error!(error = %self.0, "Store unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
            }
            VisitsError::Store(_) => {
                error!(error = %self.0, "Store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "store error")
            }
            VisitsError::Render(_) => {
                error!(error = %self.0, "Failed to render page");
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to render page")
            }
            VisitsError::InvalidIdentifier(_) => {
                error!(error = %self.0, "Rejected client identifier");
                (StatusCode::BAD_REQUEST, "invalid client address")
            }
            _ => {
                error!(error = %self.0, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        };
        (status, message).into_response()
    }
}

/// Count a visit from the caller and render the page.
#[instrument(skip_all, fields(client = %addr.ip()))]
pub async fn visit_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<Html<String>, AppError> {
    let identifier = ClientIdentifier::from(addr);
    let count = state.counter.record_visit(&identifier).await?;
    let page = state.page.render(&identifier, count)?;

    info!(count, "Visit counted");
    Ok(Html(page))
}

/// Report whether the store answers.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.counter.store();
    let timestamp = chrono::Utc::now().to_rfc3339();

    match store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "store": store.backend_name(),
                "timestamp": timestamp,
            })),
        ),
        Err(e) => {
            error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "store": store.backend_name(),
                    "error": e.to_string(),
                    "timestamp": timestamp,
                })),
            )
        }
    }
}
