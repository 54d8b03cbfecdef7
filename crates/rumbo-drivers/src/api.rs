//! REST surface of the driver service.

use std::sync::Arc;

use axum::extract::{FromRef, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rumbo_core::OrderId;
use rumbo_session::LocationIndex;
use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use crate::accept::AcceptanceService;
use crate::auth::{AuthDriver, DriverTokenVerifier};
use crate::error::DriverError;
use crate::models::StatusUpdateRequest;
use crate::registry::PushRegistry;
use crate::repo;
use crate::ws;

/// Shared router state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Driver store.
    pub pool: PgPool,
    /// Live push channels.
    pub registry: Arc<PushRegistry>,
    /// Acceptance arbitration.
    pub accept: AcceptanceService,
    /// Driver token verifier.
    pub verifier: DriverTokenVerifier,
    /// Driver location index.
    pub locations: LocationIndex,
}

impl FromRef<AppState> for DriverTokenVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/drivers/me", get(me))
        .route("/api/v1/drivers/me/status", post(update_status))
        .route(
            "/api/v1/drivers/me/services/{order_id}/accept",
            post(accept_service),
        )
        .route("/ws/drivers/location", get(ws::location_ws))
        .route("/health", get(health))
        .with_state(state)
}

struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<DriverError> for ApiError {
    fn from(error: DriverError) -> Self {
        let status = match &error {
            DriverError::NotFound => StatusCode::BAD_REQUEST,
            DriverError::NotEligible
            | DriverError::NotAvailable { .. }
            | DriverError::RaceLost => StatusCode::FORBIDDEN,
            DriverError::PublishFailed(_) | DriverError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        };
        Self {
            status,
            detail: error.to_string(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

async fn me(
    State(state): State<AppState>,
    AuthDriver(driver_id): AuthDriver,
) -> Result<Json<crate::models::DriverRecord>, ApiError> {
    let driver = repo::get_driver(&state.pool, driver_id)
        .await?
        .ok_or(DriverError::NotFound)?;
    Ok(Json(driver))
}

async fn update_status(
    State(state): State<AppState>,
    AuthDriver(driver_id): AuthDriver,
    Json(update): Json<StatusUpdateRequest>,
) -> Result<Json<crate::models::DriverRecord>, ApiError> {
    info!(driver_id = %driver_id, nuevo_estado = %update.nuevo_estado, "availability change");
    let driver = repo::set_availability(&state.pool, driver_id, update.nuevo_estado)
        .await?
        .ok_or(DriverError::NotFound)?;
    Ok(Json(driver))
}

async fn accept_service(
    State(state): State<AppState>,
    AuthDriver(driver_id): AuthDriver,
    Path(order_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let order_id: OrderId = order_id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("'{order_id}' is not a valid order id")))?;

    info!(driver_id = %driver_id, order_id = %order_id, "driver accepting service");
    state.accept.accept(driver_id, order_id).await?;

    Ok(Json(json!({
        "mensaje": format!(
            "Servicio {order_id} aceptado. Notificando al sistema de pedidos."
        ),
        "id_pedido_aceptado": order_id.to_string(),
    })))
}

async fn health(State(state): State<AppState>) -> Response {
    if state.pool.acquire().await.is_ok() {
        (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded" })),
        )
            .into_response()
    }
}
