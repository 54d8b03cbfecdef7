//! REST surface of the orders service.

use axum::extract::{FromRef, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rumbo_core::{DriverId, OrderId, OrderStatus};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::{AuthUser, JwtVerifier};
use crate::error::OrdersError;
use crate::models::{OrderResponse, UpdateOrderRequest};
use crate::repo;
use crate::service::OrderService;

/// Shared router state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The order service.
    pub service: OrderService,
    /// Token verifier for the API.
    pub verifier: JwtVerifier,
}

impl FromRef<AppState> for JwtVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/orders", post(create_order))
        .route("/api/v1/orders/{order_id}", get(get_order).put(update_order))
        .route("/api/v1/orders/status/{status}", get(list_by_status))
        .route("/api/v1/orders/driver/{driver_id}", get(list_by_driver))
        .route("/health", get(health))
        .with_state(state)
}

/// API failure, mapped to a status code and a `detail` body.
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Orders(OrdersError),
}

impl From<OrdersError> for ApiError {
    fn from(error: OrdersError) -> Self {
        ApiError::Orders(error)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> Self {
        ApiError::Orders(OrdersError::Database(error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::Orders(error) => {
                let status = match &error {
                    OrdersError::NotFound => StatusCode::NOT_FOUND,
                    OrdersError::TransitionForbidden { .. }
                    | OrdersError::ConcurrentModification => StatusCode::CONFLICT,
                    OrdersError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
                    OrdersError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    OrdersError::Broker(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, error.to_string())
            },
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("'{raw}' is not a valid order id")))
}

async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<rumbo_core::OrderPayload>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    info!(user_id = %user.user_id, tipo_servicio = %payload.tipo_servicio, "creating order");
    let order = state.service.create_order(&payload).await?;
    let items = repo::get_items(state.service.pool(), order.id_pedido).await?;
    Ok((
        StatusCode::CREATED,
        Json(OrderResponse {
            order,
            items_pedido: items,
        }),
    ))
}

async fn get_order(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&order_id)?;
    let order = repo::get_order(state.service.pool(), order_id)
        .await?
        .ok_or(OrdersError::NotFound)?;
    let items = repo::get_items(state.service.pool(), order_id).await?;
    Ok(Json(OrderResponse {
        order,
        items_pedido: items,
    }))
}

async fn list_by_status(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(status): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<crate::models::OrderRecord>>, ApiError> {
    let status: OrderStatus = status
        .parse()
        .map_err(|_| ApiError::Orders(OrdersError::InvalidStatus(status.clone())))?;
    let orders =
        repo::list_by_status(state.service.pool(), status, page.skip, page.limit).await?;
    Ok(Json(orders))
}

async fn list_by_driver(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(driver_id): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<crate::models::OrderRecord>>, ApiError> {
    let driver_id: DriverId = driver_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("'{driver_id}' is not a valid driver id")))?;
    let orders =
        repo::list_by_driver(state.service.pool(), driver_id, page.skip, page.limit).await?;
    Ok(Json(orders))
}

async fn update_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<String>,
    Json(update): Json<UpdateOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&order_id)?;
    info!(user_id = %user.user_id, order_id = %order_id, "updating order");
    let order = state.service.update_order(order_id, &update).await?;
    let items = repo::get_items(state.service.pool(), order_id).await?;
    Ok(Json(OrderResponse {
        order,
        items_pedido: items,
    }))
}

async fn health(State(state): State<AppState>) -> Response {
    if state.service.pool().acquire().await.is_ok() {
        (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded" })),
        )
            .into_response()
    }
}
