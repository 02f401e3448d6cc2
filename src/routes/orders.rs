use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        CreateOrderRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest,
        UpdatePaymentStatusRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/{id}", get(get_order))
        .route("/{id}/cancel", post(cancel_order))
        .route("/{id}/status", patch(update_status))
        .route("/{id}/payment-status", patch(update_payment_status))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
        ("payment_status" = Option<String>, Query, description = "Filter by payment status"),
        ("sort_order" = Option<String>, Query, description = "asc | desc"),
    ),
    responses(
        (status = 200, description = "The caller's orders (all orders for admins)", body = ApiResponse<OrderList>),
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    Ok(Json(order_service::list_orders(&state, &user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with its lines", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found"),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    Ok(Json(order_service::get_order(&state, &user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created", body = ApiResponse<OrderWithItems>),
        (status = 409, description = "Not enough stock"),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    Ok(Json(
        order_service::create_order(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Cancelled order", body = ApiResponse<Order>),
        (status = 409, description = "Order already shipped"),
    ),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(order_service::cancel_order(&state, &user, id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Updated order", body = ApiResponse<Order>),
        (status = 409, description = "Transition not allowed"),
        (status = 403, description = "Not a seller on the order"),
    ),
    tag = "Orders"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(
        order_service::update_status(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/payment-status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdatePaymentStatusRequest,
    responses(
        (status = 200, description = "Updated order", body = ApiResponse<Order>),
        (status = 403, description = "Admin only"),
    ),
    tag = "Orders"
)]
pub async fn update_payment_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePaymentStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(
        order_service::update_payment_status(&state, &user, id, payload).await?,
    ))
}
