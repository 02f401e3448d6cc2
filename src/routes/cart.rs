use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::cart::{
        AddCartItemRequest, CartValidation, CartWithItems, CheckoutRequest, CheckoutResponse,
        CheckoutSummary, UpdateCartItemRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::{cart_service, checkout_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/{item_id}", put(update_item))
        .route("/items/{item_id}", delete(remove_item))
        .route("/summary", get(checkout_summary))
        .route("/validate", get(validate_cart))
        .route("/checkout", post(checkout))
}

#[utoipa::path(
    get,
    path = "/api/carts",
    responses(
        (status = 200, description = "The caller's cart", body = ApiResponse<CartWithItems>),
    ),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartWithItems>>> {
    Ok(Json(cart_service::get_cart(&state, &user).await?))
}

#[utoipa::path(
    post,
    path = "/api/carts/items",
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<CartWithItems>),
        (status = 400, description = "Unknown product or not enough stock"),
    ),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartWithItems>>> {
    Ok(Json(cart_service::add_item(&state, &user, payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/carts/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart item ID")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<CartWithItems>),
        (status = 404, description = "Item not in the caller's cart"),
    ),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartWithItems>>> {
    Ok(Json(
        cart_service::update_item(&state, &user, item_id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/carts/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart item ID")),
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<CartWithItems>),
    ),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartWithItems>>> {
    Ok(Json(cart_service::remove_item(&state, &user, item_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/carts",
    responses(
        (status = 200, description = "Emptied cart", body = ApiResponse<CartWithItems>),
    ),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartWithItems>>> {
    Ok(Json(cart_service::clear_cart(&state, &user).await?))
}

#[utoipa::path(
    get,
    path = "/api/carts/summary",
    responses(
        (status = 200, description = "Totals preview", body = ApiResponse<CheckoutSummary>),
        (status = 400, description = "Cart is empty"),
    ),
    tag = "Cart"
)]
pub async fn checkout_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CheckoutSummary>>> {
    Ok(Json(cart_service::checkout_summary(&state, &user).await?))
}

#[utoipa::path(
    get,
    path = "/api/carts/validate",
    responses(
        (status = 200, description = "Stock and availability check", body = ApiResponse<CartValidation>),
    ),
    tag = "Cart"
)]
pub async fn validate_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartValidation>>> {
    Ok(Json(cart_service::validate_cart(&state, &user).await?))
}

#[utoipa::path(
    post,
    path = "/api/carts/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Order placed", body = ApiResponse<CheckoutResponse>),
        (status = 400, description = "Empty cart or bad provider"),
        (status = 409, description = "Stock ran out"),
    ),
    tag = "Cart"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<ApiResponse<CheckoutResponse>>> {
    Ok(Json(checkout_service::checkout(&state, &user, payload).await?))
}
