use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::products::{
        CreateProductRequest, InventoryAdjustRequest, ProductList, UpdateProductRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Product,
    response::ApiResponse,
    routes::params::{LowStockQuery, ProductQuery},
    services::product_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/mine", get(list_my_products))
        .route("/low-stock", get(list_low_stock))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/{id}/inventory", patch(adjust_inventory))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Title/description search"),
        ("category_id" = Option<Uuid>, Query, description = "Filter by category"),
        ("min_price" = Option<i64>, Query, description = "Minimum price in cents"),
        ("max_price" = Option<i64>, Query, description = "Maximum price in cents"),
        ("sort_by" = Option<String>, Query, description = "created_at | price | title"),
        ("sort_order" = Option<String>, Query, description = "asc | desc"),
        ("include_inactive" = Option<bool>, Query, description = "Staff only"),
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>),
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(
        product_service::list_products(&state, user.as_ref(), query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/products/mine",
    responses(
        (status = 200, description = "The caller's products", body = ApiResponse<ProductList>),
        (status = 403, description = "Sellers only"),
    ),
    tag = "Products"
)]
pub async fn list_my_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(
        product_service::list_my_products(&state, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/products/low-stock",
    params(
        ("threshold" = Option<i32>, Query, description = "Stock threshold, default 5"),
    ),
    responses(
        (status = 200, description = "Products at or below the threshold", body = ApiResponse<ProductList>),
        (status = 403, description = "Sellers only"),
    ),
    tag = "Products"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(
        product_service::list_low_stock(&state, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(product_service::get_product(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 200, description = "Product created", body = ApiResponse<Product>),
        (status = 403, description = "Sellers only"),
    ),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        product_service::create_product(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated product", body = ApiResponse<Product>),
        (status = 403, description = "Not the product's seller"),
    ),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        product_service::update_product(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Deactivated"),
        (status = 403, description = "Not the product's seller"),
    ),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(
        product_service::delete_product(&state, &user, id).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/products/{id}/inventory",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = InventoryAdjustRequest,
    responses(
        (status = 200, description = "Adjusted product", body = ApiResponse<Product>),
        (status = 400, description = "Stock would go negative"),
    ),
    tag = "Products"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<InventoryAdjustRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        product_service::adjust_inventory(&state, &user, id, payload).await?,
    ))
}
