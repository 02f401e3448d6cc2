use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::dashboard::{
        AdminDashboard, CreateInvoiceRequest, InvoiceList, InvoiceWithItems, SellerDashboard,
        UpdateInvoiceStatusRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Invoice,
    response::ApiResponse,
    routes::params::{DashboardQuery, InvoiceListQuery},
    services::{dashboard_service, invoice_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/seller", get(seller_dashboard))
        .route("/admin", get(admin_dashboard))
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route("/invoices/{id}", get(get_invoice))
        .route("/invoices/{id}/status", put(update_invoice_status))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/seller",
    params(
        ("days" = Option<i64>, Query, description = "Analytics window in days, default 30"),
    ),
    responses(
        (status = 200, description = "Seller metrics", body = ApiResponse<SellerDashboard>),
        (status = 403, description = "Sellers only"),
    ),
    tag = "Dashboard"
)]
pub async fn seller_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<ApiResponse<SellerDashboard>>> {
    Ok(Json(
        dashboard_service::seller_dashboard(&state, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/admin",
    params(
        ("days" = Option<i64>, Query, description = "Analytics window in days, default 30"),
    ),
    responses(
        (status = 200, description = "Platform metrics", body = ApiResponse<AdminDashboard>),
        (status = 403, description = "Admin only"),
    ),
    tag = "Dashboard"
)]
pub async fn admin_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<ApiResponse<AdminDashboard>>> {
    Ok(Json(
        dashboard_service::admin_dashboard(&state, &user, query).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/invoices",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 200, description = "Invoice created", body = ApiResponse<InvoiceWithItems>),
        (status = 409, description = "Order unpaid or already invoiced"),
    ),
    tag = "Dashboard"
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateInvoiceRequest>,
) -> AppResult<Json<ApiResponse<InvoiceWithItems>>> {
    Ok(Json(
        invoice_service::create_invoice(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/invoices",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by invoice status"),
    ),
    responses(
        (status = 200, description = "Invoices visible to the caller", body = ApiResponse<InvoiceList>),
    ),
    tag = "Dashboard"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<InvoiceListQuery>,
) -> AppResult<Json<ApiResponse<InvoiceList>>> {
    Ok(Json(
        invoice_service::list_invoices(&state, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice with its lines", body = ApiResponse<InvoiceWithItems>),
        (status = 404, description = "Invoice not found"),
    ),
    tag = "Dashboard"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<InvoiceWithItems>>> {
    Ok(Json(invoice_service::get_invoice(&state, &user, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/dashboard/invoices/{id}/status",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    request_body = UpdateInvoiceStatusRequest,
    responses(
        (status = 200, description = "Updated invoice", body = ApiResponse<Invoice>),
        (status = 403, description = "Not the issuing seller"),
    ),
    tag = "Dashboard"
)]
pub async fn update_invoice_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateInvoiceStatusRequest>,
) -> AppResult<Json<ApiResponse<Invoice>>> {
    Ok(Json(
        invoice_service::update_status(&state, &user, id, payload).await?,
    ))
}
