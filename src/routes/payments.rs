use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::payments::{
        ConfirmPaymentRequest, CreateIntentRequest, CreateMethodRequest, CreateRefundRequest,
        IntentResponse, MethodList, PaymentList, RefundList, RefundResponse, UpdateMethodRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Payment, PaymentMethod},
    response::ApiResponse,
    routes::params::PaymentListQuery,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments))
        .route("/intents", post(create_intent))
        .route("/confirm", post(confirm_payment))
        .route("/refunds", post(create_refund))
        .route("/methods", get(list_methods).post(create_method))
        .route(
            "/methods/{id}",
            axum::routing::put(update_method).delete(delete_method),
        )
        .route("/webhooks/{provider}", post(webhook))
        .route("/{id}", get(get_payment))
        .route("/{id}/refunds", get(list_refunds))
}

#[utoipa::path(
    get,
    path = "/api/payments",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by payment status"),
    ),
    responses(
        (status = 200, description = "The caller's payments (all for admins)", body = ApiResponse<PaymentList>),
    ),
    tag = "Payments"
)]
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PaymentListQuery>,
) -> AppResult<Json<ApiResponse<PaymentList>>> {
    Ok(Json(
        payment_service::list_payments(&state, &user, query).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/payments/intents",
    request_body = CreateIntentRequest,
    responses(
        (status = 200, description = "Intent created", body = ApiResponse<IntentResponse>),
        (status = 400, description = "Amount does not match the order total"),
        (status = 409, description = "Order already paid"),
    ),
    tag = "Payments"
)]
pub async fn create_intent(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateIntentRequest>,
) -> AppResult<Json<ApiResponse<IntentResponse>>> {
    Ok(Json(
        payment_service::create_intent(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/payments/confirm",
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Confirmed payment", body = ApiResponse<Payment>),
        (status = 404, description = "Unknown intent"),
        (status = 409, description = "Payment already settled"),
    ),
    tag = "Payments"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    Ok(Json(
        payment_service::confirm_payment(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Get payment", body = ApiResponse<Payment>),
        (status = 404, description = "Payment not found"),
    ),
    tag = "Payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    Ok(Json(payment_service::get_payment(&state, &user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/payments/refunds",
    request_body = CreateRefundRequest,
    responses(
        (status = 200, description = "Refund processed", body = ApiResponse<RefundResponse>),
        (status = 400, description = "Amount exceeds the refundable remainder"),
        (status = 409, description = "Payment not refundable"),
    ),
    tag = "Payments"
)]
pub async fn create_refund(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateRefundRequest>,
) -> AppResult<Json<ApiResponse<RefundResponse>>> {
    Ok(Json(
        payment_service::create_refund(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}/refunds",
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Refunds for the payment", body = ApiResponse<RefundList>),
    ),
    tag = "Payments"
)]
pub async fn list_refunds(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RefundList>>> {
    Ok(Json(payment_service::list_refunds(&state, &user, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/payments/methods",
    responses(
        (status = 200, description = "The caller's saved methods", body = ApiResponse<MethodList>),
    ),
    tag = "Payments"
)]
pub async fn list_methods(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<MethodList>>> {
    Ok(Json(payment_service::list_methods(&state, &user).await?))
}

#[utoipa::path(
    post,
    path = "/api/payments/methods",
    request_body = CreateMethodRequest,
    responses(
        (status = 200, description = "Method saved", body = ApiResponse<PaymentMethod>),
    ),
    tag = "Payments"
)]
pub async fn create_method(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateMethodRequest>,
) -> AppResult<Json<ApiResponse<PaymentMethod>>> {
    Ok(Json(
        payment_service::create_method(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/payments/methods/{id}",
    params(("id" = Uuid, Path, description = "Payment method ID")),
    request_body = UpdateMethodRequest,
    responses(
        (status = 200, description = "Updated method", body = ApiResponse<PaymentMethod>),
    ),
    tag = "Payments"
)]
pub async fn update_method(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMethodRequest>,
) -> AppResult<Json<ApiResponse<PaymentMethod>>> {
    Ok(Json(
        payment_service::update_method(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/payments/methods/{id}",
    params(("id" = Uuid, Path, description = "Payment method ID")),
    responses(
        (status = 200, description = "Method removed"),
    ),
    tag = "Payments"
)]
pub async fn delete_method(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(payment_service::delete_method(&state, &user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/payments/webhooks/{provider}",
    params(("provider" = String, Path, description = "Gateway name")),
    responses(
        (status = 200, description = "Event applied or acknowledged"),
        (status = 401, description = "Signature check failed"),
    ),
    tag = "Payments"
)]
pub async fn webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let signature = headers
        .get("x-webhook-signature")
        .and_then(|v| v.to_str().ok());
    Ok(Json(
        payment_service::handle_webhook(&state, &provider, signature, payload).await?,
    ))
}
