use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::payments::{
        ConfirmPaymentRequest, CreateIntentRequest, CreateMethodRequest, CreateRefundRequest,
        IntentResponse, MethodList, PaymentList, RefundList, RefundResponse, UpdateMethodRequest,
    },
    entity::orders::{ActiveModel as OrderActive, Model as OrderModel},
    entity::payment_methods::{
        ActiveModel as MethodActive, Column as MethodColumn, Entity as PaymentMethods,
        Model as MethodModel,
    },
    entity::payment_refunds::{
        ActiveModel as RefundActive, Column as RefundColumn, Entity as PaymentRefunds,
        Model as RefundModel,
    },
    entity::payments::{
        ActiveModel as PaymentActive, Column, Entity as Payments, Model as PaymentModel,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Payment, PaymentMethod, PaymentRefund},
    response::{ApiResponse, Meta},
    routes::params::PaymentListQuery,
    services::order_service,
    state::AppState,
    status,
};

pub(crate) struct IntentOutcome {
    pub payment: Payment,
    pub requires_action: bool,
    pub action_url: Option<String>,
}

/// Open a gateway intent for an order and record it.
///
/// Any earlier non-terminal intent on the same order is cancelled first
/// so at most one intent is ever live per order.
pub(crate) async fn open_intent(
    state: &AppState,
    user_id: Uuid,
    order: &OrderModel,
    payment_method: &str,
    payment_provider: &str,
    customer_email: Option<String>,
) -> AppResult<IntentOutcome> {
    let provider = state.providers.get(payment_provider)?;

    let stale = Payments::find()
        .filter(Column::OrderId.eq(order.id))
        .all(&state.orm)
        .await?;
    for payment in stale {
        if !status::payment_is_terminal(&payment.status) {
            let mut active: PaymentActive = payment.into();
            active.status = Set("cancelled".into());
            active.updated_at = Set(Utc::now().into());
            active.update(&state.orm).await?;
        }
    }

    let result = provider
        .create_intent(
            order.total_amount,
            &state.config.currency,
            payment_method,
            customer_email.as_deref(),
            serde_json::json!({
                "order_id": order.id,
                "order_number": order.order_number,
            }),
        )
        .await;

    let payment_id = Uuid::new_v4();
    let status = if !result.success {
        "failed"
    } else if result.requires_action {
        "pending"
    } else {
        "processing"
    };

    let active = PaymentActive {
        id: Set(payment_id),
        user_id: Set(user_id),
        order_id: Set(order.id),
        payment_number: Set(build_payment_number(payment_id)),
        amount: Set(order.total_amount),
        currency: Set(state.config.currency.clone()),
        payment_method: Set(payment_method.to_string()),
        payment_provider: Set(provider.name().to_string()),
        status: Set(status.to_string()),
        provider_payment_id: Set(result.payment_id.clone()),
        provider_transaction_id: Set(result.transaction_id.clone()),
        client_secret: Set(result.client_secret.clone()),
        failure_reason: Set(result.error_message.clone()),
        created_at: NotSet,
        updated_at: NotSet,
        completed_at: Set(None),
    };
    let payment = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user_id),
        "payment_intent",
        Some("payments"),
        Some(serde_json::json!({
            "payment_id": payment.id,
            "order_id": order.id,
            "provider": provider.name(),
            "success": result.success,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(IntentOutcome {
        payment: payment_from_entity(payment),
        requires_action: result.requires_action,
        action_url: result.action_url,
    })
}

pub async fn create_intent(
    state: &AppState,
    user: &AuthUser,
    payload: CreateIntentRequest,
) -> AppResult<ApiResponse<IntentResponse>> {
    let order = order_service::find_order(state, payload.order_id).await?;
    if order.user_id != user.user_id && user.role != "admin" {
        return Err(AppError::Forbidden);
    }
    if order.payment_status == "paid" {
        return Err(AppError::Conflict("order is already paid".into()));
    }
    if order.status == "cancelled" {
        return Err(AppError::Conflict("order is cancelled".into()));
    }
    if payload.amount != order.total_amount {
        return Err(AppError::BadRequest(format!(
            "amount {} does not match the order total {}",
            payload.amount, order.total_amount
        )));
    }
    if let Some(currency) = payload.currency.as_ref() {
        if !currency.eq_ignore_ascii_case(&state.config.currency) {
            return Err(AppError::BadRequest(format!(
                "unsupported currency '{currency}'"
            )));
        }
    }

    let outcome = open_intent(
        state,
        order.user_id,
        &order,
        &payload.payment_method,
        &payload.payment_provider,
        payload.customer_email,
    )
    .await?;

    Ok(ApiResponse::success(
        "Payment intent created",
        IntentResponse {
            payment: outcome.payment,
            requires_action: outcome.requires_action,
            action_url: outcome.action_url,
        },
        Some(Meta::empty()),
    ))
}

/// Confirm an intent with the gateway and settle the order on success.
pub async fn confirm_payment(
    state: &AppState,
    user: &AuthUser,
    payload: ConfirmPaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    let payment = Payments::find()
        .filter(Column::ProviderPaymentId.eq(payload.payment_intent_id.clone()))
        .one(&state.orm)
        .await?;
    let payment = match payment {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    if payment.user_id != user.user_id && user.role != "admin" {
        return Err(AppError::Forbidden);
    }
    if status::payment_is_terminal(&payment.status) {
        return Err(AppError::Conflict(format!(
            "payment is already '{}'",
            payment.status
        )));
    }

    let provider = state.providers.get(&payment.payment_provider)?;
    let result = provider
        .confirm(
            &payload.payment_intent_id,
            payload.payment_method_id.as_deref(),
        )
        .await;

    let payment = if result.success {
        settle_payment(state, payment, result.transaction_id).await?
    } else {
        let order_id = payment.order_id;
        let mut active: PaymentActive = payment.into();
        active.status = Set("failed".into());
        active.failure_reason = Set(result.error_message.clone());
        active.updated_at = Set(Utc::now().into());
        let payment = active.update(&state.orm).await?;

        let order = order_service::find_order(state, order_id).await?;
        if order.payment_status == "pending" {
            let mut order_active: OrderActive = order.into();
            order_active.payment_status = Set("failed".into());
            order_active.updated_at = Set(Utc::now().into());
            order_active.update(&state.orm).await?;
        }
        payment
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_confirm",
        Some("payments"),
        Some(serde_json::json!({ "payment_id": payment.id, "status": payment.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment confirmed",
        payment_from_entity(payment),
        Some(Meta::empty()),
    ))
}

pub async fn get_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Payment>> {
    let payment = find_owned(state, user, id).await?;
    Ok(ApiResponse::success(
        "Payment",
        payment_from_entity(payment),
        None,
    ))
}

pub async fn list_payments(
    state: &AppState,
    user: &AuthUser,
    query: PaymentListQuery,
) -> AppResult<ApiResponse<PaymentList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();
    if user.role != "admin" {
        condition = condition.add(Column::UserId.eq(user.user_id));
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Status.eq(status.clone()));
    }

    let finder = Payments::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(payment_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Payments",
        PaymentList { items },
        Some(meta),
    ))
}

/// Refund part or all of a completed payment through its gateway.
pub async fn create_refund(
    state: &AppState,
    user: &AuthUser,
    payload: CreateRefundRequest,
) -> AppResult<ApiResponse<RefundResponse>> {
    let payment = find_owned(state, user, payload.payment_id).await?;
    if !matches!(payment.status.as_str(), "completed" | "partially_refunded") {
        return Err(AppError::Conflict(format!(
            "payment in status '{}' cannot be refunded",
            payment.status
        )));
    }

    let refunded_so_far: i64 = PaymentRefunds::find()
        .filter(RefundColumn::PaymentId.eq(payment.id))
        .filter(RefundColumn::Status.eq("succeeded"))
        .all(&state.orm)
        .await?
        .iter()
        .map(|r| r.amount)
        .sum();
    let remaining = payment.amount - refunded_so_far;

    let amount = payload.amount.unwrap_or(remaining);
    if amount <= 0 {
        return Err(AppError::BadRequest("refund amount must be positive".into()));
    }
    if amount > remaining {
        return Err(AppError::BadRequest(format!(
            "refund amount {amount} exceeds the remaining {remaining}"
        )));
    }

    let provider = state.providers.get(&payment.payment_provider)?;
    let provider_payment_id = payment
        .provider_payment_id
        .clone()
        .ok_or_else(|| AppError::Conflict("payment has no gateway reference".into()))?;
    let result = provider
        .refund(&provider_payment_id, amount, Some(&payload.reason))
        .await;

    if !result.success {
        return Err(AppError::BadRequest(
            result
                .error_message
                .unwrap_or_else(|| "refund rejected by the gateway".into()),
        ));
    }

    let now = Utc::now();
    let refund_id = Uuid::new_v4();
    let refund = RefundActive {
        id: Set(refund_id),
        payment_id: Set(payment.id),
        user_id: Set(user.user_id),
        refund_number: Set(build_refund_number(refund_id)),
        amount: Set(amount),
        reason: Set(payload.reason.clone()),
        provider_refund_id: Set(result.refund_id.clone()),
        status: Set("succeeded".into()),
        created_at: NotSet,
        processed_at: Set(Some(now.into())),
    }
    .insert(&state.orm)
    .await?;

    let fully_refunded = refunded_so_far + amount >= payment.amount;
    let order_id = payment.order_id;
    let mut active: PaymentActive = payment.into();
    active.status = Set(if fully_refunded {
        "refunded".into()
    } else {
        "partially_refunded".into()
    });
    active.updated_at = Set(now.into());
    let payment = active.update(&state.orm).await?;

    if fully_refunded {
        let order = order_service::find_order(state, order_id).await?;
        let mut order_active: OrderActive = order.into();
        order_active.payment_status = Set("refunded".into());
        order_active.updated_at = Set(now.into());
        order_active.update(&state.orm).await?;
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_refund",
        Some("payments"),
        Some(serde_json::json!({ "payment_id": payment.id, "refund_id": refund.id, "amount": amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Refund processed",
        RefundResponse {
            refund: refund_from_entity(refund),
            payment: payment_from_entity(payment),
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_refunds(
    state: &AppState,
    user: &AuthUser,
    payment_id: Uuid,
) -> AppResult<ApiResponse<RefundList>> {
    let payment = find_owned(state, user, payment_id).await?;
    let items = PaymentRefunds::find()
        .filter(RefundColumn::PaymentId.eq(payment.id))
        .order_by_desc(RefundColumn::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(refund_from_entity)
        .collect();
    Ok(ApiResponse::success("Refunds", RefundList { items }, None))
}

pub async fn list_methods(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<MethodList>> {
    let items = PaymentMethods::find()
        .filter(MethodColumn::UserId.eq(user.user_id))
        .filter(MethodColumn::IsActive.eq(true))
        .order_by_desc(MethodColumn::IsDefault)
        .order_by_desc(MethodColumn::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(method_from_entity)
        .collect();
    Ok(ApiResponse::success(
        "Payment methods",
        MethodList { items },
        None,
    ))
}

pub async fn create_method(
    state: &AppState,
    user: &AuthUser,
    payload: CreateMethodRequest,
) -> AppResult<ApiResponse<PaymentMethod>> {
    let provider = state.providers.get(&payload.provider)?;
    let result = provider
        .create_method(serde_json::json!({
            "payment_method": payload.payment_method,
            "card": payload.card,
        }))
        .await;
    if !result.success {
        return Err(AppError::BadRequest(
            "payment method rejected by the gateway".into(),
        ));
    }

    let is_default = payload.is_default.unwrap_or(false);
    if is_default {
        clear_default(state, user.user_id).await?;
    }

    let active = MethodActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        payment_method: Set(payload.payment_method),
        provider: Set(provider.name().to_string()),
        card_last_four: Set(payload.card_last_four),
        card_brand: Set(payload.card_brand),
        provider_method_id: Set(result.provider_method_id),
        is_default: Set(is_default),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let method = active.insert(&state.orm).await?;

    Ok(ApiResponse::success(
        "Payment method saved",
        method_from_entity(method),
        Some(Meta::empty()),
    ))
}

pub async fn update_method(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateMethodRequest,
) -> AppResult<ApiResponse<PaymentMethod>> {
    let method = find_method(state, user, id).await?;

    if payload.is_default == Some(true) {
        clear_default(state, user.user_id).await?;
    }

    let mut active: MethodActive = method.into();
    if let Some(is_default) = payload.is_default {
        active.is_default = Set(is_default);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now().into());
    let method = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Payment method updated",
        method_from_entity(method),
        Some(Meta::empty()),
    ))
}

pub async fn delete_method(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let method = find_method(state, user, id).await?;

    // Soft delete keeps the row for payments that referenced it.
    let mut active: MethodActive = method.into();
    active.is_active = Set(false);
    active.is_default = Set(false);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Payment method removed",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Gateway callback: verify, normalize, and apply the status change.
pub async fn handle_webhook(
    state: &AppState,
    provider_name: &str,
    signature: Option<&str>,
    payload: serde_json::Value,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let provider = state.providers.get(provider_name)?;
    let raw = payload.to_string();
    if !provider.verify_webhook(&raw, signature) {
        return Err(AppError::Unauthorized);
    }

    let event = provider.parse_webhook(&payload);
    tracing::info!(
        provider = provider_name,
        event_type = %event.event_type,
        "webhook received"
    );

    let provider_payment_id = match event.payment_id {
        Some(id) => id,
        None => {
            // Events we cannot attribute are acknowledged and dropped.
            return Ok(ApiResponse::success(
                "Ignored",
                serde_json::json!({ "handled": false }),
                None,
            ));
        }
    };

    let payment = Payments::find()
        .filter(Column::ProviderPaymentId.eq(provider_payment_id))
        .one(&state.orm)
        .await?;
    let payment = match payment {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if status::payment_is_terminal(&payment.status) {
        return Ok(ApiResponse::success(
            "Ignored",
            serde_json::json!({ "handled": false }),
            None,
        ));
    }

    match event.status.as_str() {
        "succeeded" | "completed" | "COMPLETED" => {
            settle_payment(state, payment, None).await?;
        }
        "failed" | "FAILED" | "DENIED" => {
            let mut active: PaymentActive = payment.into();
            active.status = Set("failed".into());
            active.failure_reason = Set(Some(format!("gateway event: {}", event.event_type)));
            active.updated_at = Set(Utc::now().into());
            active.update(&state.orm).await?;
        }
        other => {
            tracing::debug!(status = other, "unhandled webhook status");
        }
    }

    Ok(ApiResponse::success(
        "OK",
        serde_json::json!({ "handled": true }),
        None,
    ))
}

/// Mark a payment completed and settle its order: payment status paid,
/// pending orders move to confirmed.
async fn settle_payment(
    state: &AppState,
    payment: PaymentModel,
    transaction_id: Option<String>,
) -> AppResult<PaymentModel> {
    let now = Utc::now();
    let order_id = payment.order_id;

    let mut active: PaymentActive = payment.into();
    active.status = Set("completed".into());
    if let Some(txn_id) = transaction_id {
        active.provider_transaction_id = Set(Some(txn_id));
    }
    active.failure_reason = Set(None);
    active.completed_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let payment = active.update(&state.orm).await?;

    let order = order_service::find_order(state, order_id).await?;
    let move_to_confirmed = order.status == "pending";
    let mut order_active: OrderActive = order.into();
    order_active.payment_status = Set("paid".into());
    if move_to_confirmed {
        order_active.status = Set("confirmed".into());
    }
    order_active.updated_at = Set(now.into());
    order_active.update(&state.orm).await?;

    Ok(payment)
}

async fn find_owned(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<PaymentModel> {
    let payment = Payments::find_by_id(id).one(&state.orm).await?;
    match payment {
        Some(p) if p.user_id == user.user_id || user.role == "admin" => Ok(p),
        Some(_) => Err(AppError::Forbidden),
        None => Err(AppError::NotFound),
    }
}

async fn find_method(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<MethodModel> {
    let method = PaymentMethods::find_by_id(id).one(&state.orm).await?;
    match method {
        Some(m) if m.user_id == user.user_id => Ok(m),
        Some(_) => Err(AppError::Forbidden),
        None => Err(AppError::NotFound),
    }
}

async fn clear_default(state: &AppState, user_id: Uuid) -> AppResult<()> {
    PaymentMethods::update_many()
        .col_expr(MethodColumn::IsDefault, Expr::value(false))
        .filter(MethodColumn::UserId.eq(user_id))
        .filter(MethodColumn::IsDefault.eq(true))
        .exec(&state.orm)
        .await?;
    Ok(())
}

fn build_payment_number(id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let tail = id.simple().to_string()[..8].to_uppercase();
    format!("PAY-{date}-{tail}")
}

fn build_refund_number(id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let tail = id.simple().to_string()[..8].to_uppercase();
    format!("REF-{date}-{tail}")
}

pub(crate) fn payment_from_entity(model: PaymentModel) -> Payment {
    Payment {
        id: model.id,
        user_id: model.user_id,
        order_id: model.order_id,
        payment_number: model.payment_number,
        amount: model.amount,
        currency: model.currency,
        payment_method: model.payment_method,
        payment_provider: model.payment_provider,
        status: model.status,
        provider_payment_id: model.provider_payment_id,
        provider_transaction_id: model.provider_transaction_id,
        client_secret: model.client_secret,
        failure_reason: model.failure_reason,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
        completed_at: model.completed_at.map(|t| t.with_timezone(&Utc)),
    }
}

fn refund_from_entity(model: RefundModel) -> PaymentRefund {
    PaymentRefund {
        id: model.id,
        payment_id: model.payment_id,
        user_id: model.user_id,
        refund_number: model.refund_number,
        amount: model.amount,
        reason: model.reason,
        provider_refund_id: model.provider_refund_id,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
        processed_at: model.processed_at.map(|t| t.with_timezone(&Utc)),
    }
}

fn method_from_entity(model: MethodModel) -> PaymentMethod {
    PaymentMethod {
        id: model.id,
        user_id: model.user_id,
        payment_method: model.payment_method,
        provider: model.provider,
        card_last_four: model.card_last_four,
        card_brand: model.card_brand,
        provider_method_id: model.provider_method_id,
        is_default: model.is_default,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
