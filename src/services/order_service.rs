use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType, Query};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        CreateOrderRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest,
        UpdatePaymentStatusRequest,
    },
    entity::order_items::{
        ActiveModel as OrderItemActive, Column as OrderItemColumn, Entity as OrderItems,
        Model as OrderItemModel,
    },
    entity::orders::{ActiveModel as OrderActive, Column, Entity as Orders, Model as OrderModel},
    entity::products::{Column as ProductColumn, Entity as Products},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_seller_or_admin},
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
    status,
};

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    // Buyers see their own orders, sellers the orders that carry one of
    // their products, admins everything.
    if user.role == "seller" {
        condition = condition.add(Column::Id.in_subquery(
            Query::select()
                .column(OrderItemColumn::OrderId)
                .from(OrderItems)
                .and_where(Expr::col(OrderItemColumn::ProductId).in_subquery(
                    Query::select()
                        .column(ProductColumn::Id)
                        .from(Products)
                        .and_where(Expr::col(ProductColumn::SellerId).eq(user.user_id))
                        .to_owned(),
                ))
                .to_owned(),
        ));
    } else if user.role != "admin" {
        condition = condition.add(Column::UserId.eq(user.user_id));
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        status::validate_order_status(status)?;
        condition = condition.add(Column::Status.eq(status.clone()));
    }
    if let Some(payment_status) = query.payment_status.as_ref().filter(|s| !s.is_empty()) {
        status::validate_order_payment_status(payment_status)?;
        condition = condition.add(Column::PaymentStatus.eq(payment_status.clone()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(Column::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(Column::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let (order, items) = find_visible(state, user, id).await?;
    Ok(ApiResponse::success(
        "Order",
        OrderWithItems {
            order: order_from_entity(order),
            items: items.into_iter().map(order_item_from_entity).collect(),
        },
        None,
    ))
}

/// Place an order from explicit lines, bypassing the cart.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("order has no items".into()));
    }
    if payload.shipping_address.trim().is_empty() {
        return Err(AppError::BadRequest("shipping address is required".into()));
    }
    for line in &payload.items {
        if line.quantity <= 0 {
            return Err(AppError::BadRequest(
                "quantity must be greater than 0".into(),
            ));
        }
    }

    let txn = state.orm.begin().await?;

    let ids: Vec<Uuid> = payload.items.iter().map(|l| l.product_id).collect();
    let products = Products::find()
        .filter(ProductColumn::Id.is_in(ids))
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    let mut subtotal: i64 = 0;
    let mut lines = Vec::with_capacity(payload.items.len());
    for line in &payload.items {
        let product = match products.iter().find(|p| p.id == line.product_id) {
            Some(p) => p,
            None => {
                return Err(AppError::BadRequest(format!(
                    "product {} not found",
                    line.product_id
                )));
            }
        };
        if !product.is_active {
            return Err(AppError::Conflict(format!(
                "'{}' is no longer available",
                product.title
            )));
        }
        if product.stock < line.quantity {
            return Err(AppError::Conflict(format!(
                "insufficient stock for '{}' ({} left)",
                product.title, product.stock
            )));
        }
        subtotal += product.price * line.quantity as i64;
        lines.push((product.clone(), line.quantity));
    }

    let tax_amount = subtotal * state.config.tax_rate_bps / 10_000;
    let shipping_cost = state.config.shipping_cost;

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        order_number: Set(build_order_number(order_id)),
        status: Set("pending".into()),
        payment_status: Set("pending".into()),
        subtotal: Set(subtotal),
        tax_amount: Set(tax_amount),
        shipping_cost: Set(shipping_cost),
        total_amount: Set(subtotal + tax_amount + shipping_cost),
        shipping_address: Set(payload.shipping_address),
        billing_address: Set(payload.billing_address),
        shipping_notes: Set(payload.shipping_notes),
        shipped_at: Set(None),
        delivered_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for (product, quantity) in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            product_name: Set(product.title.clone()),
            product_price: Set(product.price),
            quantity: Set(*quantity),
            subtotal: Set(product.price * *quantity as i64),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));

        let result = Products::update_many()
            .col_expr(
                ProductColumn::Stock,
                Expr::col(ProductColumn::Stock).sub(*quantity),
            )
            .filter(ProductColumn::Id.eq(product.id))
            .filter(ProductColumn::Stock.gte(*quantity))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::Conflict(format!(
                "insufficient stock for '{}'",
                product.title
            )));
        }
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Cancel an order that has not shipped and put its stock back.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = find_order(state, id).await?;
    let allowed = order.user_id == user.user_id
        || user.role == "admin"
        || (user.role == "seller" && seller_on_order(state, user, order.id).await?);
    if !allowed {
        return Err(AppError::Forbidden);
    }
    restock_cancelled(state, user, order).await
}

/// Shared cancel body: eligibility check, stock restore, status flip.
/// Callers have already authorized the user for this order.
async fn restock_cancelled(
    state: &AppState,
    user: &AuthUser,
    order: OrderModel,
) -> AppResult<ApiResponse<Order>> {
    if !status::order_can_cancel(&order.status) {
        return Err(AppError::Conflict(format!(
            "order in status '{}' cannot be cancelled",
            order.status
        )));
    }

    let txn = state.orm.begin().await?;

    let items = OrderItems::find()
        .filter(OrderItemColumn::OrderId.eq(order.id))
        .all(&txn)
        .await?;
    for item in &items {
        Products::update_many()
            .col_expr(
                ProductColumn::Stock,
                Expr::col(ProductColumn::Stock).add(item.quantity),
            )
            .filter(ProductColumn::Id.eq(item.product_id))
            .exec(&txn)
            .await?;
    }

    let mut active: OrderActive = order.into();
    active.status = Set("cancelled".into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order cancelled",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_seller_or_admin(user)?;
    status::validate_order_status(&payload.status)?;

    let order = find_order(state, id).await?;
    // Sellers may only move orders that carry one of their products.
    if user.role != "admin" && !seller_on_order(state, user, order.id).await? {
        return Err(AppError::Forbidden);
    }
    if !status::order_can_transition(&order.status, &payload.status) {
        return Err(AppError::Conflict(format!(
            "cannot move order from '{}' to '{}'",
            order.status, payload.status
        )));
    }

    // Cancelling through here restores stock like the cancel endpoint.
    if payload.status == "cancelled" {
        return restock_cancelled(state, user, order).await;
    }

    let now = Utc::now();
    let mut active: OrderActive = order.into();
    match payload.status.as_str() {
        "shipped" => active.shipped_at = Set(Some(now.into())),
        "delivered" => active.delivered_at = Set(Some(now.into())),
        _ => {}
    }
    active.status = Set(payload.status.clone());
    active.updated_at = Set(now.into());
    let order = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": payload.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Status updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Manual payment-status override, for reconciling out-of-band payments.
pub async fn update_payment_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePaymentStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    status::validate_order_payment_status(&payload.payment_status)?;

    let order = find_order(state, id).await?;
    let mut active: OrderActive = order.into();
    active.payment_status = Set(payload.payment_status.clone());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_payment_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "payment_status": payload.payment_status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment status updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub(crate) async fn find_order(state: &AppState, id: Uuid) -> AppResult<OrderModel> {
    match Orders::find_by_id(id).one(&state.orm).await? {
        Some(o) => Ok(o),
        None => Err(AppError::NotFound),
    }
}

/// Owner and admin always see the order; a seller sees it when one of
/// their products is on it.
async fn find_visible(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<(OrderModel, Vec<OrderItemModel>)> {
    let order = find_order(state, id).await?;
    let items = OrderItems::find()
        .filter(OrderItemColumn::OrderId.eq(order.id))
        .order_by_asc(OrderItemColumn::CreatedAt)
        .all(&state.orm)
        .await?;

    if order.user_id == user.user_id || user.role == "admin" {
        return Ok((order, items));
    }
    if user.role == "seller" && seller_on_order(state, user, order.id).await? {
        return Ok((order, items));
    }
    Err(AppError::Forbidden)
}

/// Does the seller own at least one product on the order?
async fn seller_on_order(state: &AppState, user: &AuthUser, order_id: Uuid) -> AppResult<bool> {
    let items = OrderItems::find()
        .filter(OrderItemColumn::OrderId.eq(order_id))
        .all(&state.orm)
        .await?;
    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let owned = Products::find()
        .filter(ProductColumn::Id.is_in(product_ids))
        .filter(ProductColumn::SellerId.eq(user.user_id))
        .count(&state.orm)
        .await?;
    Ok(owned > 0)
}

pub(crate) fn build_order_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let tail = order_id.simple().to_string()[..8].to_uppercase();
    format!("ORD-{date}-{tail}")
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        order_number: model.order_number,
        status: model.status,
        payment_status: model.payment_status,
        subtotal: model.subtotal,
        tax_amount: model.tax_amount,
        shipping_cost: model.shipping_cost,
        total_amount: model.total_amount,
        shipping_address: model.shipping_address,
        billing_address: model.billing_address,
        shipping_notes: model.shipping_notes,
        shipped_at: model.shipped_at.map(|t| t.with_timezone(&Utc)),
        delivered_at: model.delivered_at.map(|t| t.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name: model.product_name,
        product_price: model.product_price,
        quantity: model.quantity,
        subtotal: model.subtotal,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
