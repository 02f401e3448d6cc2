use sea_orm::sea_query::{Expr, LockType};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, FromQueryResult, QueryFilter, QuerySelect,
    RelationTrait, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{CheckoutRequest, CheckoutResponse},
    entity::cart_items::{Column as CartItemColumn, Entity as CartItems},
    entity::carts::{ActiveModel as CartActive, Column as CartColumn, Entity as Carts},
    entity::order_items::ActiveModel as OrderItemActive,
    entity::orders::ActiveModel as OrderActive,
    entity::products::{Column as ProductColumn, Entity as Products},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::OrderItem,
    response::{ApiResponse, Meta},
    services::order_service::{build_order_number, order_from_entity, order_item_from_entity},
    services::payment_service,
    state::AppState,
};

#[derive(Debug, FromQueryResult)]
struct CartProductRow {
    product_id: Uuid,
    quantity: i32,
    title: String,
    price: i64,
    stock: i32,
    is_active: bool,
}

/// Turn the caller's cart into an order and open a payment intent.
///
/// The order is committed before any provider call: a rejected or
/// unreachable provider leaves a payable order behind rather than
/// rolling the whole purchase back.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    if payload.shipping_address.trim().is_empty() {
        return Err(AppError::BadRequest("shipping address is required".into()));
    }
    // Fail on an unknown provider before touching stock.
    state.providers.get(&payload.payment_provider)?;

    let cart = match Carts::find()
        .filter(CartColumn::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
    {
        Some(c) => c,
        None => return Err(AppError::BadRequest("cart is empty".into())),
    };

    let txn = state.orm.begin().await?;

    // Lock the product rows for the whole read-validate-decrement span
    // so concurrent checkouts serialize on shared products.
    let rows = CartItems::find()
        .select_only()
        .column(CartItemColumn::ProductId)
        .column(CartItemColumn::Quantity)
        .column(ProductColumn::Title)
        .column(ProductColumn::Price)
        .column(ProductColumn::Stock)
        .column(ProductColumn::IsActive)
        .join(
            sea_orm::JoinType::InnerJoin,
            crate::entity::cart_items::Relation::Products.def(),
        )
        .filter(CartItemColumn::CartId.eq(cart.id))
        .lock(LockType::Update)
        .into_model::<CartProductRow>()
        .all(&txn)
        .await?;

    if rows.is_empty() {
        return Err(AppError::BadRequest("cart is empty".into()));
    }

    let mut subtotal: i64 = 0;
    for row in &rows {
        if row.quantity <= 0 {
            return Err(AppError::BadRequest("cart has an invalid quantity".into()));
        }
        if !row.is_active {
            return Err(AppError::Conflict(format!(
                "'{}' is no longer available",
                row.title
            )));
        }
        if row.stock < row.quantity {
            return Err(AppError::Conflict(format!(
                "insufficient stock for '{}' ({} left)",
                row.title, row.stock
            )));
        }
        subtotal += row.price * row.quantity as i64;
    }

    let tax_amount = subtotal * state.config.tax_rate_bps / 10_000;
    let shipping_cost = state.config.shipping_cost;
    let total_amount = subtotal + tax_amount + shipping_cost;

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
        total_amount: Set(total_amount),
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

    let mut order_items: Vec<OrderItem> = Vec::new();
    for row in &rows {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(row.product_id),
            product_name: Set(row.title.clone()),
            product_price: Set(row.price),
            quantity: Set(row.quantity),
            subtotal: Set(row.price * row.quantity as i64),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        order_items.push(order_item_from_entity(item));

        // Conditional decrement: even under the lock this refuses to go
        // negative if anything slipped past the validation read.
        let result = Products::update_many()
            .col_expr(
                ProductColumn::Stock,
                Expr::col(ProductColumn::Stock).sub(row.quantity),
            )
            .filter(ProductColumn::Id.eq(row.product_id))
            .filter(ProductColumn::Stock.gte(row.quantity))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::Conflict(format!(
                "insufficient stock for '{}'",
                row.title
            )));
        }
    }

    CartItems::delete_many()
        .filter(CartItemColumn::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    let mut cart_active: CartActive = cart.into();
    cart_active.total_price = Set(0);
    cart_active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total_amount": total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    // The order survives a provider error; payment is retried through
    // the payments resource.
    let (payment, requires_action, action_url) = match payment_service::open_intent(
        state,
        user.user_id,
        &order,
        &payload.payment_method,
        &payload.payment_provider,
        None,
    )
    .await
    {
        Ok(outcome) => (Some(outcome.payment), outcome.requires_action, outcome.action_url),
        Err(err) => {
            tracing::warn!(error = %err, order_id = %order.id, "payment intent failed at checkout");
            (None, false, None)
        }
    };

    Ok(ApiResponse::success(
        "Order placed",
        CheckoutResponse {
            order: order_from_entity(order),
            items: order_items,
            payment,
            requires_action,
            action_url,
        },
        Some(Meta::empty()),
    ))
}
