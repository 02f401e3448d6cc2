use chrono::{Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::dashboard::{
        CreateInvoiceRequest, InvoiceList, InvoiceWithItems, UpdateInvoiceStatusRequest,
    },
    entity::invoice_items::{
        ActiveModel as InvoiceItemActive, Column as InvoiceItemColumn, Entity as InvoiceItems,
        Model as InvoiceItemModel,
    },
    entity::invoices::{
        ActiveModel as InvoiceActive, Column, Entity as Invoices, Model as InvoiceModel,
    },
    entity::order_items::{Column as OrderItemColumn, Entity as OrderItems},
    entity::orders::{Column as OrderColumn, Entity as Orders},
    entity::products::{Column as ProductColumn, Entity as Products},
    entity::users::Entity as Users,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_seller_or_admin},
    models::{Invoice, InvoiceItem},
    response::{ApiResponse, Meta},
    routes::params::InvoiceListQuery,
    services::order_service,
    state::AppState,
    status,
};

/// Issue an invoice for the calling seller's share of an order.
///
/// Line items and addresses are snapshotted so later edits to the user
/// or product records leave issued invoices untouched.
pub async fn create_invoice(
    state: &AppState,
    user: &AuthUser,
    payload: CreateInvoiceRequest,
) -> AppResult<ApiResponse<InvoiceWithItems>> {
    ensure_seller_or_admin(user)?;
    let order = order_service::find_order(state, payload.order_id).await?;
    if order.payment_status != "paid" {
        return Err(AppError::Conflict("order is not paid yet".into()));
    }

    let lines = OrderItems::find()
        .filter(OrderItemColumn::OrderId.eq(order.id))
        .all(&state.orm)
        .await?;
    let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    let owned_products = Products::find()
        .filter(ProductColumn::Id.is_in(product_ids))
        .filter(ProductColumn::SellerId.eq(user.user_id))
        .all(&state.orm)
        .await?;
    if owned_products.is_empty() {
        return Err(AppError::Forbidden);
    }
    let owned: Vec<_> = lines
        .iter()
        .filter(|l| owned_products.iter().any(|p| p.id == l.product_id))
        .collect();

    let existing = Invoices::find()
        .filter(Column::OrderId.eq(order.id))
        .filter(Column::SellerId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "an invoice for this order already exists".into(),
        ));
    }

    let customer = Users::find_by_id(order.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let seller = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let subtotal: i64 = owned.iter().map(|l| l.subtotal).sum();
    let tax_amount = subtotal * state.config.tax_rate_bps / 10_000;
    let now = Utc::now();
    let due_days = payload.due_days.unwrap_or(30).clamp(1, 365);

    let txn = state.orm.begin().await?;

    let invoice_id = Uuid::new_v4();
    let invoice = InvoiceActive {
        id: Set(invoice_id),
        invoice_number: Set(build_invoice_number(invoice_id)),
        order_id: Set(order.id),
        seller_id: Set(user.user_id),
        status: Set("draft".into()),
        issue_date: Set(now.into()),
        due_date: Set((now + Duration::days(due_days)).into()),
        paid_date: Set(None),
        subtotal: Set(subtotal),
        tax_amount: Set(tax_amount),
        total_amount: Set(subtotal + tax_amount),
        customer_name: Set(customer.full_name.clone()),
        customer_email: Set(customer.email.clone()),
        customer_address: Set(order.shipping_address.clone()),
        seller_name: Set(seller.full_name.clone()),
        seller_email: Set(seller.email.clone()),
        seller_address: Set(seller.address.clone()),
        notes: Set(None),
        terms: Set(Some(format!("Payment due within {due_days} days"))),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(owned.len());
    for line in owned {
        let item = InvoiceItemActive {
            id: Set(Uuid::new_v4()),
            invoice_id: Set(invoice.id),
            product_name: Set(line.product_name.clone()),
            unit_price: Set(line.product_price),
            quantity: Set(line.quantity),
            total_price: Set(line.subtotal),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(invoice_item_from_entity(item));
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "invoice_create",
        Some("invoices"),
        Some(serde_json::json!({ "invoice_id": invoice.id, "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Invoice created",
        InvoiceWithItems {
            invoice: invoice_from_entity(invoice),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_invoices(
    state: &AppState,
    user: &AuthUser,
    query: InvoiceListQuery,
) -> AppResult<ApiResponse<InvoiceList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    match user.role.as_str() {
        "admin" => {}
        "seller" => condition = condition.add(Column::SellerId.eq(user.user_id)),
        _ => {
            // Customers see the invoices issued against their orders.
            let order_ids: Vec<Uuid> = Orders::find()
                .filter(OrderColumn::UserId.eq(user.user_id))
                .all(&state.orm)
                .await?
                .into_iter()
                .map(|o| o.id)
                .collect();
            condition = condition.add(Column::OrderId.is_in(order_ids));
        }
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        status::validate_invoice_status(status)?;
        condition = condition.add(Column::Status.eq(status.clone()));
    }

    let finder = Invoices::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(invoice_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Invoices",
        InvoiceList { items },
        Some(meta),
    ))
}

pub async fn get_invoice(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<InvoiceWithItems>> {
    let invoice = find_visible(state, user, id).await?;
    let items = InvoiceItems::find()
        .filter(InvoiceItemColumn::InvoiceId.eq(invoice.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(invoice_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Invoice",
        InvoiceWithItems {
            invoice: invoice_from_entity(invoice),
            items,
        },
        None,
    ))
}

pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateInvoiceStatusRequest,
) -> AppResult<ApiResponse<Invoice>> {
    status::validate_invoice_status(&payload.status)?;
    let invoice = match Invoices::find_by_id(id).one(&state.orm).await? {
        Some(i) => i,
        None => return Err(AppError::NotFound),
    };
    if invoice.seller_id != user.user_id && user.role != "admin" {
        return Err(AppError::Forbidden);
    }

    let now = Utc::now();
    let mut active: InvoiceActive = invoice.into();
    if payload.status == "paid" {
        active.paid_date = Set(Some(now.into()));
    }
    active.status = Set(payload.status.clone());
    active.updated_at = Set(now.into());
    let invoice = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "invoice_status_update",
        Some("invoices"),
        Some(serde_json::json!({ "invoice_id": invoice.id, "status": payload.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Status updated",
        invoice_from_entity(invoice),
        Some(Meta::empty()),
    ))
}

async fn find_visible(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<InvoiceModel> {
    let invoice = match Invoices::find_by_id(id).one(&state.orm).await? {
        Some(i) => i,
        None => return Err(AppError::NotFound),
    };
    if invoice.seller_id == user.user_id || user.role == "admin" {
        return Ok(invoice);
    }
    let order = order_service::find_order(state, invoice.order_id).await?;
    if order.user_id == user.user_id {
        return Ok(invoice);
    }
    Err(AppError::Forbidden)
}

fn build_invoice_number(id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let tail = id.simple().to_string()[..8].to_uppercase();
    format!("INV-{date}-{tail}")
}

fn invoice_from_entity(model: InvoiceModel) -> Invoice {
    Invoice {
        id: model.id,
        invoice_number: model.invoice_number,
        order_id: model.order_id,
        seller_id: model.seller_id,
        status: model.status,
        issue_date: model.issue_date.with_timezone(&Utc),
        due_date: model.due_date.with_timezone(&Utc),
        paid_date: model.paid_date.map(|t| t.with_timezone(&Utc)),
        subtotal: model.subtotal,
        tax_amount: model.tax_amount,
        total_amount: model.total_amount,
        customer_name: model.customer_name,
        customer_email: model.customer_email,
        customer_address: model.customer_address,
        seller_name: model.seller_name,
        seller_email: model.seller_email,
        seller_address: model.seller_address,
        notes: model.notes,
        terms: model.terms,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn invoice_item_from_entity(model: InvoiceItemModel) -> InvoiceItem {
    InvoiceItem {
        id: model.id,
        invoice_id: model.invoice_id,
        product_name: model.product_name,
        unit_price: model.unit_price,
        quantity: model.quantity,
        total_price: model.total_price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
