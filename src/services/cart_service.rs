use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{
        AddCartItemRequest, CartItemDetail, CartValidation, CartWithItems, CheckoutSummary,
        SummaryLine, UpdateCartItemRequest,
    },
    entity::cart_items::{
        ActiveModel as CartItemActive, Column as CartItemColumn, Entity as CartItems,
        Model as CartItemModel,
    },
    entity::carts::{ActiveModel as CartActive, Column as CartColumn, Entity as Carts, Model as CartModel},
    entity::products::Entity as Products,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Cart,
    response::{ApiResponse, Meta},
    services::product_service::product_from_entity,
    state::AppState,
};

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartWithItems>> {
    let cart = get_or_create_cart(state, user.user_id).await?;
    let items = load_items(state, cart.id).await?;
    Ok(ApiResponse::success(
        "Cart",
        CartWithItems {
            cart: cart_from_entity(cart),
            items,
        },
        None,
    ))
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddCartItemRequest,
) -> AppResult<ApiResponse<CartWithItems>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?;
    let product = match product {
        Some(p) if p.is_active => p,
        Some(_) => return Err(AppError::BadRequest("product is not available".into())),
        None => return Err(AppError::BadRequest("product not found".into())),
    };

    let cart = get_or_create_cart(state, user.user_id).await?;

    let existing = CartItems::find()
        .filter(CartItemColumn::CartId.eq(cart.id))
        .filter(CartItemColumn::ProductId.eq(payload.product_id))
        .one(&state.orm)
        .await?;

    // A second add of the same product merges into the existing line.
    let quantity = match &existing {
        Some(line) => line.quantity + payload.quantity,
        None => payload.quantity,
    };
    if quantity > product.stock {
        return Err(AppError::BadRequest(format!(
            "only {} in stock for '{}'",
            product.stock, product.title
        )));
    }
    let subtotal = product.price * quantity as i64;

    match existing {
        Some(line) => {
            let mut active: CartItemActive = line.into();
            active.quantity = Set(quantity);
            active.subtotal_price = Set(subtotal);
            active.update(&state.orm).await?;
        }
        None => {
            let active = CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(payload.product_id),
                quantity: Set(quantity),
                subtotal_price: Set(subtotal),
                added_at: NotSet,
            };
            active.insert(&state.orm).await?;
        }
    }

    let cart = recompute_total(state, cart).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add_item",
        Some("carts"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let items = load_items(state, cart.id).await?;
    Ok(ApiResponse::success(
        "Item added",
        CartWithItems {
            cart: cart_from_entity(cart),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartWithItems>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0; remove the item instead".to_string(),
        ));
    }

    let cart = get_or_create_cart(state, user.user_id).await?;
    let line = find_line(state, &cart, item_id).await?;

    let product = Products::find_by_id(line.product_id).one(&state.orm).await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    if payload.quantity > product.stock {
        return Err(AppError::BadRequest(format!(
            "only {} in stock for '{}'",
            product.stock, product.title
        )));
    }

    let mut active: CartItemActive = line.into();
    active.quantity = Set(payload.quantity);
    active.subtotal_price = Set(product.price * payload.quantity as i64);
    active.update(&state.orm).await?;

    let cart = recompute_total(state, cart).await?;
    let items = load_items(state, cart.id).await?;
    Ok(ApiResponse::success(
        "Item updated",
        CartWithItems {
            cart: cart_from_entity(cart),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<CartWithItems>> {
    let cart = get_or_create_cart(state, user.user_id).await?;
    let line = find_line(state, &cart, item_id).await?;
    line.delete(&state.orm).await?;

    let cart = recompute_total(state, cart).await?;
    let items = load_items(state, cart.id).await?;
    Ok(ApiResponse::success(
        "Item removed",
        CartWithItems {
            cart: cart_from_entity(cart),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CartWithItems>> {
    let cart = get_or_create_cart(state, user.user_id).await?;
    CartItems::delete_many()
        .filter(CartItemColumn::CartId.eq(cart.id))
        .exec(&state.orm)
        .await?;

    let cart = recompute_total(state, cart).await?;
    Ok(ApiResponse::success(
        "Cart cleared",
        CartWithItems {
            cart: cart_from_entity(cart),
            items: Vec::new(),
        },
        Some(Meta::empty()),
    ))
}

/// Totals preview with the same tax and shipping math checkout uses.
pub async fn checkout_summary(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CheckoutSummary>> {
    let cart = get_or_create_cart(state, user.user_id).await?;
    let rows = CartItems::find()
        .filter(CartItemColumn::CartId.eq(cart.id))
        .order_by_asc(CartItemColumn::AddedAt)
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    if rows.is_empty() {
        return Err(AppError::BadRequest("cart is empty".into()));
    }

    let mut lines = Vec::with_capacity(rows.len());
    let mut subtotal: i64 = 0;
    let mut total_quantity: i64 = 0;
    for (line, product) in rows {
        let product = match product {
            Some(p) => p,
            None => return Err(AppError::Internal(anyhow::anyhow!("cart line lost its product"))),
        };
        let line_subtotal = product.price * line.quantity as i64;
        subtotal += line_subtotal;
        total_quantity += line.quantity as i64;
        lines.push(SummaryLine {
            product_id: product.id,
            product_name: product.title,
            price: product.price,
            quantity: line.quantity,
            subtotal: line_subtotal,
        });
    }

    let tax_rate_bps = state.config.tax_rate_bps;
    let tax_amount = subtotal * tax_rate_bps / 10_000;
    let shipping_cost = state.config.shipping_cost;
    let item_count = lines.len();

    Ok(ApiResponse::success(
        "Checkout summary",
        CheckoutSummary {
            cart_id: cart.id,
            items: lines,
            subtotal,
            tax_rate_bps,
            tax_amount,
            shipping_cost,
            total: subtotal + tax_amount + shipping_cost,
            item_count,
            total_quantity,
        },
        None,
    ))
}

/// Dry-run stock and availability check before checkout.
pub async fn validate_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CartValidation>> {
    let cart = get_or_create_cart(state, user.user_id).await?;
    let rows = CartItems::find()
        .filter(CartItemColumn::CartId.eq(cart.id))
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if rows.is_empty() {
        errors.push("cart is empty".to_string());
    }

    for (line, product) in &rows {
        match product {
            None => errors.push(format!("product {} no longer exists", line.product_id)),
            Some(p) if !p.is_active => {
                errors.push(format!("'{}' is no longer available", p.title))
            }
            Some(p) if line.quantity > p.stock => errors.push(format!(
                "'{}' has only {} in stock (cart has {})",
                p.title, p.stock, line.quantity
            )),
            Some(p) if p.stock <= 5 => {
                warnings.push(format!("'{}' is low on stock ({})", p.title, p.stock))
            }
            Some(_) => {}
        }
    }

    let item_count = rows.len();
    Ok(ApiResponse::success(
        "Cart validation",
        CartValidation {
            valid: errors.is_empty(),
            errors,
            warnings,
            item_count,
        },
        None,
    ))
}

/// Every user has exactly one cart; registration seeds it, but a row
/// may be missing for accounts created out of band.
pub(crate) async fn get_or_create_cart(state: &AppState, user_id: Uuid) -> AppResult<CartModel> {
    let existing = Carts::find()
        .filter(CartColumn::UserId.eq(user_id))
        .one(&state.orm)
        .await?;
    if let Some(cart) = existing {
        return Ok(cart);
    }

    let active = CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total_price: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    };
    Ok(active.insert(&state.orm).await?)
}

async fn find_line(state: &AppState, cart: &CartModel, item_id: Uuid) -> AppResult<CartItemModel> {
    let line = CartItems::find_by_id(item_id).one(&state.orm).await?;
    match line {
        Some(l) if l.cart_id == cart.id => Ok(l),
        Some(_) => Err(AppError::Forbidden),
        None => Err(AppError::NotFound),
    }
}

async fn recompute_total(state: &AppState, cart: CartModel) -> AppResult<CartModel> {
    let lines = CartItems::find()
        .filter(CartItemColumn::CartId.eq(cart.id))
        .all(&state.orm)
        .await?;
    let total: i64 = lines.iter().map(|l| l.subtotal_price).sum();

    let mut active: CartActive = cart.into();
    active.total_price = Set(total);
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(&state.orm).await?)
}

async fn load_items(state: &AppState, cart_id: Uuid) -> AppResult<Vec<CartItemDetail>> {
    let rows = CartItems::find()
        .filter(CartItemColumn::CartId.eq(cart_id))
        .order_by_asc(CartItemColumn::AddedAt)
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for (line, product) in rows {
        let product = match product {
            Some(p) => p,
            None => continue,
        };
        items.push(CartItemDetail {
            id: line.id,
            product: product_from_entity(product),
            quantity: line.quantity,
            subtotal_price: line.subtotal_price,
        });
    }
    Ok(items)
}

pub(crate) fn cart_from_entity(model: CartModel) -> Cart {
    Cart {
        id: model.id,
        user_id: model.user_id,
        total_price: model.total_price,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
