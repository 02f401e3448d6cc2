use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::products::{CreateProductRequest, InventoryAdjustRequest, ProductList, UpdateProductRequest},
    entity::categories::Entity as Categories,
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_seller_or_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    user: Option<&AuthUser>,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    // Inactive products are visible only on request, to admins anywhere
    // and to sellers within their own catalog.
    let include_inactive = query.include_inactive.unwrap_or(false);
    match user {
        Some(u) if include_inactive && u.role == "admin" => {}
        Some(u) if include_inactive && u.role == "seller" => {
            condition = condition.add(
                Condition::any()
                    .add(Column::IsActive.eq(true))
                    .add(Column::SellerId.eq(u.user_id)),
            );
        }
        _ => {
            condition = condition.add(Column::IsActive.eq(true));
        }
    }

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Title).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(category_id) = query.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Title => Column::Title,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let result = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(product_from_entity);
    match result {
        Some(p) => Ok(ApiResponse::success("Product", p, None)),
        None => Err(AppError::NotFound),
    }
}

/// Products owned by the calling seller, inactive ones included.
pub async fn list_my_products(
    state: &AppState,
    user: &AuthUser,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_seller_or_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let finder = Products::find()
        .filter(Column::SellerId.eq(user.user_id))
        .order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "My products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_seller_or_admin(user)?;
    if payload.price < 0 {
        return Err(AppError::BadRequest("price may not be negative".into()));
    }
    if payload.stock < 0 {
        return Err(AppError::BadRequest("stock may not be negative".into()));
    }
    if payload.title.trim().is_empty() {
        return Err(AppError::BadRequest("title may not be empty".into()));
    }

    let category = Categories::find_by_id(payload.category_id)
        .one(&state.orm)
        .await?;
    if category.is_none() {
        return Err(AppError::BadRequest("unknown category".into()));
    }

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        seller_id: Set(user.user_id),
        category_id: Set(payload.category_id),
        title: Set(payload.title),
        description: Set(payload.description),
        price: Set(payload.price),
        stock: Set(payload.stock),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let existing = find_owned(state, user, id).await?;

    if let Some(category_id) = payload.category_id {
        let category = Categories::find_by_id(category_id).one(&state.orm).await?;
        if category.is_none() {
            return Err(AppError::BadRequest("unknown category".into()));
        }
    }
    if payload.price.is_some_and(|p| p < 0) {
        return Err(AppError::BadRequest("price may not be negative".into()));
    }
    if payload.stock.is_some_and(|s| s < 0) {
        return Err(AppError::BadRequest("stock may not be negative".into()));
    }

    let mut active: ActiveModel = existing.into();
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(title) = payload.title {
        active.title = Set(title);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = find_owned(state, user, id).await?;

    // Order items snapshot the product, so a hard delete would break
    // nothing historical, but cart rows reference it. Deactivate instead.
    let mut active: ActiveModel = existing.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Active products at or below a stock threshold, scoped to the
/// caller's catalog unless they are an admin.
pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_seller_or_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();
    let threshold = query.threshold.unwrap_or(5).max(0);

    let mut condition = Condition::all()
        .add(Column::IsActive.eq(true))
        .add(Column::Stock.lte(threshold));
    if user.role != "admin" {
        condition = condition.add(Column::SellerId.eq(user.user_id));
    }

    let finder = Products::find()
        .filter(condition)
        .order_by_asc(Column::Stock);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Low stock",
        ProductList { items },
        Some(meta),
    ))
}

/// Apply a signed stock delta. Restocks and manual corrections both
/// land here; the result may never go below zero.
pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    let existing = find_owned(state, user, id).await?;

    // Guarded in-place update so concurrent adjustments cannot lose a
    // delta or take the stock below zero between read and write.
    let result = Products::update_many()
        .col_expr(Column::Stock, Expr::col(Column::Stock).add(payload.delta))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(Column::Id.eq(existing.id))
        .filter(Column::Stock.gte(-payload.delta))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::BadRequest(format!(
            "stock would go negative ({} {:+})",
            existing.stock, payload.delta
        )));
    }

    let product = match Products::find_by_id(id).one(&state.orm).await? {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "inventory_adjust",
        Some("products"),
        Some(serde_json::json!({ "product_id": id, "delta": payload.delta })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Inventory adjusted",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

/// Fetch a product the caller may modify: its seller, or an admin.
async fn find_owned(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ProductModel> {
    ensure_seller_or_admin(user)?;
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    if user.role != "admin" && existing.seller_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    Ok(existing)
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        seller_id: model.seller_id,
        category_id: model.category_id,
        title: model.title,
        description: model.description,
        price: model.price,
        stock: model.stock,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
