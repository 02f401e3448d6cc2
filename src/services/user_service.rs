use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::users::{UpdateUserRequest, UserList},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_self_or_admin},
    models::User,
    response::{ApiResponse, Meta},
    routes::params::UserListQuery,
    state::AppState,
};

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let items: Vec<User> = if let Some(role) = query.role.as_ref().filter(|r| !r.is_empty()) {
        sqlx::query_as(
            "SELECT * FROM users WHERE role = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(role)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.pool)
        .await?
    } else {
        sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&state.pool)
            .await?
    };

    let total: (i64,) = if let Some(role) = query.role.as_ref().filter(|r| !r.is_empty()) {
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role)
            .fetch_one(&state.pool)
            .await?
    } else {
        sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&state.pool)
            .await?
    };

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn get_user(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<User>> {
    ensure_self_or_admin(user, id)?;
    let found: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    match found {
        Some(u) => Ok(ApiResponse::success("OK", u, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn update_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_self_or_admin(user, id)?;

    // Role, activation and verification changes are an admin concern.
    let touches_admin_fields =
        payload.role.is_some() || payload.is_active.is_some() || payload.is_verified.is_some();
    if touches_admin_fields {
        ensure_admin(user)?;
    }
    if let Some(role) = payload.role.as_deref() {
        if !matches!(role, "user" | "seller" | "admin") {
            return Err(AppError::BadRequest(format!("Invalid role '{role}'")));
        }
    }

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let updated: User = sqlx::query_as(
        r#"
        UPDATE users
        SET full_name = $2, phone_number = $3, address = $4,
            role = $5, is_active = $6, is_verified = $7, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.full_name.unwrap_or(existing.full_name))
    .bind(payload.phone_number.or(existing.phone_number))
    .bind(payload.address.or(existing.address))
    .bind(payload.role.unwrap_or(existing.role))
    .bind(payload.is_active.unwrap_or(existing.is_active))
    .bind(payload.is_verified.unwrap_or(existing.is_verified))
    .fetch_one(&state.pool)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "user_update",
        Some("users"),
        Some(serde_json::json!({ "target_user_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Updated", updated, Some(Meta::empty())))
}

pub async fn delete_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    if user.user_id == id {
        return Err(AppError::BadRequest(
            "admins cannot delete their own account".into(),
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "user_delete",
        Some("users"),
        Some(serde_json::json!({ "target_user_id": id })),
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

/// Public directory of active sellers.
pub async fn list_sellers(
    state: &AppState,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let items: Vec<User> = sqlx::query_as(
        r#"
        SELECT * FROM users
        WHERE role = 'seller' AND is_active
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'seller' AND is_active")
            .fetch_one(&state.pool)
            .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Sellers",
        UserList { items },
        Some(meta),
    ))
}
