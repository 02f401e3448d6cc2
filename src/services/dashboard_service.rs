//! Seller and admin analytics, all raw SQL aggregates.
//!
//! Revenue only counts paid orders; window filters apply to the order's
//! creation date.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    dto::dashboard::{
        AdminDashboard, RecentOrder, RevenuePoint, SellerDashboard, TopProduct, TopSeller,
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin, ensure_seller_or_admin},
    response::ApiResponse,
    routes::params::DashboardQuery,
    state::AppState,
};

#[derive(FromRow)]
struct RecentOrderRow {
    id: Uuid,
    order_number: String,
    status: String,
    payment_status: String,
    total_amount: i64,
    customer_name: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct BreakdownRow {
    key: String,
    count: i64,
}

#[derive(FromRow)]
struct RevenueRow {
    date: String,
    revenue: i64,
}

pub async fn seller_dashboard(
    state: &AppState,
    user: &AuthUser,
    query: DashboardQuery,
) -> AppResult<ApiResponse<SellerDashboard>> {
    ensure_seller_or_admin(user)?;
    let days = query.window();
    let seller_id = user.user_id;

    let total_products: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM products WHERE seller_id = $1")
            .bind(seller_id)
            .fetch_one(&state.pool)
            .await?;

    // Orders that contain at least one of the seller's products.
    let total_orders: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(DISTINCT o.id)
        FROM orders o
        JOIN order_items oi ON oi.order_id = o.id
        JOIN products p ON p.id = oi.product_id
        WHERE p.seller_id = $1 AND o.created_at >= now() - make_interval(days => $2::int)
        "#,
    )
    .bind(seller_id)
    .bind(days)
    .fetch_one(&state.pool)
    .await?;

    // Seller revenue is their line subtotals, not the whole order total.
    let total_revenue: (Option<i64>,) = sqlx::query_as(
        r#"
        SELECT SUM(oi.subtotal)
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        JOIN products p ON p.id = oi.product_id
        WHERE p.seller_id = $1
          AND o.payment_status = 'paid'
          AND o.created_at >= now() - make_interval(days => $2::int)
        "#,
    )
    .bind(seller_id)
    .bind(days)
    .fetch_one(&state.pool)
    .await?;

    let pending_orders: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(DISTINCT o.id)
        FROM orders o
        JOIN order_items oi ON oi.order_id = o.id
        JOIN products p ON p.id = oi.product_id
        WHERE p.seller_id = $1 AND o.status IN ('pending', 'confirmed', 'processing')
        "#,
    )
    .bind(seller_id)
    .fetch_one(&state.pool)
    .await?;

    let recent_orders = sqlx::query_as::<_, RecentOrderRow>(
        r#"
        SELECT DISTINCT o.id, o.order_number, o.status, o.payment_status,
               o.total_amount, u.full_name AS customer_name, o.created_at
        FROM orders o
        JOIN users u ON u.id = o.user_id
        JOIN order_items oi ON oi.order_id = o.id
        JOIN products p ON p.id = oi.product_id
        WHERE p.seller_id = $1
        ORDER BY o.created_at DESC
        LIMIT 10
        "#,
    )
    .bind(seller_id)
    .fetch_all(&state.pool)
    .await?;

    let top_products = sqlx::query_as::<_, TopProductRow>(
        r#"
        SELECT p.id, p.title,
               COALESCE(SUM(oi.quantity), 0) AS total_sold,
               COALESCE(SUM(oi.subtotal), 0) AS total_revenue
        FROM products p
        JOIN order_items oi ON oi.product_id = p.id
        JOIN orders o ON o.id = oi.order_id
        WHERE p.seller_id = $1
          AND o.payment_status = 'paid'
          AND o.created_at >= now() - make_interval(days => $2::int)
        GROUP BY p.id, p.title
        ORDER BY total_revenue DESC
        LIMIT 5
        "#,
    )
    .bind(seller_id)
    .bind(days)
    .fetch_all(&state.pool)
    .await?;

    let revenue_by_day = sqlx::query_as::<_, RevenueRow>(
        r#"
        SELECT to_char(o.created_at, 'YYYY-MM-DD') AS date,
               COALESCE(SUM(oi.subtotal), 0) AS revenue
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        JOIN products p ON p.id = oi.product_id
        WHERE p.seller_id = $1
          AND o.payment_status = 'paid'
          AND o.created_at >= now() - make_interval(days => $2::int)
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(seller_id)
    .bind(days)
    .fetch_all(&state.pool)
    .await?;

    let order_status_breakdown = sqlx::query_as::<_, BreakdownRow>(
        r#"
        SELECT o.status AS key, COUNT(DISTINCT o.id) AS count
        FROM orders o
        JOIN order_items oi ON oi.order_id = o.id
        JOIN products p ON p.id = oi.product_id
        WHERE p.seller_id = $1
        GROUP BY o.status
        "#,
    )
    .bind(seller_id)
    .fetch_all(&state.pool)
    .await?;

    let payment_status_breakdown = sqlx::query_as::<_, BreakdownRow>(
        r#"
        SELECT o.payment_status AS key, COUNT(DISTINCT o.id) AS count
        FROM orders o
        JOIN order_items oi ON oi.order_id = o.id
        JOIN products p ON p.id = oi.product_id
        WHERE p.seller_id = $1
        GROUP BY o.payment_status
        "#,
    )
    .bind(seller_id)
    .fetch_all(&state.pool)
    .await?;

    let data = SellerDashboard {
        total_products: total_products.0,
        total_orders: total_orders.0,
        total_revenue: total_revenue.0.unwrap_or(0),
        pending_orders: pending_orders.0,
        recent_orders: recent_orders.into_iter().map(recent_order).collect(),
        top_products: top_products
            .into_iter()
            .map(|r| TopProduct {
                id: r.id,
                title: r.title,
                total_sold: r.total_sold,
                total_revenue: r.total_revenue,
            })
            .collect(),
        revenue_by_day: revenue_by_day.into_iter().map(revenue_point).collect(),
        order_status_breakdown: breakdown(order_status_breakdown),
        payment_status_breakdown: breakdown(payment_status_breakdown),
    };

    Ok(ApiResponse::success("Seller dashboard", data, None))
}

pub async fn admin_dashboard(
    state: &AppState,
    user: &AuthUser,
    query: DashboardQuery,
) -> AppResult<ApiResponse<AdminDashboard>> {
    ensure_admin(user)?;
    let days = query.window();

    let total_users: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.pool)
        .await?;
    let total_sellers: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'seller'")
            .fetch_one(&state.pool)
            .await?;
    let total_products: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
        .fetch_one(&state.pool)
        .await?;
    let total_orders: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders WHERE created_at >= now() - make_interval(days => $1::int)",
    )
    .bind(days)
    .fetch_one(&state.pool)
    .await?;
    let total_revenue: (Option<i64>,) = sqlx::query_as(
        r#"
        SELECT SUM(total_amount) FROM orders
        WHERE payment_status = 'paid'
          AND created_at >= now() - make_interval(days => $1::int)
        "#,
    )
    .bind(days)
    .fetch_one(&state.pool)
    .await?;

    let recent_orders = sqlx::query_as::<_, RecentOrderRow>(
        r#"
        SELECT o.id, o.order_number, o.status, o.payment_status,
               o.total_amount, u.full_name AS customer_name, o.created_at
        FROM orders o
        JOIN users u ON u.id = o.user_id
        ORDER BY o.created_at DESC
        LIMIT 10
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let top_sellers = sqlx::query_as::<_, TopSellerRow>(
        r#"
        SELECT u.id, u.full_name AS name,
               COALESCE(SUM(oi.subtotal), 0) AS total_revenue,
               COUNT(DISTINCT o.id) AS total_orders
        FROM users u
        JOIN products p ON p.seller_id = u.id
        JOIN order_items oi ON oi.product_id = p.id
        JOIN orders o ON o.id = oi.order_id
        WHERE o.payment_status = 'paid'
          AND o.created_at >= now() - make_interval(days => $1::int)
        GROUP BY u.id, u.full_name
        ORDER BY total_revenue DESC
        LIMIT 5
        "#,
    )
    .bind(days)
    .fetch_all(&state.pool)
    .await?;

    let revenue_by_day = sqlx::query_as::<_, RevenueRow>(
        r#"
        SELECT to_char(created_at, 'YYYY-MM-DD') AS date,
               COALESCE(SUM(total_amount), 0) AS revenue
        FROM orders
        WHERE payment_status = 'paid'
          AND created_at >= now() - make_interval(days => $1::int)
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(days)
    .fetch_all(&state.pool)
    .await?;

    let order_status_breakdown = sqlx::query_as::<_, BreakdownRow>(
        "SELECT status AS key, COUNT(*) AS count FROM orders GROUP BY status",
    )
    .fetch_all(&state.pool)
    .await?;

    let payment_status_breakdown = sqlx::query_as::<_, BreakdownRow>(
        "SELECT payment_status AS key, COUNT(*) AS count FROM orders GROUP BY payment_status",
    )
    .fetch_all(&state.pool)
    .await?;

    let data = AdminDashboard {
        total_users: total_users.0,
        total_sellers: total_sellers.0,
        total_products: total_products.0,
        total_orders: total_orders.0,
        total_revenue: total_revenue.0.unwrap_or(0),
        recent_orders: recent_orders.into_iter().map(recent_order).collect(),
        top_sellers: top_sellers
            .into_iter()
            .map(|r| TopSeller {
                id: r.id,
                name: r.name,
                total_revenue: r.total_revenue,
                total_orders: r.total_orders,
            })
            .collect(),
        revenue_by_day: revenue_by_day.into_iter().map(revenue_point).collect(),
        order_status_breakdown: breakdown(order_status_breakdown),
        payment_status_breakdown: breakdown(payment_status_breakdown),
    };

    Ok(ApiResponse::success("Admin dashboard", data, None))
}

#[derive(FromRow)]
struct TopProductRow {
    id: Uuid,
    title: String,
    total_sold: i64,
    total_revenue: i64,
}

#[derive(FromRow)]
struct TopSellerRow {
    id: Uuid,
    name: String,
    total_revenue: i64,
    total_orders: i64,
}

fn recent_order(row: RecentOrderRow) -> RecentOrder {
    RecentOrder {
        id: row.id,
        order_number: row.order_number,
        status: row.status,
        payment_status: row.payment_status,
        total_amount: row.total_amount,
        customer_name: row.customer_name,
        created_at: row.created_at,
    }
}

fn revenue_point(row: RevenueRow) -> RevenuePoint {
    RevenuePoint {
        date: row.date,
        revenue: row.revenue,
    }
}

fn breakdown(rows: Vec<BreakdownRow>) -> HashMap<String, i64> {
    rows.into_iter().map(|r| (r.key, r.count)).collect()
}
