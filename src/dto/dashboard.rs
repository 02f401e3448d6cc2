use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Invoice, InvoiceItem};

#[derive(Debug, Serialize, ToSchema)]
pub struct RecentOrder {
    pub id: Uuid,
    pub order_number: String,
    pub status: String,
    pub payment_status: String,
    pub total_amount: i64,
    pub customer_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopProduct {
    pub id: Uuid,
    pub title: String,
    pub total_sold: i64,
    pub total_revenue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopSeller {
    pub id: Uuid,
    pub name: String,
    pub total_revenue: i64,
    pub total_orders: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevenuePoint {
    pub date: String,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SellerDashboard {
    pub total_products: i64,
    pub total_orders: i64,
    pub total_revenue: i64,
    pub pending_orders: i64,
    pub recent_orders: Vec<RecentOrder>,
    pub top_products: Vec<TopProduct>,
    pub revenue_by_day: Vec<RevenuePoint>,
    pub order_status_breakdown: HashMap<String, i64>,
    pub payment_status_breakdown: HashMap<String, i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminDashboard {
    pub total_users: i64,
    pub total_sellers: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub total_revenue: i64,
    pub recent_orders: Vec<RecentOrder>,
    pub top_sellers: Vec<TopSeller>,
    pub revenue_by_day: Vec<RevenuePoint>,
    pub order_status_breakdown: HashMap<String, i64>,
    pub payment_status_breakdown: HashMap<String, i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInvoiceRequest {
    pub order_id: Uuid,
    /// Days until the invoice is due; defaults to 30.
    pub due_days: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateInvoiceStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceWithItems {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceList {
    pub items: Vec<Invoice>,
}
