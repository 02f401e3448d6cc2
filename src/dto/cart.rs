use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Cart, Order, OrderItem, Payment, Product};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

/// A cart line joined with its product for display.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemDetail {
    pub id: Uuid,
    pub product: Product,
    pub quantity: i32,
    pub subtotal_price: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartWithItems {
    pub cart: Cart,
    pub items: Vec<CartItemDetail>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub payment_method: String,
    pub payment_provider: String,
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub shipping_notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Absent when the provider rejected the intent; the order still exists
    /// and payment can be retried through the payments resource.
    pub payment: Option<Payment>,
    pub requires_action: bool,
    pub action_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub price: i64,
    pub quantity: i32,
    pub subtotal: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutSummary {
    pub cart_id: Uuid,
    pub items: Vec<SummaryLine>,
    pub subtotal: i64,
    pub tax_rate_bps: i64,
    pub tax_amount: i64,
    pub shipping_cost: i64,
    pub total: i64,
    pub item_count: usize,
    pub total_quantity: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub item_count: usize,
}
