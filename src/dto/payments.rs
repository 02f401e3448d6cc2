use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Payment, PaymentMethod, PaymentRefund};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIntentRequest {
    pub order_id: Uuid,
    /// Must equal the order total, in cents.
    pub amount: i64,
    pub currency: Option<String>,
    pub payment_method: String,
    pub payment_provider: String,
    pub customer_email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
    pub payment_method_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRefundRequest {
    pub payment_id: Uuid,
    /// Defaults to the remaining refundable amount.
    pub amount: Option<i64>,
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMethodRequest {
    pub payment_method: String,
    pub provider: String,
    pub card_last_four: Option<String>,
    pub card_brand: Option<String>,
    #[schema(value_type = Object)]
    pub card: Option<serde_json::Value>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMethodRequest {
    pub is_default: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IntentResponse {
    pub payment: Payment,
    pub requires_action: bool,
    pub action_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundList {
    pub items: Vec<PaymentRefund>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentList {
    pub items: Vec<Payment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MethodList {
    pub items: Vec<PaymentMethod>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundResponse {
    pub refund: PaymentRefund,
    pub payment: Payment,
}
