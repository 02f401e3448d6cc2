//! Manual payments: cash on delivery, bank transfer. There is no gateway;
//! the intent stays pending until an operator confirms it, unless
//! auto-approve is configured.

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{IntentResult, MethodResult, PaymentProvider, RefundResult};

pub struct ManualProvider {
    auto_approve: bool,
}

impl ManualProvider {
    pub fn new(auto_approve: bool) -> Self {
        Self { auto_approve }
    }
}

fn manual_id(prefix: &str) -> String {
    format!("{prefix}_{}", &Uuid::new_v4().simple().to_string()[..16])
}

#[async_trait]
impl PaymentProvider for ManualProvider {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        payment_method: &str,
        _customer_email: Option<&str>,
        metadata: Value,
    ) -> IntentResult {
        let payment_id = manual_id("manual");
        let status = if self.auto_approve { "succeeded" } else { "pending" };
        IntentResult {
            success: true,
            payment_id: Some(payment_id.clone()),
            transaction_id: Some(manual_id("txn")),
            client_secret: None,
            requires_action: !self.auto_approve,
            action_url: None,
            error_message: None,
            gateway_response: json!({
                "id": payment_id,
                "status": status,
                "amount": amount,
                "currency": currency,
                "payment_method": payment_method,
                "metadata": metadata,
            }),
        }
    }

    async fn confirm(
        &self,
        payment_intent_id: &str,
        _payment_method_id: Option<&str>,
    ) -> IntentResult {
        IntentResult {
            success: true,
            payment_id: Some(payment_intent_id.to_string()),
            transaction_id: Some(manual_id("txn")),
            client_secret: None,
            requires_action: false,
            action_url: None,
            error_message: None,
            gateway_response: json!({
                "id": payment_intent_id,
                "status": "succeeded",
                "confirmed_by": "operator",
            }),
        }
    }

    async fn status(&self, payment_id: &str) -> IntentResult {
        let status = if self.auto_approve { "succeeded" } else { "pending" };
        IntentResult {
            success: true,
            payment_id: Some(payment_id.to_string()),
            transaction_id: None,
            client_secret: None,
            requires_action: !self.auto_approve,
            action_url: None,
            error_message: None,
            gateway_response: json!({ "id": payment_id, "status": status }),
        }
    }

    async fn refund(&self, payment_id: &str, amount: i64, reason: Option<&str>) -> RefundResult {
        let refund_id = manual_id("refund");
        RefundResult {
            success: true,
            refund_id: Some(refund_id.clone()),
            amount,
            error_message: None,
            gateway_response: json!({
                "id": refund_id,
                "payment_id": payment_id,
                "amount": amount,
                "reason": reason,
                "status": "succeeded",
            }),
        }
    }

    async fn create_method(&self, method_data: Value) -> MethodResult {
        MethodResult {
            success: true,
            provider_method_id: Some(manual_id("mm")),
            gateway_response: json!({ "type": "manual", "details": method_data }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_intents_wait_for_confirmation() {
        let provider = ManualProvider::new(false);
        let result = provider
            .create_intent(1500, "USD", "cash_on_delivery", None, Value::Null)
            .await;
        assert!(result.success);
        assert!(result.requires_action);
        assert_eq!(result.gateway_response["status"], "pending");
    }

    #[tokio::test]
    async fn auto_approve_succeeds_immediately() {
        let provider = ManualProvider::new(true);
        let result = provider
            .create_intent(1500, "USD", "bank_transfer", None, Value::Null)
            .await;
        assert!(!result.requires_action);
        assert_eq!(result.gateway_response["status"], "succeeded");
    }
}
