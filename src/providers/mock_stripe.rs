//! Simulated Stripe gateway. Returns deterministic `pi_`/`ch_`/`re_`/`pm_`
//! prefixed identifiers without touching the network.

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{IntentResult, MethodResult, PaymentProvider, RefundResult};

pub struct MockStripeProvider;

impl MockStripeProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockStripeProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn mock_id(prefix: &str) -> String {
    format!("{prefix}_mock_{}", Uuid::new_v4().simple())
}

#[async_trait]
impl PaymentProvider for MockStripeProvider {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        _payment_method: &str,
        _customer_email: Option<&str>,
        metadata: Value,
    ) -> IntentResult {
        let payment_id = mock_id("pi");
        let client_secret = format!("{payment_id}_secret_{}", &Uuid::new_v4().simple().to_string()[..10]);
        tracing::debug!(amount, currency, %payment_id, "mock stripe intent created");
        IntentResult {
            success: true,
            payment_id: Some(payment_id.clone()),
            transaction_id: None,
            client_secret: Some(client_secret.clone()),
            requires_action: false,
            action_url: None,
            error_message: None,
            gateway_response: json!({
                "id": payment_id,
                "amount": amount,
                "currency": currency.to_ascii_lowercase(),
                "status": "requires_confirmation",
                "client_secret": client_secret,
                "metadata": metadata,
                "mock": true,
            }),
        }
    }

    async fn confirm(
        &self,
        payment_intent_id: &str,
        _payment_method_id: Option<&str>,
    ) -> IntentResult {
        let transaction_id = mock_id("ch");
        IntentResult {
            success: true,
            payment_id: Some(payment_intent_id.to_string()),
            transaction_id: Some(transaction_id.clone()),
            client_secret: None,
            requires_action: false,
            action_url: None,
            error_message: None,
            gateway_response: json!({
                "id": payment_intent_id,
                "status": "succeeded",
                "charges": { "data": [{ "id": transaction_id, "paid": true }] },
                "mock": true,
            }),
        }
    }

    async fn status(&self, payment_id: &str) -> IntentResult {
        IntentResult {
            success: true,
            payment_id: Some(payment_id.to_string()),
            transaction_id: None,
            client_secret: None,
            requires_action: false,
            action_url: None,
            error_message: None,
            gateway_response: json!({ "id": payment_id, "status": "succeeded", "mock": true }),
        }
    }

    async fn refund(&self, payment_id: &str, amount: i64, reason: Option<&str>) -> RefundResult {
        let refund_id = mock_id("re");
        RefundResult {
            success: true,
            refund_id: Some(refund_id.clone()),
            amount,
            error_message: None,
            gateway_response: json!({
                "id": refund_id,
                "payment_intent": payment_id,
                "amount": amount,
                "status": "succeeded",
                "reason": reason,
                "mock": true,
            }),
        }
    }

    async fn create_method(&self, method_data: Value) -> MethodResult {
        let method_id = mock_id("pm");
        MethodResult {
            success: true,
            provider_method_id: Some(method_id.clone()),
            gateway_response: json!({
                "id": method_id,
                "type": "card",
                "card": method_data.get("card").cloned().unwrap_or(Value::Null),
                "mock": true,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn intent_ids_carry_stripe_prefixes() {
        let provider = MockStripeProvider::new();
        let result = provider
            .create_intent(2500, "USD", "credit_card", None, Value::Null)
            .await;
        assert!(result.success);
        assert!(result.payment_id.as_deref().unwrap().starts_with("pi_mock_"));
        assert!(result.client_secret.as_deref().unwrap().contains("_secret_"));
        assert!(!result.requires_action);
    }

    #[tokio::test]
    async fn confirm_and_refund_shapes() {
        let provider = MockStripeProvider::new();
        let confirmed = provider.confirm("pi_mock_x", None).await;
        assert!(confirmed.transaction_id.as_deref().unwrap().starts_with("ch_mock_"));

        let refund = provider.refund("pi_mock_x", 1000, Some("duplicate")).await;
        assert!(refund.success);
        assert_eq!(refund.amount, 1000);
        assert!(refund.refund_id.as_deref().unwrap().starts_with("re_mock_"));
    }
}
