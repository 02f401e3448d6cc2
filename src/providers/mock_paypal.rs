//! Simulated PayPal gateway. PayPal-style order flow: intents come back with
//! an approval URL the buyer would normally be redirected to.

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{IntentResult, MethodResult, PaymentProvider, RefundResult, WebhookEvent};

pub struct MockPayPalProvider;

impl MockPayPalProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockPayPalProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn paypal_id(prefix: &str) -> String {
    format!(
        "{prefix}-{}",
        Uuid::new_v4().simple().to_string().to_ascii_uppercase()
    )
}

#[async_trait]
impl PaymentProvider for MockPayPalProvider {
    fn name(&self) -> &'static str {
        "paypal"
    }

    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        _payment_method: &str,
        customer_email: Option<&str>,
        metadata: Value,
    ) -> IntentResult {
        let order_id = paypal_id("PAYID");
        let approval_url = format!("https://sandbox.paypal.example/checkoutnow?token={order_id}");
        tracing::debug!(amount, currency, %order_id, "mock paypal order created");
        IntentResult {
            success: true,
            payment_id: Some(order_id.clone()),
            transaction_id: None,
            client_secret: None,
            requires_action: true,
            action_url: Some(approval_url.clone()),
            error_message: None,
            gateway_response: json!({
                "id": order_id,
                "intent": "CAPTURE",
                "status": "CREATED",
                "amount": { "value": amount, "currency_code": currency },
                "payer_email": customer_email,
                "links": [{ "rel": "approve", "href": approval_url }],
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
        let capture_id = paypal_id("CAPTURE");
        IntentResult {
            success: true,
            payment_id: Some(payment_intent_id.to_string()),
            transaction_id: Some(capture_id.clone()),
            client_secret: None,
            requires_action: false,
            action_url: None,
            error_message: None,
            gateway_response: json!({
                "id": payment_intent_id,
                "status": "COMPLETED",
                "purchase_units": [{ "payments": { "captures": [{ "id": capture_id }] } }],
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
            gateway_response: json!({ "id": payment_id, "status": "COMPLETED", "mock": true }),
        }
    }

    async fn refund(&self, payment_id: &str, amount: i64, reason: Option<&str>) -> RefundResult {
        let refund_id = paypal_id("REFUND");
        RefundResult {
            success: true,
            refund_id: Some(refund_id.clone()),
            amount,
            error_message: None,
            gateway_response: json!({
                "id": refund_id,
                "capture_id": payment_id,
                "amount": { "value": amount },
                "status": "COMPLETED",
                "note_to_payer": reason,
                "mock": true,
            }),
        }
    }

    async fn create_method(&self, _method_data: Value) -> MethodResult {
        let token = paypal_id("BA");
        MethodResult {
            success: true,
            provider_method_id: Some(token.clone()),
            gateway_response: json!({ "id": token, "type": "billing_agreement", "mock": true }),
        }
    }

    fn parse_webhook(&self, payload: &Value) -> WebhookEvent {
        // PayPal nests the order under `resource`.
        WebhookEvent {
            event_type: payload
                .get("event_type")
                .and_then(Value::as_str)
                .unwrap_or("PAYMENT.CAPTURE.COMPLETED")
                .to_string(),
            payment_id: payload
                .pointer("/resource/id")
                .and_then(Value::as_str)
                .map(str::to_string),
            status: payload
                .pointer("/resource/status")
                .and_then(Value::as_str)
                .unwrap_or("COMPLETED")
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn intents_require_buyer_approval() {
        let provider = MockPayPalProvider::new();
        let result = provider
            .create_intent(5000, "USD", "paypal", Some("buyer@example.com"), Value::Null)
            .await;
        assert!(result.success);
        assert!(result.requires_action);
        assert!(result.payment_id.as_deref().unwrap().starts_with("PAYID-"));
        assert!(result.action_url.as_deref().unwrap().contains("checkoutnow"));
    }

    #[test]
    fn webhook_reads_nested_resource() {
        let provider = MockPayPalProvider::new();
        let event = provider.parse_webhook(&json!({
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource": { "id": "PAYID-ABC", "status": "COMPLETED" }
        }));
        assert_eq!(event.payment_id.as_deref(), Some("PAYID-ABC"));
        assert_eq!(event.status, "COMPLETED");
    }
}
