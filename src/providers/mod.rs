//! Payment gateway abstraction.
//!
//! Every gateway (mocked or manual) exposes the same intent/confirm/status/
//! refund/method surface; the registry picks the implementation by provider
//! name at request time.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
};

pub mod manual;
pub mod mock_paypal;
pub mod mock_stripe;

pub use manual::ManualProvider;
pub use mock_paypal::MockPayPalProvider;
pub use mock_stripe::MockStripeProvider;

/// Outcome of an intent/confirm/status call against a gateway.
#[derive(Debug, Clone)]
pub struct IntentResult {
    pub success: bool,
    pub payment_id: Option<String>,
    pub transaction_id: Option<String>,
    pub client_secret: Option<String>,
    pub requires_action: bool,
    pub action_url: Option<String>,
    pub error_message: Option<String>,
    pub gateway_response: Value,
}

impl IntentResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            payment_id: None,
            transaction_id: None,
            client_secret: None,
            requires_action: false,
            action_url: None,
            error_message: Some(message.into()),
            gateway_response: Value::Null,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefundResult {
    pub success: bool,
    pub refund_id: Option<String>,
    pub amount: i64,
    pub error_message: Option<String>,
    pub gateway_response: Value,
}

#[derive(Debug, Clone)]
pub struct MethodResult {
    pub success: bool,
    pub provider_method_id: Option<String>,
    pub gateway_response: Value,
}

/// A webhook event normalized across gateways.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: String,
    pub payment_id: Option<String>,
    pub status: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Amounts are cents; `metadata` travels to the gateway unchanged.
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        payment_method: &str,
        customer_email: Option<&str>,
        metadata: Value,
    ) -> IntentResult;

    async fn confirm(
        &self,
        payment_intent_id: &str,
        payment_method_id: Option<&str>,
    ) -> IntentResult;

    async fn status(&self, payment_id: &str) -> IntentResult;

    async fn refund(&self, payment_id: &str, amount: i64, reason: Option<&str>) -> RefundResult;

    async fn create_method(&self, method_data: Value) -> MethodResult;

    /// Gateways without signed webhooks accept everything.
    fn verify_webhook(&self, _payload: &str, _signature: Option<&str>) -> bool {
        true
    }

    fn parse_webhook(&self, payload: &Value) -> WebhookEvent {
        WebhookEvent {
            event_type: payload
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("payment.updated")
                .to_string(),
            payment_id: payload
                .get("payment_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            status: payload
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("succeeded")
                .to_string(),
        }
    }
}

pub struct ProviderRegistry {
    providers: HashMap<&'static str, Box<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    /// Mirrors the deployment configuration: Stripe/PayPal mocks in
    /// simulation mode, plus the always-available manual provider.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut providers: HashMap<&'static str, Box<dyn PaymentProvider>> = HashMap::new();
        if config.payment_simulation {
            tracing::info!("payment simulation mode enabled, using mock providers");
            providers.insert("stripe", Box::new(MockStripeProvider::new()));
            providers.insert("paypal", Box::new(MockPayPalProvider::new()));
        }
        providers.insert("manual", Box::new(ManualProvider::new(config.manual_auto_approve)));
        Self { providers }
    }

    pub fn get(&self, name: &str) -> AppResult<&dyn PaymentProvider> {
        self.providers
            .get(name.to_ascii_lowercase().as_str())
            .map(|p| p.as_ref())
            .ok_or_else(|| {
                AppError::BadRequest(format!("Payment provider '{name}' is not configured"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn test_config(simulation: bool) -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/test".into(),
            host: "127.0.0.1".into(),
            port: 0,
            tax_rate_bps: 1000,
            shipping_cost: 1000,
            currency: "USD".into(),
            payment_simulation: simulation,
            manual_auto_approve: false,
        }
    }

    #[test]
    fn simulation_registers_all_providers() {
        let registry = ProviderRegistry::from_config(&test_config(true));
        assert!(registry.get("stripe").is_ok());
        assert!(registry.get("paypal").is_ok());
        assert!(registry.get("manual").is_ok());
        assert!(registry.get("Stripe").is_ok());
        assert!(registry.get("razorpay").is_err());
    }

    #[test]
    fn live_mode_only_has_manual() {
        let registry = ProviderRegistry::from_config(&test_config(false));
        assert!(registry.get("stripe").is_err());
        assert!(registry.get("manual").is_ok());
    }
}
