use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Sales tax applied at checkout, in basis points (1000 = 10%).
    pub tax_rate_bps: i64,
    /// Flat shipping cost in cents.
    pub shipping_cost: i64,
    pub currency: String,
    /// When true, Stripe/PayPal are served by the mock providers.
    pub payment_simulation: bool,
    /// Manual payments succeed immediately instead of waiting for confirmation.
    pub manual_auto_approve: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let tax_rate_bps = env::var("TAX_RATE_BPS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(1000);
        let shipping_cost = env::var("SHIPPING_COST_CENTS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(1000);
        let currency = env::var("CURRENCY").unwrap_or_else(|_| "USD".to_string());
        let payment_simulation = env::var("PAYMENT_SIMULATION_MODE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);
        let manual_auto_approve = env::var("MANUAL_PAYMENT_AUTO_APPROVE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(Self {
            database_url,
            host,
            port,
            tax_rate_bps,
            shipping_cost,
            currency,
            payment_simulation,
            manual_auto_approve,
        })
    }
}
