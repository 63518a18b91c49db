use std::net::SocketAddr;

use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub payment_base_url: String,
    pub payment_secret_key: String,
    pub payment_timeout_secs: u64,
    pub payment_max_retries: u32,
    pub payment_retry_backoff_base_ms: u64,
    pub mail_base_url: String,
    pub mail_api_key: String,
    pub mail_timeout_secs: u64,
    pub mail_sender: String,
    /// Fee charged per location, in major currency units.
    pub location_fee: Decimal,
    pub currency: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("payment_base_url", &self.payment_base_url)
            .field("payment_secret_key", &"[redacted]")
            .field("payment_timeout_secs", &self.payment_timeout_secs)
            .field("payment_max_retries", &self.payment_max_retries)
            .field(
                "payment_retry_backoff_base_ms",
                &self.payment_retry_backoff_base_ms,
            )
            .field("mail_base_url", &self.mail_base_url)
            .field("mail_api_key", &"[redacted]")
            .field("mail_timeout_secs", &self.mail_timeout_secs)
            .field("mail_sender", &self.mail_sender)
            .field("location_fee", &self.location_fee)
            .field("currency", &self.currency)
            .finish()
    }
}
