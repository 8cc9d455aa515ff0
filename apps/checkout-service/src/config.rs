//! Checkout service configuration.
//!
//! Configuration is loaded from `STOREFRONT_*` environment variables with
//! fallback to development defaults, then injected into the services. Nothing
//! reads the environment after startup.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use storefront_core::GatewayConfig;

/// Sandbox endpoint of the payment gateway.
pub const DEFAULT_PAY_URL: &str = "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html";

const DEV_HASH_SECRET: &str = "storefront-dev-secret-change-in-production";

/// Checkout service configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// Pool size.
    pub max_connections: u32,

    /// Upper bound on one shipping quote.
    pub shipping_timeout: Duration,

    /// Merchant credentials and endpoints. `Debug` redacts the secret.
    pub gateway: GatewayConfig,
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Load configuration from a fixed set of variables.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load_from(|key| vars.get(key).cloned())
    }

    fn load_from(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let parse_u64 = |key: &str, default: u64| -> Result<u64, ConfigError> {
            match var(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string())),
                None => Ok(default),
            }
        };

        let hash_secret = match var("STOREFRONT_VNPAY_HASH_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            // Release builds must be given a real secret.
            None if cfg!(debug_assertions) => DEV_HASH_SECRET.to_string(),
            None => {
                return Err(ConfigError::MissingRequired(
                    "STOREFRONT_VNPAY_HASH_SECRET".to_string(),
                ))
            }
        };

        let max_connections = parse_u64("STOREFRONT_DB_MAX_CONNECTIONS", 5)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "STOREFRONT_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        let config = CheckoutConfig {
            database_path: var("STOREFRONT_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("storefront.db")),

            max_connections: max_connections.min(u32::MAX as u64) as u32,

            shipping_timeout: Duration::from_millis(parse_u64("STOREFRONT_SHIPPING_TIMEOUT_MS", 3000)?),

            gateway: GatewayConfig {
                tmn_code: var("STOREFRONT_VNPAY_TMN_CODE").unwrap_or_else(|| "DEMO0001".to_string()),
                hash_secret,
                pay_url: var("STOREFRONT_VNPAY_PAY_URL").unwrap_or_else(|| DEFAULT_PAY_URL.to_string()),
                return_url: var("STOREFRONT_VNPAY_RETURN_URL")
                    .unwrap_or_else(|| "http://localhost:8080/payment/return".to_string()),
                ipn_url: var("STOREFRONT_VNPAY_IPN_URL")
                    .unwrap_or_else(|| "http://localhost:8080/payment/ipn".to_string()),
            },
        };

        if config.shipping_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "STOREFRONT_SHIPPING_TIMEOUT_MS".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn shipping_timeout(mut self, timeout: Duration) -> Self {
        self.shipping_timeout = timeout;
        self
    }

    pub fn gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = CheckoutConfig::from_vars(&vars(&[("STOREFRONT_VNPAY_HASH_SECRET", "s3cr3t")])).unwrap();
        assert_eq!(config.database_path, PathBuf::from("storefront.db"));
        assert_eq!(config.shipping_timeout, Duration::from_secs(3));
        assert_eq!(config.gateway.pay_url, DEFAULT_PAY_URL);
        assert_eq!(config.gateway.hash_secret, "s3cr3t");
    }

    #[test]
    fn test_overrides() {
        let config = CheckoutConfig::from_vars(&vars(&[
            ("STOREFRONT_DATABASE_PATH", "/var/lib/storefront/checkout.db"),
            ("STOREFRONT_SHIPPING_TIMEOUT_MS", "250"),
            ("STOREFRONT_VNPAY_TMN_CODE", "SHOP0042"),
            ("STOREFRONT_VNPAY_HASH_SECRET", "s3cr3t"),
        ]))
        .unwrap();
        assert_eq!(config.shipping_timeout, Duration::from_millis(250));
        assert_eq!(config.gateway.tmn_code, "SHOP0042");
    }

    #[test]
    fn test_invalid_numbers() {
        let err = CheckoutConfig::from_vars(&vars(&[
            ("STOREFRONT_VNPAY_HASH_SECRET", "s3cr3t"),
            ("STOREFRONT_SHIPPING_TIMEOUT_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "STOREFRONT_SHIPPING_TIMEOUT_MS"));

        assert!(CheckoutConfig::from_vars(&vars(&[
            ("STOREFRONT_VNPAY_HASH_SECRET", "s3cr3t"),
            ("STOREFRONT_SHIPPING_TIMEOUT_MS", "0"),
        ]))
        .is_err());
    }

    #[test]
    fn test_missing_secret() {
        let result = CheckoutConfig::from_vars(&HashMap::new());
        if cfg!(debug_assertions) {
            assert_eq!(result.unwrap().gateway.hash_secret, DEV_HASH_SECRET);
        } else {
            assert!(matches!(result, Err(ConfigError::MissingRequired(_))));
        }
    }

    #[test]
    fn test_debug_never_prints_secret() {
        let config = CheckoutConfig::from_vars(&vars(&[("STOREFRONT_VNPAY_HASH_SECRET", "s3cr3t")])).unwrap();
        assert!(!format!("{config:?}").contains("s3cr3t"));
    }
}
