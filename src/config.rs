use crate::domain::errors::ValidationError;
use crate::domain::value_objects::investment_bounds::InvestmentBounds;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid investment bounds: {0}")]
    InvalidBounds(#[from] ValidationError),

    #[error("Invalid bind address '{0}'")]
    InvalidBindAddress(String),
}

/// Platform-wide settings for the funding pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformConfig {
    pub min_investment_amount: f64,
    pub max_investment_amount: f64,
    /// Retries of a settlement/refund commit after a business version conflict
    pub settlement_max_retries: u32,
    pub default_currency: String,
    pub bind_address: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            min_investment_amount: 100.0,
            max_investment_amount: 10_000_000.0,
            settlement_max_retries: 5,
            default_currency: "USD".to_string(),
            bind_address: "127.0.0.1:3000".to_string(),
        }
    }
}

fn parse_positive_amount(var: &str, current: f64) -> f64 {
    match std::env::var(var) {
        Ok(raw) => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => value,
            Ok(value) => {
                tracing::warn!(
                    "Invalid {} value: {} (must be positive), using default: {}",
                    var,
                    value,
                    current
                );
                current
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse {} '{}': {}, using default: {}",
                    var,
                    raw,
                    e,
                    current
                );
                current
            }
        },
        Err(_) => current,
    }
}

impl PlatformConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> PlatformConfig {
        let mut config = PlatformConfig::default();

        config.min_investment_amount =
            parse_positive_amount("MIN_INVESTMENT_AMOUNT", config.min_investment_amount);
        config.max_investment_amount =
            parse_positive_amount("MAX_INVESTMENT_AMOUNT", config.max_investment_amount);

        if let Ok(retries) = std::env::var("SETTLEMENT_MAX_RETRIES") {
            match retries.parse::<u32>() {
                Ok(value) => config.settlement_max_retries = value,
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse SETTLEMENT_MAX_RETRIES '{}': {}, using default: {}",
                        retries,
                        e,
                        config.settlement_max_retries
                    );
                }
            }
        }

        if let Ok(currency) = std::env::var("DEFAULT_CURRENCY") {
            let currency = currency.trim().to_uppercase();
            if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()) {
                config.default_currency = currency;
            } else {
                tracing::warn!(
                    "Invalid DEFAULT_CURRENCY '{}' (expected a 3-letter code), using default: {}",
                    currency,
                    config.default_currency
                );
            }
        }

        if let Ok(addr) = std::env::var("BIND_ADDRESS") {
            config.bind_address = addr;
        }

        config
    }

    pub fn investment_bounds(&self) -> Result<InvestmentBounds, ConfigError> {
        InvestmentBounds::new(self.min_investment_amount, self.max_investment_amount)
            .map_err(ConfigError::InvalidBounds)
    }

    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.bind_address.clone()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.investment_bounds()?;
        self.socket_addr()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlatformConfig::default();
        assert_eq!(config.min_investment_amount, 100.0);
        assert_eq!(config.max_investment_amount, 10_000_000.0);
        assert_eq!(config.default_currency, "USD");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let config = PlatformConfig {
            min_investment_amount: 5_000.0,
            max_investment_amount: 1_000.0,
            ..PlatformConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBounds(_))
        ));
    }

    #[test]
    fn test_bad_bind_address_rejected() {
        let config = PlatformConfig {
            bind_address: "not-an-address".to_string(),
            ..PlatformConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidBindAddress("not-an-address".to_string()))
        );
    }

    #[test]
    fn test_bounds_from_config() {
        let bounds = PlatformConfig::default().investment_bounds().unwrap();
        assert!(bounds.check(100.0).is_ok());
        assert!(bounds.check(99.99).is_err());
    }
}
