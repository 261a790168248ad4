use std::{env, path::PathBuf, str::FromStr};

use rust_decimal::Decimal;

use crate::error::{Result, TrackerError};
use crate::installments::FeePolicy;
use crate::types::MonetaryAmount;

pub const DATA_DIR_VAR: &str = "INSTALLMENTS_DATA_DIR";
pub const DAILY_FEE_VAR: &str = "INSTALLMENTS_DAILY_FEE";

/// Largest accepted daily fee.
pub const MAX_DAILY_FEE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `sales.csv` and `installments.csv`.
    pub data_dir: PathBuf,
    pub fees: FeePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            fees: FeePolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, reading a `.env` file first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from a variable lookup. Unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let config = Config {
            data_dir: lookup(DATA_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            fees: match lookup(DAILY_FEE_VAR) {
                Some(raw) => FeePolicy::new(parse_amount(&raw).map_err(|_| {
                    TrackerError::Configuration(format!("Invalid {}: '{}'", DAILY_FEE_VAR, raw))
                })?),
                None => defaults.fees,
            },
        };
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fees.daily_fee.is_negative() {
            return Err(TrackerError::Configuration(format!(
                "daily fee cannot be negative (got {})",
                self.fees.daily_fee
            )));
        }
        if self.fees.daily_fee.value() > MAX_DAILY_FEE {
            return Err(TrackerError::Configuration(format!(
                "daily fee cannot exceed {} (got {})",
                MAX_DAILY_FEE, self.fees.daily_fee
            )));
        }
        Ok(())
    }
}

pub fn parse_amount(raw: &str) -> Result<MonetaryAmount> {
    Decimal::from_str(raw.trim())
        .map(MonetaryAmount::new)
        .map_err(|e| TrackerError::validation(format!("invalid amount '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, path::PathBuf};

    use rust_decimal_macros::dec;

    use crate::error::TrackerError;
    use crate::installments::FeePolicy;
    use crate::types::MonetaryAmount;

    use super::{parse_amount, Config, DAILY_FEE_VAR, DATA_DIR_VAR};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn from_vars(pairs: &[(&str, &str)]) -> crate::error::Result<Config> {
        let vars = vars(pairs);
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn unset_variables_keep_defaults() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("."));
        assert_eq!(config.fees, FeePolicy::default());
    }

    #[test]
    fn variables_override_defaults() {
        let config = from_vars(&[(DATA_DIR_VAR, "/var/lib/loja"), (DAILY_FEE_VAR, " 2.50 ")]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/loja"));
        assert_eq!(config.fees.daily_fee, MonetaryAmount::new(dec!(2.50)));
    }

    #[test]
    fn malformed_fee_is_a_configuration_error() {
        let result = from_vars(&[(DAILY_FEE_VAR, "3,90")]);
        assert!(matches!(result, Err(TrackerError::Configuration(msg)) if msg.contains("3,90")));
    }

    #[test]
    fn oversized_fee_is_rejected() {
        let config = from_vars(&[(DAILY_FEE_VAR, "79228162514264337593543950335")]).unwrap();
        assert!(matches!(config.validate(), Err(TrackerError::Configuration(_))));

        let config = from_vars(&[(DAILY_FEE_VAR, "1000000")]).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_fee_is_three_ninety() {
        assert_eq!(
            Config::default().fees.daily_fee,
            MonetaryAmount::new(dec!(3.90))
        );
    }

    #[test]
    fn negative_fee_is_rejected() {
        let config = Config {
            fees: FeePolicy::new(MonetaryAmount::new(dec!(-1))),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn amounts_are_parsed_exactly() {
        assert_eq!(parse_amount(" 12.345 ").unwrap(), MonetaryAmount::new(dec!(12.345)));
        assert!(parse_amount("12,50").is_err());
    }
}
