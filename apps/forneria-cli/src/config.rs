//! # Application Configuration
//!
//! Settings read once at startup.
//!
//! ## Environment Variables
//! | Variable                   | Meaning                           | Default           |
//! |----------------------------|-----------------------------------|-------------------|
//! | `FORNERIA_DB_PATH`         | SQLite file                       | `forneria.db`     |
//! | `FORNERIA_TAX_RATE`        | Tax percent (`19`, `19.5`)        | `19`              |
//! | `FORNERIA_LOCK_TIMEOUT_MS` | Wait for stock locks              | `5000`            |
//! | `FORNERIA_STORE_NAME`      | Name printed on receipts          | `Forneria`        |
//!
//! A variable that is set but unparseable is an error.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::ApiError;
use forneria_core::TaxRate;
use forneria_db::{DbConfig, SalesConfig};

/// Runtime configuration for the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub tax_rate: TaxRate,
    #[serde(skip)]
    pub lock_timeout: Duration,
    pub store_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: PathBuf::from("forneria.db"),
            tax_rate: forneria_core::DEFAULT_TAX_RATE,
            lock_timeout: Duration::from_millis(5_000),
            store_name: "Forneria".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `FORNERIA_*` variables over the defaults.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(path) = value("FORNERIA_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Some(raw) = value("FORNERIA_TAX_RATE") {
            config.tax_rate = Decimal::from_str(&raw)
                .ok()
                .and_then(TaxRate::from_percent)
                .ok_or_else(|| {
                    ApiError::validation(format!(
                        "FORNERIA_TAX_RATE must be a percent between 0 and 100, got '{raw}'"
                    ))
                })?;
        }

        if let Some(raw) = value("FORNERIA_LOCK_TIMEOUT_MS") {
            let millis: u64 = raw.parse().map_err(|_| {
                ApiError::validation(format!(
                    "FORNERIA_LOCK_TIMEOUT_MS must be whole milliseconds, got '{raw}'"
                ))
            })?;
            config.lock_timeout = Duration::from_millis(millis);
        }

        if let Some(name) = value("FORNERIA_STORE_NAME") {
            config.store_name = name;
        }

        Ok(config)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.db_path.clone())
    }

    pub fn sales_config(&self) -> SalesConfig {
        SalesConfig::default()
            .with_tax_rate(self.tax_rate)
            .with_lock_timeout(self.lock_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.tax_rate.bps(), 1900);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("FORNERIA_DB_PATH", "/tmp/panaderia.db"),
            ("FORNERIA_TAX_RATE", "10.5"),
            ("FORNERIA_LOCK_TIMEOUT_MS", "250"),
            ("FORNERIA_STORE_NAME", "Panadería Don Lucho"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/panaderia.db"));
        assert_eq!(config.tax_rate.bps(), 1050);
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.store_name, "Panadería Don Lucho");

        let sales = config.sales_config();
        assert_eq!(sales.tax_rate.bps(), 1050);
        assert_eq!(sales.lock_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_blank_values_ignored() {
        let config = AppConfig::from_lookup(lookup(&[("FORNERIA_STORE_NAME", "  ")])).unwrap();
        assert_eq!(config.store_name, "Forneria");
    }

    #[test]
    fn test_bad_values_rejected() {
        for (key, value) in [
            ("FORNERIA_TAX_RATE", "abc"),
            ("FORNERIA_TAX_RATE", "150"),
            ("FORNERIA_TAX_RATE", "19.123"),
            ("FORNERIA_LOCK_TIMEOUT_MS", "-5"),
        ] {
            assert!(AppConfig::from_lookup(lookup(&[(key, value)])).is_err(), "{key}={value}");
        }
    }
}
