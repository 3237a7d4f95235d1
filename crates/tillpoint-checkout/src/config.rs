//! # Deployment Configuration
//!
//! Settings loaded once at startup and read-only afterwards.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`TILLPOINT_*`)
//! 2. Config file (`tillpoint.toml`)
//! 3. Defaults (this file)
//!
//! ## Environment Variables
//! ```text
//! TILLPOINT_DB_PATH                 database file
//! TILLPOINT_CASHIER_ID              cashier recorded on each sale
//! TILLPOINT_TAX_RATE                percent, e.g. "8.25"
//! TILLPOINT_SPLIT_TOLERANCE_CENTS   largest accepted split imbalance
//! TILLPOINT_CURRENCY                ISO 4217 code
//! TILLPOINT_CURRENCY_SYMBOL         display symbol
//! TILLPOINT_CACHE_TTL_SECS          read cache entry lifetime
//! TILLPOINT_CACHE_MAX_ENTRIES       read cache capacity
//! TILLPOINT_SEED                    seed the demo catalog ("true"/"false")
//! TILLPOINT_FORCE_SEED              overwrite existing catalog rows
//! TILLPOINT_PRELOAD_CACHE           warm common listings at startup
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tillpoint_core::{
    CheckoutSettings, Money, TaxRate, DEFAULT_CURRENCY, DEFAULT_CURRENCY_SYMBOL,
    DEFAULT_SPLIT_TOLERANCE_CENTS, DEFAULT_TAX_RATE_BPS,
};
use tillpoint_db::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
use tillpoint_db::{CacheConfig, DbConfig};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "tillpoint.toml";

const DATABASE_FILE_NAME: &str = "tillpoint.db";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No platform data directory available")]
    NoDataDir,
}

impl ConfigError {
    fn invalid(key: &str, value: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

/// Till configuration.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PosConfig {
    /// Database file. `None` means the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Cashier recorded on every committed sale.
    pub cashier_id: String,

    /// Sales tax in basis points, e.g. 825 = 8.25%.
    pub tax_rate_bps: u32,

    /// Largest |cash + card − total| accepted for a split payment.
    pub split_tolerance_cents: i64,

    /// Currency code (ISO 4217)
    pub currency_code: String,

    /// Currency symbol (for display)
    pub currency_symbol: String,

    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,

    /// Seed the built-in demo catalog when the products table is empty.
    pub seed_demo_catalog: bool,

    /// Seed even when products already exist (rows with matching ids are
    /// replaced).
    pub force_seed: bool,

    pub preload_cache: bool,
}

impl Default for PosConfig {
    fn default() -> Self {
        PosConfig {
            database_path: None,
            cashier_id: "cashier-1".to_string(),
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
            split_tolerance_cents: DEFAULT_SPLIT_TOLERANCE_CENTS,
            currency_code: DEFAULT_CURRENCY.to_string(),
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_string(),
            cache_ttl_secs: DEFAULT_TTL.as_secs(),
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            seed_demo_catalog: false,
            force_seed: false,
            preload_cache: true,
        }
    }
}

impl PosConfig {
    /// Defaults overridden by `TILLPOINT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = PosConfig::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Reads a TOML config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: PosConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Full startup load: defaults, then the file if it exists, then the
    /// environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let default_file = PathBuf::from(CONFIG_FILE_NAME);
        let path = file.unwrap_or(&default_file);

        let mut config = if path.exists() {
            tracing::debug!(path = %path.display(), "Loading config file");
            PosConfig::from_file(path)?
        } else {
            PosConfig::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, which maps variable names to values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("TILLPOINT_DB_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(cashier) = lookup("TILLPOINT_CASHIER_ID") {
            self.cashier_id = cashier;
        }
        if let Some(rate) = lookup("TILLPOINT_TAX_RATE") {
            self.tax_rate_bps = parse_percent_bps("TILLPOINT_TAX_RATE", &rate)?;
        }
        if let Some(value) = lookup("TILLPOINT_SPLIT_TOLERANCE_CENTS") {
            self.split_tolerance_cents = parse("TILLPOINT_SPLIT_TOLERANCE_CENTS", &value)?;
        }
        if let Some(code) = lookup("TILLPOINT_CURRENCY") {
            self.currency_code = code;
        }
        if let Some(symbol) = lookup("TILLPOINT_CURRENCY_SYMBOL") {
            self.currency_symbol = symbol;
        }
        if let Some(value) = lookup("TILLPOINT_CACHE_TTL_SECS") {
            self.cache_ttl_secs = parse("TILLPOINT_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = lookup("TILLPOINT_CACHE_MAX_ENTRIES") {
            self.cache_max_entries = parse("TILLPOINT_CACHE_MAX_ENTRIES", &value)?;
        }
        if let Some(value) = lookup("TILLPOINT_SEED") {
            self.seed_demo_catalog = parse_flag("TILLPOINT_SEED", &value)?;
        }
        if let Some(value) = lookup("TILLPOINT_FORCE_SEED") {
            self.force_seed = parse_flag("TILLPOINT_FORCE_SEED", &value)?;
        }
        if let Some(value) = lookup("TILLPOINT_PRELOAD_CACHE") {
            self.preload_cache = parse_flag("TILLPOINT_PRELOAD_CACHE", &value)?;
        }
        self.validate()
    }

    /// Rejects values no till could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tax_rate_bps > 10_000 {
            return Err(ConfigError::invalid("tax_rate_bps", self.tax_rate_bps.to_string()));
        }
        if self.split_tolerance_cents < 0 {
            return Err(ConfigError::invalid(
                "split_tolerance_cents",
                self.split_tolerance_cents.to_string(),
            ));
        }
        if self.cashier_id.trim().is_empty() {
            return Err(ConfigError::invalid("cashier_id", self.cashier_id.clone()));
        }
        if self.currency_code.trim().is_empty() {
            return Err(ConfigError::invalid("currency_code", self.currency_code.clone()));
        }
        if self.currency_symbol.trim().is_empty() {
            return Err(ConfigError::invalid("currency_symbol", self.currency_symbol.clone()));
        }
        if self.cache_max_entries == 0 {
            return Err(ConfigError::invalid("cache_max_entries", "0"));
        }
        Ok(())
    }

    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            tax_rate: self.tax_rate(),
            split_tolerance: Money::from_cents(self.split_tolerance_cents),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            max_entries: self.cache_max_entries,
        }
    }

    /// Database settings for the configured path, falling back to the
    /// platform data directory.
    pub fn db_config(&self) -> Result<DbConfig, ConfigError> {
        let path = match &self.database_path {
            Some(path) => path.clone(),
            None => default_database_path()?,
        };
        Ok(DbConfig::new(path))
    }

    /// Formats an amount with the configured currency symbol.
    ///
    /// ## Example
    /// ```rust
    /// use tillpoint_checkout::PosConfig;
    /// use tillpoint_core::Money;
    ///
    /// let config = PosConfig::default();
    /// assert_eq!(config.format_currency(Money::from_cents(1234)), "$12.34");
    /// ```
    pub fn format_currency(&self, amount: Money) -> String {
        format!(
            "{}{}{}.{:02}",
            if amount.is_negative() { "-" } else { "" },
            self.currency_symbol,
            amount.dollars().abs(),
            amount.cents_part()
        )
    }
}

/// `<data dir>/tillpoint.db`, creating the directory if needed.
///
/// ## Platform Paths
/// - Linux: `~/.local/share/tillpoint/`
/// - macOS: `~/Library/Application Support/com.tillpoint.pos/`
/// - Windows: `%APPDATA%\tillpoint\pos\data\`
pub fn default_database_path() -> Result<PathBuf, ConfigError> {
    let dirs = ProjectDirs::from("com", "tillpoint", "pos").ok_or(ConfigError::NoDataDir)?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.join(DATABASE_FILE_NAME))
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, value))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value)),
    }
}

/// "8.25" → 825 bps.
fn parse_percent_bps(key: &str, value: &str) -> Result<u32, ConfigError> {
    let percent: f64 = parse(key, value)?;
    if !(0.0..=100.0).contains(&percent) {
        return Err(ConfigError::invalid(key, value));
    }
    Ok((percent * 100.0).round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_core_constants() {
        let config = PosConfig::default();
        let settings = config.checkout_settings();
        assert_eq!(settings, CheckoutSettings::default());
        assert_eq!(config.cache_config().ttl, DEFAULT_TTL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = PosConfig::default();
        config
            .apply_env(env(&[
                ("TILLPOINT_TAX_RATE", "8.25"),
                ("TILLPOINT_CASHIER_ID", "till-7"),
                ("TILLPOINT_DB_PATH", "/tmp/pos.db"),
                ("TILLPOINT_SEED", "yes"),
                ("TILLPOINT_CACHE_TTL_SECS", "30"),
            ]))
            .unwrap();

        assert_eq!(config.tax_rate_bps, 825);
        assert_eq!(config.cashier_id, "till-7");
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/pos.db")));
        assert!(config.seed_demo_catalog);
        assert_eq!(config.cache_config().ttl, Duration::from_secs(30));
        assert_eq!(
            config.db_config().unwrap().database_path,
            PathBuf::from("/tmp/pos.db")
        );
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let mut config = PosConfig::default();
        let err = config
            .apply_env(env(&[("TILLPOINT_SPLIT_TOLERANCE_CENTS", "one")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TILLPOINT_SPLIT_TOLERANCE_CENTS"));

        let err = config
            .apply_env(env(&[("TILLPOINT_TAX_RATE", "140")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = config
            .apply_env(env(&[("TILLPOINT_PRELOAD_CACHE", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_blank_identity_fields_are_rejected() {
        for config in [
            PosConfig {
                cashier_id: "  ".to_string(),
                ..PosConfig::default()
            },
            PosConfig {
                currency_code: String::new(),
                ..PosConfig::default()
            },
            PosConfig {
                currency_symbol: " ".to_string(),
                ..PosConfig::default()
            },
        ] {
            assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
        }
        assert!(PosConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PosConfig = toml::from_str(
            r#"
            tax_rate_bps = 700
            currency_code = "EUR"
            currency_symbol = "€"
            "#,
        )
        .unwrap();
        assert_eq!(config.tax_rate_bps, 700);
        assert_eq!(config.currency_code, "EUR");
        assert_eq!(config.split_tolerance_cents, DEFAULT_SPLIT_TOLERANCE_CENTS);
        assert_eq!(config.cashier_id, "cashier-1");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "cashier_id = \"front-till\"\ncache_max_entries = 10\n").unwrap();

        let config = PosConfig::from_file(&path).unwrap();
        assert_eq!(config.cashier_id, "front-till");
        assert_eq!(config.cache_max_entries, 10);

        std::fs::write(&path, "cache_max_entries = 0\n").unwrap();
        assert!(matches!(
            PosConfig::from_file(&path).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));

        std::fs::write(&path, "cache_max_entries = \"lots\"\n").unwrap();
        assert!(matches!(
            PosConfig::from_file(&path).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_format_currency() {
        let config = PosConfig::default();
        assert_eq!(config.format_currency(Money::from_cents(1234)), "$12.34");
        assert_eq!(config.format_currency(Money::from_cents(1)), "$0.01");
        assert_eq!(config.format_currency(Money::zero()), "$0.00");
        assert_eq!(config.format_currency(Money::from_cents(-1234)), "-$12.34");

        let euro = PosConfig {
            currency_symbol: "€".to_string(),
            ..PosConfig::default()
        };
        assert_eq!(euro.format_currency(Money::from_cents(123456789)), "€1234567.89");
    }
}
