//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::EngineConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<EngineConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config: EngineConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  info!(
    platform_rate = config.fees.platform_rate,
    creator_rate = config.fees.creator_rate,
    liquidity_rate = config.fees.liquidity_rate,
    currency_decimals = config.engine.currency_decimals,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Fee rates individually in [0, 1) and summing below 1
/// - Positive engine floors
/// - A representable currency precision
pub fn validate_config(config: &EngineConfig) -> Result<()> {
  let rates = [
    ("platform_rate", config.fees.platform_rate),
    ("creator_rate", config.fees.creator_rate),
    ("liquidity_rate", config.fees.liquidity_rate),
  ];
  for (name, rate) in rates {
    anyhow::ensure!(
      (0.0..1.0).contains(&rate),
      "{} must be in [0, 1), got {}",
      name,
      rate
    );
  }
  let rate_sum: f64 = rates.iter().map(|(_, r)| r).sum();
  anyhow::ensure!(
    rate_sum < 1.0,
    "fee rates must sum below 1, got {}",
    rate_sum
  );

  anyhow::ensure!(
    config.engine.min_fill > 0.0,
    "min_fill must be positive, got {}",
    config.engine.min_fill
  );
  anyhow::ensure!(
    config.engine.min_pool_reserve > 0.0,
    "min_pool_reserve must be positive, got {}",
    config.engine.min_pool_reserve
  );
  anyhow::ensure!(
    config.engine.currency_decimals <= 8,
    "currency_decimals must be at most 8, got {}",
    config.engine.currency_decimals
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_config_validates() {
    validate_config(&EngineConfig::default()).unwrap();
  }

  #[test]
  fn test_empty_toml_uses_defaults() {
    let config: EngineConfig = toml::from_str("").unwrap();
    assert_eq!(config.engine.currency_decimals, 2);
    assert_eq!(config.log_level, "info");
    validate_config(&config).unwrap();
  }

  #[test]
  fn test_partial_override() {
    let config: EngineConfig = toml::from_str(
      r#"
      [fees]
      platform_rate = 0.4

      [engine]
      currency_decimals = 4
      "#,
    )
    .unwrap();
    assert_eq!(config.fees.platform_rate, 0.4);
    assert_eq!(config.fees.creator_rate, 0.25);
    assert_eq!(config.engine.currency_decimals, 4);
    validate_config(&config).unwrap();
  }

  #[test]
  fn test_rates_summing_to_one_rejected() {
    let config: EngineConfig = toml::from_str(
      r#"
      [fees]
      platform_rate = 0.5
      creator_rate = 0.4
      liquidity_rate = 0.1
      "#,
    )
    .unwrap();
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_zero_min_fill_rejected() {
    let config: EngineConfig = toml::from_str(
      r#"
      [engine]
      min_fill = 0.0
      "#,
    )
    .unwrap();
    assert!(validate_config(&config).is_err());
  }
}
