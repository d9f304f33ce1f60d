//! Configuration Module - TOML-based Engine Configuration
//!
//! Loads and validates configuration from `config.toml`. Fee rates
//! and engine floors are externalized here - nothing numeric is
//! hardcoded in the domain layer beyond mathematical constants.
//!
//! Every field has a default, so library users can run on
//! `EngineConfig::default()` without a file.

pub mod loader;

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::domain::fees::FeeSchedule;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
  /// Engine floors and precision.
  #[serde(default)]
  pub engine: EngineParams,
  /// Fee schedule rates.
  #[serde(default)]
  pub fees: FeeConfig,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      engine: EngineParams::default(),
      fees: FeeConfig::default(),
      log_level: default_log_level(),
    }
  }
}

/// Engine floors and boundary precision.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineParams {
  /// Decimal places of the platform currency; results are rounded
  /// to this precision once, at the boundary.
  #[serde(default = "default_currency_decimals")]
  pub currency_decimals: u32,
  /// Smallest limit fill worth honoring, in shares.
  #[serde(default = "default_min_fill")]
  pub min_fill: f64,
  /// Reserve floor below which a curve sell is rejected as illiquid.
  #[serde(default = "default_min_pool_reserve")]
  pub min_pool_reserve: f64,
}

impl EngineParams {
  pub fn min_fill_decimal(&self) -> Decimal {
    Decimal::from_f64(self.min_fill).unwrap_or(dec!(0.01))
  }

  pub fn min_pool_reserve_decimal(&self) -> Decimal {
    Decimal::from_f64(self.min_pool_reserve).unwrap_or(dec!(0.01))
  }
}

impl Default for EngineParams {
  fn default() -> Self {
    Self {
      currency_decimals: default_currency_decimals(),
      min_fill: default_min_fill(),
      min_pool_reserve: default_min_pool_reserve(),
    }
  }
}

/// Per-category fee rates. Each rate is in [0, 1) and they sum
/// below 1; `loader::load_config` enforces this.
#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
  #[serde(default = "default_platform_rate")]
  pub platform_rate: f64,
  #[serde(default = "default_creator_rate")]
  pub creator_rate: f64,
  #[serde(default = "default_liquidity_rate")]
  pub liquidity_rate: f64,
}

impl FeeConfig {
  /// Build the domain fee schedule from the configured rates.
  pub fn schedule(&self) -> FeeSchedule {
    FeeSchedule::new(
      Decimal::from_f64(self.platform_rate).unwrap_or(dec!(0.25)),
      Decimal::from_f64(self.creator_rate).unwrap_or(dec!(0.25)),
      Decimal::from_f64(self.liquidity_rate).unwrap_or(dec!(0.10)),
    )
  }
}

impl Default for FeeConfig {
  fn default() -> Self {
    Self {
      platform_rate: default_platform_rate(),
      creator_rate: default_creator_rate(),
      liquidity_rate: default_liquidity_rate(),
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_currency_decimals() -> u32 {
  2
}

fn default_min_fill() -> f64 {
  0.01
}

fn default_min_pool_reserve() -> f64 {
  0.01
}

fn default_platform_rate() -> f64 {
  0.25
}

fn default_creator_rate() -> f64 {
  0.25
}

fn default_liquidity_rate() -> f64 {
  0.10
}
