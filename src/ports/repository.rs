//! Repository Port - Market Snapshot and Settlement Persistence
//!
//! The engine computes against a point-in-time snapshot and hands
//! back a `SettlementUpdate` for the caller to persist atomically.
//! Applying an update must re-check the snapshot version: the
//! engine's output is only valid against the exact pool state it was
//! computed from, so a stale version is rejected, never merged.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::fees::Fees;
use crate::domain::market::{
  Answer, AnswerId, LimitFill, MarketId, MarketStatus, Pool,
};

/// Pricing mechanism of a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mechanism {
  /// Two-outcome market with a single weighted pool.
  Binary { pool: Pool, p: Decimal },
  /// N mutually exclusive answers whose probabilities sum to 1.
  MultiSumsToOne { answers: Vec<Answer> },
}

/// Point-in-time view of one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
  pub market_id: MarketId,
  pub status: MarketStatus,
  pub mechanism: Mechanism,
  /// Running fee totals for the market's lifetime.
  pub collected_fees: Fees,
  /// Incremented on every applied settlement; the optimistic
  /// concurrency token.
  pub version: u64,
}

/// New pool state produced by a settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PoolWrite {
  Binary { pool: Pool },
  Multi { pools: Vec<(AnswerId, Pool)> },
}

/// Everything the caller must persist atomically for one settlement:
/// the new pools, the fee delta to accumulate, and the limit fills
/// whose bets must be decremented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementUpdate {
  pub market_id: MarketId,
  /// Version the computation was based on.
  pub expected_version: u64,
  pub pools: PoolWrite,
  pub fee_delta: Fees,
  pub fills: Vec<LimitFill>,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
  #[error("market {0} not found")]
  MarketNotFound(MarketId),

  #[error(
    "stale snapshot for {market_id}: computed against version \
     {expected}, store is at {found}"
  )]
  StaleSnapshot {
    market_id: MarketId,
    expected: u64,
    found: u64,
  },

  #[error("storage error: {0}")]
  Storage(String),
}

/// Trait for market state providers.
pub trait MarketRepository: Send + Sync {
  /// Load a consistent snapshot of one market.
  fn load_market(&self, id: &str) -> Result<MarketSnapshot, RepositoryError>;

  /// Atomically apply a settlement computed against
  /// `update.expected_version`. Must fail with
  /// [`RepositoryError::StaleSnapshot`] if the market has moved.
  fn apply_settlement(
    &self,
    update: &SettlementUpdate,
  ) -> Result<(), RepositoryError>;
}

impl<T: MarketRepository> MarketRepository for &T {
  fn load_market(&self, id: &str) -> Result<MarketSnapshot, RepositoryError> {
    (**self).load_market(id)
  }

  fn apply_settlement(
    &self,
    update: &SettlementUpdate,
  ) -> Result<(), RepositoryError> {
    (**self).apply_settlement(update)
  }
}

impl<T: MarketRepository> MarketRepository for std::sync::Arc<T> {
  fn load_market(&self, id: &str) -> Result<MarketSnapshot, RepositoryError> {
    (**self).load_market(id)
  }

  fn apply_settlement(
    &self,
    update: &SettlementUpdate,
  ) -> Result<(), RepositoryError> {
    (**self).apply_settlement(update)
  }
}
