//! Order Book Port - Resting Limit-Bet Snapshots
//!
//! The matcher consumes a consistent point-in-time view of the
//! resting limit bets for a market. Bets placed concurrently with an
//! in-flight settlement are simply not visible to it; there is no
//! partial visibility.

use anyhow::Result;

use crate::domain::market::LimitBet;

/// Trait for resting-order snapshot providers.
pub trait OrderBookSource: Send + Sync {
  /// All unfilled, unexpired limit bets for a market, every answer
  /// included. The engine filters per answer itself.
  fn unfilled_bets(&self, market_id: &str) -> Result<Vec<LimitBet>>;
}

impl<T: OrderBookSource> OrderBookSource for &T {
  fn unfilled_bets(&self, market_id: &str) -> Result<Vec<LimitBet>> {
    (**self).unfilled_bets(market_id)
  }
}

impl<T: OrderBookSource> OrderBookSource for std::sync::Arc<T> {
  fn unfilled_bets(&self, market_id: &str) -> Result<Vec<LimitBet>> {
    (**self).unfilled_bets(market_id)
  }
}
