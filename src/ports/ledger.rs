//! Ledger Port - Order-Owner Balances
//!
//! Balances cap how much of a resting limit bet can actually fill.
//! Read-only: the engine never debits anyone; crediting proceeds and
//! charging makers is the caller's transaction.

use anyhow::Result;

use crate::domain::market::{BalanceByUserId, UserId};

/// Trait for balance snapshot providers.
pub trait BalanceSource: Send + Sync {
  /// Available balances for the given users. Missing users are
  /// treated as having zero balance.
  fn balances(&self, user_ids: &[UserId]) -> Result<BalanceByUserId>;
}

impl<T: BalanceSource> BalanceSource for &T {
  fn balances(&self, user_ids: &[UserId]) -> Result<BalanceByUserId> {
    (**self).balances(user_ids)
  }
}

impl<T: BalanceSource> BalanceSource for std::sync::Arc<T> {
  fn balances(&self, user_ids: &[UserId]) -> Result<BalanceByUserId> {
    (**self).balances(user_ids)
  }
}
