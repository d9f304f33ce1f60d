//! In-Memory Store — Versioned Market State for Tests and Demos
//!
//! Implements all three ports over a mutex-guarded map. This is the
//! reference implementation of the caller-side contract: one writer
//! at a time, version check on apply, fills decremented and fee
//! deltas accumulated in the same critical section.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use rust_decimal::Decimal;

use crate::domain::fees::Fees;
use crate::domain::market::{
    Answer, BalanceByUserId, BetId, LimitBet, MarketId, MarketStatus, Pool,
    UserId,
};
use crate::ports::ledger::BalanceSource;
use crate::ports::order_book::OrderBookSource;
use crate::ports::repository::{
    MarketRepository, MarketSnapshot, Mechanism, PoolWrite, RepositoryError,
    SettlementUpdate,
};

#[derive(Debug, Clone)]
struct MarketRecord {
    status: MarketStatus,
    mechanism: Mechanism,
    collected_fees: Fees,
    version: u64,
    bets: Vec<LimitBet>,
}

#[derive(Debug, Default)]
struct Inner {
    markets: HashMap<MarketId, MarketRecord>,
    balances: HashMap<UserId, Decimal>,
}

/// Mutex-guarded market/order/balance store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a binary market at version 0 with zero collected fees.
    pub fn insert_binary_market(
        &self,
        market_id: impl Into<MarketId>,
        pool: Pool,
        p: Decimal,
    ) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.markets.insert(
            market_id.into(),
            MarketRecord {
                status: MarketStatus::Active,
                mechanism: Mechanism::Binary { pool, p },
                collected_fees: Fees::none(),
                version: 0,
                bets: Vec::new(),
            },
        );
    }

    /// Seed a sum-to-one market at version 0.
    pub fn insert_multi_market(
        &self,
        market_id: impl Into<MarketId>,
        answers: Vec<Answer>,
    ) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.markets.insert(
            market_id.into(),
            MarketRecord {
                status: MarketStatus::Active,
                mechanism: Mechanism::MultiSumsToOne { answers },
                collected_fees: Fees::none(),
                version: 0,
                bets: Vec::new(),
            },
        );
    }

    /// Seed a market directly from a snapshot, preserving its version
    /// and collected fees. Used when replaying exported state.
    pub fn insert_snapshot(
        &self,
        snapshot: MarketSnapshot,
        bets: Vec<LimitBet>,
    ) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.markets.insert(
            snapshot.market_id,
            MarketRecord {
                status: snapshot.status,
                mechanism: snapshot.mechanism,
                collected_fees: snapshot.collected_fees,
                version: snapshot.version,
                bets,
            },
        );
    }

    /// Mark a market resolved; all further trades are refused.
    pub fn resolve_market(&self, market_id: &str) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if let Some(record) = inner.markets.get_mut(market_id) {
            record.status = MarketStatus::Resolved;
        }
    }

    pub fn insert_bet(&self, market_id: &str, bet: LimitBet) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if let Some(record) = inner.markets.get_mut(market_id) {
            record.bets.push(bet);
        }
    }

    pub fn set_balance(&self, user_id: impl Into<UserId>, amount: Decimal) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.balances.insert(user_id.into(), amount);
    }

    /// Remaining shares of a resting bet, if it still exists.
    pub fn bet_remaining(&self, market_id: &str, bet_id: BetId) -> Option<Decimal> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .markets
            .get(market_id)?
            .bets
            .iter()
            .find(|b| b.id == bet_id)
            .map(|b| b.shares_remaining)
    }

    /// Lifetime collected fees of a market.
    pub fn collected_fees(&self, market_id: &str) -> Option<Fees> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .markets
            .get(market_id)
            .map(|r| r.collected_fees.clone())
    }
}

impl MarketRepository for InMemoryStore {
    fn load_market(
        &self,
        id: &str,
    ) -> Result<MarketSnapshot, RepositoryError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let record = inner
            .markets
            .get(id)
            .ok_or_else(|| RepositoryError::MarketNotFound(id.to_string()))?;
        Ok(MarketSnapshot {
            market_id: id.to_string(),
            status: record.status,
            mechanism: record.mechanism.clone(),
            collected_fees: record.collected_fees.clone(),
            version: record.version,
        })
    }

    fn apply_settlement(
        &self,
        update: &SettlementUpdate,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let record =
            inner.markets.get_mut(&update.market_id).ok_or_else(|| {
                RepositoryError::MarketNotFound(update.market_id.clone())
            })?;

        if record.version != update.expected_version {
            return Err(RepositoryError::StaleSnapshot {
                market_id: update.market_id.clone(),
                expected: update.expected_version,
                found: record.version,
            });
        }

        match (&mut record.mechanism, &update.pools) {
            (
                Mechanism::Binary { pool, .. },
                PoolWrite::Binary { pool: new_pool },
            ) => {
                *pool = new_pool.clone();
            }
            (
                Mechanism::MultiSumsToOne { answers },
                PoolWrite::Multi { pools },
            ) => {
                for (answer_id, new_pool) in pools {
                    let answer = answers
                        .iter_mut()
                        .find(|a| &a.id == answer_id)
                        .ok_or_else(|| {
                            RepositoryError::Storage(format!(
                                "settlement touches unknown answer {answer_id}"
                            ))
                        })?;
                    answer.pool = new_pool.clone();
                }
            }
            _ => {
                return Err(RepositoryError::Storage(
                    "pool write shape does not match market mechanism"
                        .to_string(),
                ));
            }
        }

        record.collected_fees += update.fee_delta.clone();
        for fill in &update.fills {
            if let Some(bet) =
                record.bets.iter_mut().find(|b| b.id == fill.bet_id)
            {
                bet.shares_remaining =
                    (bet.shares_remaining - fill.shares).max(Decimal::ZERO);
            }
        }
        // Fully-filled bets are archived here, playing the order
        // management layer's part.
        record
            .bets
            .retain(|b| b.shares_remaining > Decimal::ZERO);
        record.version += 1;
        Ok(())
    }
}

impl OrderBookSource for InMemoryStore {
    fn unfilled_bets(&self, market_id: &str) -> Result<Vec<LimitBet>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .markets
            .get(market_id)
            .map(|r| r.bets.clone())
            .unwrap_or_default())
    }
}

impl BalanceSource for InMemoryStore {
    fn balances(&self, user_ids: &[UserId]) -> Result<BalanceByUserId> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(user_ids
            .iter()
            .filter_map(|id| {
                inner.balances.get(id).map(|b| (id.clone(), *b))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_apply_bumps_version_and_accumulates_fees() {
        let store = InMemoryStore::new();
        store.insert_binary_market(
            "m1",
            Pool::new(dec!(100), dec!(100)),
            dec!(0.5),
        );
        let fee = Fees {
            platform: dec!(0.10),
            creator: dec!(0.05),
            liquidity: dec!(0.01),
        };
        let update = SettlementUpdate {
            market_id: "m1".into(),
            expected_version: 0,
            pools: PoolWrite::Binary {
                pool: Pool::new(dec!(105), dec!(96)),
            },
            fee_delta: fee.clone(),
            fills: vec![],
        };
        store.apply_settlement(&update).unwrap();
        let snapshot = store.load_market("m1").unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.collected_fees, fee);
    }

    #[test]
    fn test_stale_version_rejected() {
        let store = InMemoryStore::new();
        store.insert_binary_market(
            "m1",
            Pool::new(dec!(100), dec!(100)),
            dec!(0.5),
        );
        let update = SettlementUpdate {
            market_id: "m1".into(),
            expected_version: 7,
            pools: PoolWrite::Binary {
                pool: Pool::new(dec!(105), dec!(96)),
            },
            fee_delta: Fees::none(),
            fills: vec![],
        };
        let err = store.apply_settlement(&update).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::StaleSnapshot {
                expected: 7,
                found: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_fills_decrement_and_archive_bets() {
        use crate::domain::market::Outcome;

        let store = InMemoryStore::new();
        store.insert_binary_market(
            "m1",
            Pool::new(dec!(100), dec!(100)),
            dec!(0.5),
        );
        let bet = LimitBet::new("bob", Outcome::Yes, dec!(0.6), dec!(5));
        store.insert_bet("m1", bet.clone());

        let partial = SettlementUpdate {
            market_id: "m1".into(),
            expected_version: 0,
            pools: PoolWrite::Binary {
                pool: Pool::new(dec!(100), dec!(100)),
            },
            fee_delta: Fees::none(),
            fills: vec![crate::domain::market::LimitFill {
                bet_id: bet.id,
                user_id: "bob".into(),
                shares: dec!(2),
                price: dec!(0.6),
            }],
        };
        store.apply_settlement(&partial).unwrap();
        assert_eq!(store.bet_remaining("m1", bet.id), Some(dec!(3)));

        let full = SettlementUpdate {
            expected_version: 1,
            fills: vec![crate::domain::market::LimitFill {
                bet_id: bet.id,
                user_id: "bob".into(),
                shares: dec!(3),
                price: dec!(0.6),
            }],
            ..partial
        };
        store.apply_settlement(&full).unwrap();
        assert_eq!(store.bet_remaining("m1", bet.id), None);
    }
}
