//! Core settlement domain types.
//!
//! Defines the entities the engine computes over: pools, answers,
//! resting limit bets, fills, and the trade-result records handed back
//! to the caller for persistence.
//!
//! Everything here is a plain value type. The engine never mutates
//! caller-owned state; it receives snapshots and returns proposed
//! transitions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fees::Fees;

// ────────────────────────────────────────────
// Identifiers
// ────────────────────────────────────────────

/// Market identifier used at the ports boundary.
pub type MarketId = String;

/// Answer identifier within a multi-outcome market.
pub type AnswerId = String;

/// Owner of a balance or a resting limit bet.
pub type UserId = String;

/// Resting limit bet identifier.
pub type BetId = Uuid;

/// Read-only balance snapshot keyed by bet owner.
///
/// Used only to cap how much of a resting bet can actually fill;
/// the engine never debits it.
pub type BalanceByUserId = HashMap<UserId, Decimal>;

// ────────────────────────────────────────────
// Outcomes and pools
// ────────────────────────────────────────────

/// Side of a binary outcome (or of a single answer's private market).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// The other side of the book.
    pub fn opposite(self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "YES"),
            Self::No => write!(f, "NO"),
        }
    }
}

/// CPMM reserve pair. Both reserves are non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    /// YES-share reserve.
    pub yes: Decimal,
    /// NO-share reserve.
    pub no: Decimal,
}

impl Pool {
    pub fn new(yes: Decimal, no: Decimal) -> Self {
        Self { yes, no }
    }

    /// Reserve for one side.
    pub fn reserve(&self, outcome: Outcome) -> Decimal {
        match outcome {
            Outcome::Yes => self.yes,
            Outcome::No => self.no,
        }
    }
}

/// A pool together with its curve weight `p ∈ (0, 1)`.
///
/// `p` skews the invariant exponents; 0.5 is the symmetric
/// constant-product case and the fixed weight for answer pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpmmState {
    pub pool: Pool,
    pub p: Decimal,
}

impl CpmmState {
    pub fn new(pool: Pool, p: Decimal) -> Self {
        Self { pool, p }
    }
}

/// Trading lifecycle of a market. `Resolved` is terminal; the engine
/// refuses all further trade calls once a market reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    Active,
    Resolved,
}

// ────────────────────────────────────────────
// Multi-outcome answers
// ────────────────────────────────────────────

/// One answer of a sum-to-one multi-outcome market.
///
/// Each answer carries its own private pool (weight fixed at 0.5).
/// Its probability is always derived from the pool, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub pool: Pool,
    /// Resolved answers are frozen: excluded from trading and from
    /// probability-mass redistribution.
    pub resolved: bool,
}

impl Answer {
    pub fn new(id: impl Into<AnswerId>, pool: Pool) -> Self {
        Self {
            id: id.into(),
            pool,
            resolved: false,
        }
    }
}

// ────────────────────────────────────────────
// Resting limit bets
// ────────────────────────────────────────────

/// A resting limit order, owned by the order book layer.
///
/// `limit_prob` is the YES-probability at which the bet executes,
/// regardless of which outcome it buys. The engine reads these and
/// reports fills; it never decrements `shares_remaining` itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitBet {
    pub id: BetId,
    pub user_id: UserId,
    /// Outcome this bet is buying.
    pub outcome: Outcome,
    /// YES-probability at which the bet executes.
    pub limit_prob: Decimal,
    /// Unfilled share amount.
    pub shares_remaining: Decimal,
    /// Target answer for multi-outcome markets.
    pub answer_id: Option<AnswerId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl LimitBet {
    /// Create a resting YES/NO buy at a limit probability.
    pub fn new(
        user_id: impl Into<UserId>,
        outcome: Outcome,
        limit_prob: Decimal,
        shares: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            outcome,
            limit_prob,
            shares_remaining: shares,
            answer_id: None,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Same bet targeted at a specific answer.
    pub fn for_answer(mut self, answer_id: impl Into<AnswerId>) -> Self {
        self.answer_id = Some(answer_id.into());
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }
}

/// One (partial) fill of a resting bet, in taker terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitFill {
    pub bet_id: BetId,
    pub user_id: UserId,
    /// Shares matched against this bet.
    pub shares: Decimal,
    /// Price per share paid/received by the taker.
    pub price: Decimal,
}

// ────────────────────────────────────────────
// Trade results
// ────────────────────────────────────────────

/// Full effect of one buy or sell against a single pool.
///
/// Ephemeral: produced per call, applied (or discarded) by the
/// caller's persistence transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    /// Post-trade pool.
    pub pool: Pool,
    /// Probability before the trade.
    pub initial_prob: Decimal,
    /// Probability after the curve step.
    pub result_prob: Decimal,
    /// Shares sold (sell) or bought (buy).
    pub shares: Decimal,
    /// Sale proceeds or purchase cost before fees.
    pub gross_value: Decimal,
    /// Proceeds net of fees (sell), or cash that reached the book
    /// and the pool (buy).
    pub net_value: Decimal,
    /// Capital required to reverse the trade, display only (sells).
    pub buy_amount: Option<Decimal>,
    /// Fee delta for this trade.
    pub fees: Fees,
    /// Limit fills consumed, in priority order.
    pub fills: Vec<LimitFill>,
    /// Bets skipped because their owner's budget could not cover a
    /// minimum fill. Expected outcome, not an error.
    pub skipped_bets: Vec<BetId>,
}

impl TradeResult {
    /// Round the externally visible money amounts to `dp` decimal
    /// places, half-to-even. Applied exactly once, at the boundary;
    /// pool reserves stay at full precision.
    pub fn quantize(mut self, dp: u32) -> Self {
        let round = |d: Decimal| {
            d.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven)
        };
        self.gross_value = round(self.gross_value);
        self.net_value = round(self.net_value);
        self.buy_amount = self.buy_amount.map(round);
        self.fees = self.fees.quantize(dp);
        self
    }
}

/// Pool and fee delta for a sibling answer after a multi-outcome
/// trade. Generates no proceeds owed to any user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerAdjustment {
    pub answer_id: AnswerId,
    /// Post-adjustment pool.
    pub pool: Pool,
    pub prob_before: Decimal,
    pub prob_after: Decimal,
    pub fees: Fees,
}

/// Result of a sum-to-one multi-outcome trade: the primary trade on
/// the target answer plus one adjustment per live sibling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTradeResult {
    pub answer_id: AnswerId,
    pub primary: TradeResult,
    /// Sibling adjustments, ordered by answer id ascending.
    pub others: Vec<AnswerAdjustment>,
    /// Fee reduction over the primary and every adjustment.
    pub total_fees: Fees,
}

impl MultiTradeResult {
    /// Boundary rounding; see [`TradeResult::quantize`].
    pub fn quantize(mut self, dp: u32) -> Self {
        self.primary = self.primary.quantize(dp);
        for adj in &mut self.others {
            adj.fees = adj.fees.quantize(dp);
        }
        self.total_fees = self.total_fees.quantize(dp);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_outcome_opposite() {
        assert_eq!(Outcome::Yes.opposite(), Outcome::No);
        assert_eq!(Outcome::No.opposite(), Outcome::Yes);
    }

    #[test]
    fn test_pool_reserve_by_outcome() {
        let pool = Pool::new(dec!(120), dec!(80));
        assert_eq!(pool.reserve(Outcome::Yes), dec!(120));
        assert_eq!(pool.reserve(Outcome::No), dec!(80));
    }

    #[test]
    fn test_limit_bet_expiry() {
        let now = Utc::now();
        let mut bet =
            LimitBet::new("alice", Outcome::Yes, dec!(0.60), dec!(10));
        assert!(!bet.is_expired(now));
        bet.expires_at = Some(now - chrono::Duration::seconds(1));
        assert!(bet.is_expired(now));
    }

    #[test]
    fn test_multi_quantize_rounds_sibling_fees() {
        let primary = TradeResult {
            pool: Pool::new(dec!(100), dec!(100)),
            initial_prob: dec!(0.5),
            result_prob: dec!(0.45),
            shares: dec!(10),
            gross_value: dec!(4.875),
            net_value: dec!(4.8385),
            buy_amount: None,
            fees: Fees {
                platform: dec!(0.0152),
                creator: dec!(0.0152),
                liquidity: dec!(0.0061),
            },
            fills: vec![],
            skipped_bets: vec![],
        };
        let result = MultiTradeResult {
            answer_id: "a1".into(),
            primary,
            others: vec![AnswerAdjustment {
                answer_id: "a2".into(),
                pool: Pool::new(dec!(90), dec!(100)),
                prob_before: dec!(0.3),
                prob_after: dec!(0.33),
                fees: Fees {
                    platform: dec!(0.025),
                    creator: dec!(0.025),
                    liquidity: dec!(0.014),
                },
            }],
            total_fees: Fees {
                platform: dec!(0.0402),
                creator: dec!(0.0402),
                liquidity: dec!(0.0201),
            },
        };
        let q = result.quantize(2);
        assert_eq!(q.primary.fees.platform, dec!(0.02));
        assert_eq!(q.others[0].fees.platform, dec!(0.02));
        assert_eq!(q.others[0].fees.liquidity, dec!(0.01));
        assert_eq!(q.total_fees.total(), dec!(0.10));
    }

    #[test]
    fn test_quantize_is_half_to_even() {
        let result = TradeResult {
            pool: Pool::new(dec!(100), dec!(100)),
            initial_prob: dec!(0.5),
            result_prob: dec!(0.5),
            shares: dec!(1),
            gross_value: dec!(2.125),
            net_value: dec!(2.135),
            buy_amount: Some(dec!(2.145)),
            fees: Fees::none(),
            fills: vec![],
            skipped_bets: vec![],
        };
        let q = result.quantize(2);
        assert_eq!(q.gross_value, dec!(2.12));
        assert_eq!(q.net_value, dec!(2.14));
        assert_eq!(q.buy_amount, Some(dec!(2.14)));
    }
}
