//! Limit-order matching ahead of the curve.
//!
//! Given a snapshot of resting limit bets on the counterparty side of
//! a trade, determines how much of the trade fills at limit prices
//! and how much is left for the curve.
//!
//! Priority is strict: candidates are ordered most favorable to the
//! taker first, FIFO at equal price, and a worse-priced bet never
//! fills while a better-priced bet still has capacity and budget.
//! Owner balances cap fills; a bet whose budget cannot cover a
//! minimum fill is skipped and reported as unusable.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::market::{BalanceByUserId, BetId, LimitBet, LimitFill, Outcome};

/// Outcome of one matching round.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Fills in priority order.
    pub fills: Vec<LimitFill>,
    /// Bets excluded because their owner's budget could not cover a
    /// minimum fill.
    pub skipped: Vec<BetId>,
    /// Unmatched remainder handed to the curve: shares for sells,
    /// cash for buys.
    pub remaining: Decimal,
}

impl MatchOutcome {
    /// Taker-side value of all fills (proceeds for sells, cost for
    /// buys).
    pub fn fill_value(&self) -> Decimal {
        self.fills
            .iter()
            .map(|f| f.shares * f.price)
            .sum()
    }

    /// Total shares filled at limit prices.
    pub fn fill_shares(&self) -> Decimal {
        self.fills.iter().map(|f| f.shares).sum()
    }
}

/// Tracks per-owner budget depletion across multiple bets by the
/// same owner within one matching round.
struct Budgets<'a> {
    balances: &'a BalanceByUserId,
    spent: HashMap<String, Decimal>,
}

impl<'a> Budgets<'a> {
    fn new(balances: &'a BalanceByUserId) -> Self {
        Self {
            balances,
            spent: HashMap::new(),
        }
    }

    fn available(&self, user_id: &str) -> Decimal {
        let balance =
            self.balances.get(user_id).copied().unwrap_or(Decimal::ZERO);
        let spent =
            self.spent.get(user_id).copied().unwrap_or(Decimal::ZERO);
        (balance - spent).max(Decimal::ZERO)
    }

    fn spend(&mut self, user_id: &str, amount: Decimal) {
        *self.spent.entry(user_id.to_string()).or_insert(Decimal::ZERO) +=
            amount;
    }
}

/// Filter to unexpired, non-empty, marketable bets and sort them most
/// favorable to the taker first, FIFO at equal price.
///
/// YES buyers bid probability up and NO buyers bid it down, so the
/// taker-favorable direction is YES-side descending, NO-side
/// ascending, for every trade shape.
fn marketable<'a>(
    bets: &'a [LimitBet],
    now: DateTime<Utc>,
    is_marketable: impl Fn(&LimitBet) -> bool,
) -> Vec<&'a LimitBet> {
    let mut candidates: Vec<&LimitBet> = bets
        .iter()
        .filter(|bet| {
            !bet.is_expired(now)
                && bet.shares_remaining > Decimal::ZERO
                && is_marketable(bet)
        })
        .collect();
    candidates.sort_by(|a, b| {
        let by_price = match a.outcome {
            Outcome::Yes => b.limit_prob.cmp(&a.limit_prob),
            Outcome::No => a.limit_prob.cmp(&b.limit_prob),
        };
        by_price.then(a.created_at.cmp(&b.created_at))
    });
    candidates
}

/// Match a sell of `shares` of `outcome` against resting buyers of
/// that same outcome.
///
/// A bet is marketable when its limit is at least as good for the
/// taker as the current curve probability: selling YES matches YES
/// buyers with `limit_prob >= curve_prob`, selling NO matches NO
/// buyers with `limit_prob <= curve_prob`. The taker receives the
/// maker's limit price per share.
pub fn match_sell(
    shares: Decimal,
    outcome: Outcome,
    curve_prob: Decimal,
    bets: &[LimitBet],
    balances: &BalanceByUserId,
    now: DateTime<Utc>,
    min_fill: Decimal,
) -> MatchOutcome {
    let candidates = marketable(bets, now, |bet| {
        bet.outcome == outcome
            && match outcome {
                Outcome::Yes => bet.limit_prob >= curve_prob,
                Outcome::No => bet.limit_prob <= curve_prob,
            }
    });

    let mut fills = Vec::new();
    let mut skipped = Vec::new();
    let mut remaining = shares;
    let mut budgets = Budgets::new(balances);

    for bet in candidates {
        if remaining <= Decimal::ZERO {
            break;
        }
        // Price per share, paid by the maker and received by the
        // taker.
        let price = match outcome {
            Outcome::Yes => bet.limit_prob,
            Outcome::No => Decimal::ONE - bet.limit_prob,
        };
        if price <= Decimal::ZERO {
            skipped.push(bet.id);
            continue;
        }
        let capacity = bet
            .shares_remaining
            .min(budgets.available(&bet.user_id) / price);
        if capacity < min_fill {
            skipped.push(bet.id);
            continue;
        }
        let fill = capacity.min(remaining);
        budgets.spend(bet.user_id.as_str(), fill * price);
        remaining -= fill;
        fills.push(LimitFill {
            bet_id: bet.id,
            user_id: bet.user_id.clone(),
            shares: fill,
            price,
        });
    }

    MatchOutcome {
        fills,
        skipped,
        remaining: remaining.max(Decimal::ZERO),
    }
}

/// Match a buy of `outcome` funded by `amount` cash against resting
/// buyers of the opposite outcome.
///
/// Each fill mints a share pair at the maker's limit: buying YES
/// matches NO buyers with `limit_prob <= curve_prob` (the taker pays
/// `limit_prob` per share), buying NO matches YES buyers with
/// `limit_prob >= curve_prob` (the taker pays `1 - limit_prob`). The
/// maker funds the complementary side, which is what its balance must
/// cover. `remaining` is unspent cash.
pub fn match_buy(
    amount: Decimal,
    outcome: Outcome,
    curve_prob: Decimal,
    bets: &[LimitBet],
    balances: &BalanceByUserId,
    now: DateTime<Utc>,
    min_fill: Decimal,
) -> MatchOutcome {
    let candidates = marketable(bets, now, |bet| {
        bet.outcome == outcome.opposite()
            && match outcome {
                Outcome::Yes => bet.limit_prob <= curve_prob,
                Outcome::No => bet.limit_prob >= curve_prob,
            }
    });

    let mut fills = Vec::new();
    let mut skipped = Vec::new();
    let mut remaining = amount;
    let mut budgets = Budgets::new(balances);

    for bet in candidates {
        if remaining <= Decimal::ZERO {
            break;
        }
        let taker_price = match outcome {
            Outcome::Yes => bet.limit_prob,
            Outcome::No => Decimal::ONE - bet.limit_prob,
        };
        let maker_price = Decimal::ONE - taker_price;
        if taker_price <= Decimal::ZERO || maker_price <= Decimal::ZERO {
            skipped.push(bet.id);
            continue;
        }
        let capacity = bet
            .shares_remaining
            .min(budgets.available(&bet.user_id) / maker_price);
        if capacity < min_fill {
            skipped.push(bet.id);
            continue;
        }
        let fill = capacity.min(remaining / taker_price);
        if fill <= Decimal::ZERO {
            break;
        }
        budgets.spend(bet.user_id.as_str(), fill * maker_price);
        remaining -= fill * taker_price;
        fills.push(LimitFill {
            bet_id: bet.id,
            user_id: bet.user_id.clone(),
            shares: fill,
            price: taker_price,
        });
    }

    MatchOutcome {
        fills,
        skipped,
        remaining: remaining.max(Decimal::ZERO),
    }
}
