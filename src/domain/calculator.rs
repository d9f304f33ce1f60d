//! Binary trade calculator.
//!
//! Computes the full effect of selling or buying shares against a
//! single pool: limit matching first, then the curve for whatever
//! remains, then proceeds/cost and fees.
//!
//! Policy decisions pinned by conformance tests:
//! - limit fills are fee-exempt; fees are charged on the curve step's
//!   probability move only;
//! - on buys the fee is measured against a provisional no-fee
//!   execution and deducted from the cash before it enters the pool.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::cpmm::{self, to_decimal, to_f64};
use super::error::SettlementError;
use super::fees::{Fees, FeeSchedule};
use super::market::{
    BalanceByUserId, CpmmState, LimitBet, Outcome, Pool, TradeResult,
};
use super::matching;

/// Bisection iteration cap. The interval halves each step, so this is
/// far below f64 resolution for any realistic reserve scale.
const MAX_BISECT_ITERS: u32 = 128;

/// Relative interval width at which bisection stops.
const BISECT_TOLERANCE: f64 = 1e-13;

/// Curve-plus-limit-order trade calculator for one pool.
///
/// Pure and deterministic: identical inputs produce identical
/// results, and nothing outside the returned [`TradeResult`] changes.
#[derive(Debug, Clone)]
pub struct TradeCalculator {
    schedule: FeeSchedule,
    /// Smallest usable limit fill; bets whose budget cap falls below
    /// this are skipped.
    min_fill: Decimal,
    /// A curve step may not leave either reserve below this floor.
    min_pool_reserve: Decimal,
}

impl TradeCalculator {
    pub fn new(
        schedule: FeeSchedule,
        min_fill: Decimal,
        min_pool_reserve: Decimal,
    ) -> Self {
        assert!(
            min_fill > Decimal::ZERO && min_pool_reserve > Decimal::ZERO,
            "calculator floors must be positive"
        );
        Self {
            schedule,
            min_fill,
            min_pool_reserve,
        }
    }

    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }

    /// Sell `shares` of `outcome` against the pool.
    ///
    /// Favorable resting bets fill first at their limit prices
    /// (fee-exempt); the unmatched remainder is paid out by the curve
    /// under the invariant. Proceeds are curve payout plus limit
    /// proceeds, net of fees on the curve move.
    pub fn sell(
        &self,
        state: &CpmmState,
        shares: Decimal,
        outcome: Outcome,
        bets: &[LimitBet],
        balances: &BalanceByUserId,
        now: DateTime<Utc>,
    ) -> Result<TradeResult, SettlementError> {
        if shares <= Decimal::ZERO {
            return Err(SettlementError::NonPositiveShares(shares));
        }

        let initial_prob = cpmm::probability(&state.pool, state.p);
        let matched = matching::match_sell(
            shares,
            outcome,
            initial_prob,
            bets,
            balances,
            now,
            self.min_fill,
        );
        let limit_proceeds = matched.fill_value();

        let (pool, curve_payout) = if matched.remaining > Decimal::ZERO {
            self.curve_sell(state, matched.remaining, outcome)?
        } else {
            (state.pool.clone(), Decimal::ZERO)
        };

        let result_prob = cpmm::probability(&pool, state.p);
        let fees =
            self.schedule
                .fees_on_trade(initial_prob, result_prob, curve_payout);
        let gross_value = curve_payout + limit_proceeds;
        let net_value = gross_value - fees.total();
        let buy_amount = reverse_buy_amount(&pool, state.p, shares, outcome);

        Ok(TradeResult {
            pool,
            initial_prob,
            result_prob,
            shares,
            gross_value,
            net_value,
            buy_amount: Some(buy_amount),
            fees,
            fills: matched.fills,
            skipped_bets: matched.skipped,
        })
    }

    /// Buy `outcome` shares with `amount` cash.
    ///
    /// The dual of [`Self::sell`]: favorable opposite-side bets fill
    /// first, the remaining cash (less fees) enters the pool and the
    /// curve mints shares against the invariant.
    pub fn buy(
        &self,
        state: &CpmmState,
        amount: Decimal,
        outcome: Outcome,
        bets: &[LimitBet],
        balances: &BalanceByUserId,
        now: DateTime<Utc>,
    ) -> Result<TradeResult, SettlementError> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::NonPositiveAmount(amount));
        }

        let initial_prob = cpmm::probability(&state.pool, state.p);
        let matched = matching::match_buy(
            amount,
            outcome,
            initial_prob,
            bets,
            balances,
            now,
            self.min_fill,
        );
        let limit_shares = matched.fill_shares();

        let (pool, curve_shares, fees) = if matched.remaining > Decimal::ZERO
        {
            // Provisional no-fee execution sizes the price impact,
            // then the fee comes out of the cash before it enters the
            // pool.
            let (provisional, _) =
                curve_buy(&state.pool, state.p, matched.remaining, outcome);
            let fees = self.schedule.fees_on_trade(
                initial_prob,
                cpmm::probability(&provisional, state.p),
                matched.remaining,
            );
            let net_cash = matched.remaining - fees.total();
            let (pool, shares) =
                curve_buy(&state.pool, state.p, net_cash, outcome);
            (pool, shares, fees)
        } else {
            (state.pool.clone(), Decimal::ZERO, Fees::none())
        };

        let result_prob = cpmm::probability(&pool, state.p);

        Ok(TradeResult {
            pool,
            initial_prob,
            result_prob,
            shares: limit_shares + curve_shares,
            gross_value: amount,
            net_value: amount - fees.total(),
            buy_amount: None,
            fees,
            fills: matched.fills,
            skipped_bets: matched.skipped,
        })
    }

    /// Solve the curve payout for selling `shares` of `outcome`.
    ///
    /// The pool absorbs the shares and releases capital `v` from both
    /// reserves, holding `yes^(1-p) * no^p` constant:
    /// `(yes + shares - v)^(1-p) * (no - v)^p = k` for a YES sell,
    /// symmetric for NO. `k(v)` is strictly decreasing, so the root
    /// is found by bisection.
    fn curve_sell(
        &self,
        state: &CpmmState,
        shares: Decimal,
        outcome: Outcome,
    ) -> Result<(Pool, Decimal), SettlementError> {
        let p = to_f64(state.p);
        let (yes, no) = (to_f64(state.pool.yes), to_f64(state.pool.no));
        let s = to_f64(shares);
        let k = yes.powf(1.0 - p) * no.powf(p);

        let (grown_yes, grown_no) = match outcome {
            Outcome::Yes => (yes + s, no),
            Outcome::No => (yes, no + s),
        };
        let hi = grown_yes.min(grown_no);
        let payout = bisect(0.0, hi, |v| {
            (grown_yes - v).powf(1.0 - p) * (grown_no - v).powf(p) - k
        });

        let pool = Pool::new(
            to_decimal(grown_yes - payout),
            to_decimal(grown_no - payout),
        );
        if pool.yes < self.min_pool_reserve || pool.no < self.min_pool_reserve
        {
            let drained = if pool.yes < pool.no {
                Outcome::Yes
            } else {
                Outcome::No
            };
            return Err(SettlementError::IlliquidMarket(format!(
                "selling {shares} {outcome} shares would drain the \
                 {drained} reserve below {}",
                self.min_pool_reserve
            )));
        }
        Ok((pool, to_decimal(payout)))
    }
}

/// Closed-form curve buy: `amount` cash joins both reserves and the
/// buyer takes shares of `outcome` such that the invariant holds.
/// Returns the post-trade pool and the shares minted.
fn curve_buy(
    pool: &Pool,
    p: Decimal,
    amount: Decimal,
    outcome: Outcome,
) -> (Pool, Decimal) {
    let pf = to_f64(p);
    let (yes, no) = (to_f64(pool.yes), to_f64(pool.no));
    let m = to_f64(amount);
    let k = yes.powf(1.0 - pf) * no.powf(pf);

    match outcome {
        Outcome::Yes => {
            let new_no = no + m;
            let new_yes = (k / new_no.powf(pf)).powf(1.0 / (1.0 - pf));
            let shares = yes + m - new_yes;
            (Pool::new(to_decimal(new_yes), to_decimal(new_no)), to_decimal(shares))
        }
        Outcome::No => {
            let new_yes = yes + m;
            let new_no = (k / new_yes.powf(1.0 - pf)).powf(1.0 / pf);
            let shares = no + m - new_no;
            (Pool::new(to_decimal(new_yes), to_decimal(new_no)), to_decimal(shares))
        }
    }
}

/// Capital required to buy `shares` of `outcome` back from the
/// post-trade pool. Display-only reverse quote for sells; the curve
/// buy is monotone in its amount, so bisection applies. `shares` is
/// an upper bound because a share always costs less than one unit.
fn reverse_buy_amount(
    pool: &Pool,
    p: Decimal,
    shares: Decimal,
    outcome: Outcome,
) -> Decimal {
    let target = to_f64(shares);
    let amount = bisect(0.0, target, |m| {
        let (_, got) = curve_buy(pool, p, to_decimal(m), outcome);
        to_f64(got) - target
    });
    to_decimal(amount)
}

/// Root of a monotone `f` on `[lo, hi]`, where `f` changes sign
/// across the interval. Direction is inferred from the endpoints.
fn bisect(mut lo: f64, mut hi: f64, f: impl Fn(f64) -> f64) -> f64 {
    let scale = hi.abs().max(1.0);
    let rising = f(hi) >= f(lo);
    for _ in 0..MAX_BISECT_ITERS {
        if (hi - lo) <= BISECT_TOLERANCE * scale {
            break;
        }
        let mid = 0.5 * (lo + hi);
        let val = f(mid);
        let go_right = if rising { val < 0.0 } else { val > 0.0 };
        if go_right {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn calc() -> TradeCalculator {
        TradeCalculator::new(FeeSchedule::default(), dec!(0.01), dec!(0.01))
    }

    fn balanced() -> CpmmState {
        CpmmState::new(Pool::new(dec!(100), dec!(100)), dec!(0.5))
    }

    fn no_bets() -> (Vec<LimitBet>, BalanceByUserId) {
        (vec![], BalanceByUserId::new())
    }

    #[test]
    fn test_sell_boundary_example() {
        // 100/100 pool at p=0.5: selling 10 YES lowers the YES
        // probability and nets strictly less than 10.
        let (bets, balances) = no_bets();
        let result = calc()
            .sell(
                &balanced(),
                dec!(10),
                Outcome::Yes,
                &bets,
                &balances,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(result.initial_prob, dec!(0.5));
        assert!(result.result_prob < dec!(0.5));
        assert!(result.net_value < dec!(10));
        assert!(result.net_value > Decimal::ZERO);
        // Pool absorbed the shares and released the payout.
        assert!(result.pool.yes > dec!(100));
        assert!(result.pool.no < dec!(100));
        // Quadratic solution: payout = (210 - sqrt(40100)) / 2.
        let expected = (210.0 - 40100f64.sqrt()) / 2.0;
        let payout = result.gross_value.to_string().parse::<f64>().unwrap();
        assert!((payout - expected).abs() < 1e-9, "payout {payout}");
    }

    #[test]
    fn test_sell_preserves_invariant() {
        let (bets, balances) = no_bets();
        let state = CpmmState::new(Pool::new(dec!(300), dec!(120)), dec!(0.4));
        let before = cpmm::invariant(&state.pool, state.p);
        let result = calc()
            .sell(&state, dec!(25), Outcome::No, &bets, &balances, Utc::now())
            .unwrap();
        let after = cpmm::invariant(&result.pool, state.p);
        let drift = ((after - before) / before).abs();
        assert!(drift < dec!(1e-9), "invariant drifted by {drift}");
    }

    #[test]
    fn test_buy_preserves_invariant_and_mints_shares() {
        let (bets, balances) = no_bets();
        let state = balanced();
        let before = cpmm::invariant(&state.pool, state.p);
        let result = calc()
            .buy(&state, dec!(10), Outcome::Yes, &bets, &balances, Utc::now())
            .unwrap();
        let after = cpmm::invariant(&result.pool, state.p);
        assert!(((after - before) / before).abs() < dec!(1e-9));
        // ~19 shares for 10 at even odds, less the fee drag.
        assert!(result.shares > dec!(18) && result.shares < dec!(20));
        assert!(result.result_prob > dec!(0.5));
    }

    #[test]
    fn test_non_positive_sizes_rejected() {
        let (bets, balances) = no_bets();
        assert_eq!(
            calc().sell(
                &balanced(),
                dec!(0),
                Outcome::Yes,
                &bets,
                &balances,
                Utc::now()
            ),
            Err(SettlementError::NonPositiveShares(dec!(0)))
        );
        assert_eq!(
            calc().buy(
                &balanced(),
                dec!(-5),
                Outcome::No,
                &bets,
                &balances,
                Utc::now()
            ),
            Err(SettlementError::NonPositiveAmount(dec!(-5)))
        );
    }

    #[test]
    fn test_illiquid_sell_rejected() {
        let (bets, balances) = no_bets();
        let result = calc().sell(
            &balanced(),
            dec!(1000000000),
            Outcome::Yes,
            &bets,
            &balances,
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(SettlementError::IlliquidMarket(_))
        ));
    }

    #[test]
    fn test_fully_matched_sell_is_fee_exempt() {
        // Enough resting depth to absorb the whole sale: the pool is
        // untouched and no fee is charged.
        let bets =
            vec![LimitBet::new("bob", Outcome::Yes, dec!(0.60), dec!(20))];
        let mut balances = BalanceByUserId::new();
        balances.insert("bob".into(), dec!(100));
        let result = calc()
            .sell(
                &balanced(),
                dec!(10),
                Outcome::Yes,
                &bets,
                &balances,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(result.pool, Pool::new(dec!(100), dec!(100)));
        assert_eq!(result.result_prob, result.initial_prob);
        assert_eq!(result.fees, Fees::none());
        assert_eq!(result.gross_value, dec!(6.0));
        assert_eq!(result.net_value, dec!(6.0));
    }

    #[test]
    fn test_partial_match_pays_curve_remainder() {
        let bets =
            vec![LimitBet::new("bob", Outcome::Yes, dec!(0.60), dec!(4))];
        let mut balances = BalanceByUserId::new();
        balances.insert("bob".into(), dec!(100));
        let result = calc()
            .sell(
                &balanced(),
                dec!(10),
                Outcome::Yes,
                &bets,
                &balances,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(result.fills.len(), 1);
        assert_eq!(result.fills[0].shares, dec!(4));
        // 6 unmatched shares moved the curve.
        assert!(result.result_prob < result.initial_prob);
        assert!(result.fees.total() > Decimal::ZERO);
        // Gross = 4 * 0.60 limit proceeds + curve payout.
        assert!(result.gross_value > dec!(2.4));
    }

    #[test]
    fn test_buy_fee_deducted_from_cash_before_pool() {
        let (bets, balances) = no_bets();
        let result = calc()
            .buy(&balanced(), dec!(10), Outcome::Yes, &bets, &balances, Utc::now())
            .unwrap();
        let fee = result.fees.total();
        assert!(fee > Decimal::ZERO);
        // Only the net cash entered the NO reserve.
        let entered = result.pool.no - dec!(100);
        assert!((entered - (dec!(10) - fee)).abs() < dec!(1e-9));
        assert_eq!(result.net_value, dec!(10) - fee);
    }

    #[test]
    fn test_sell_reports_reverse_buy_amount() {
        let (bets, balances) = no_bets();
        let result = calc()
            .sell(
                &balanced(),
                dec!(10),
                Outcome::Yes,
                &bets,
                &balances,
                Utc::now(),
            )
            .unwrap();
        let buy_amount = result.buy_amount.unwrap();
        // Buying the shares back costs more than the sale released.
        assert!(buy_amount > result.gross_value);
        assert!(buy_amount < dec!(10));
        // And it actually repurchases the shares from the post pool.
        let (_, got) =
            curve_buy(&result.pool, dec!(0.5), buy_amount, Outcome::Yes);
        assert!((got - dec!(10)).abs() < dec!(1e-6));
    }

    #[test]
    fn test_quote_is_deterministic() {
        let bets =
            vec![LimitBet::new("bob", Outcome::Yes, dec!(0.58), dec!(3))];
        let mut balances = BalanceByUserId::new();
        balances.insert("bob".into(), dec!(50));
        let now = Utc::now();
        let a = calc()
            .sell(&balanced(), dec!(7), Outcome::Yes, &bets, &balances, now)
            .unwrap();
        let b = calc()
            .sell(&balanced(), dec!(7), Outcome::Yes, &bets, &balances, now)
            .unwrap();
        assert_eq!(a, b);
    }
}
