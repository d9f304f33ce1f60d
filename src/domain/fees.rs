//! Trading fee engine.
//!
//! Fees scale with both trade notional and price impact: a trade that
//! moves probability further pays proportionally more. The total is
//! split into fixed categories (platform, creator, liquidity) by
//! configured rates.
//!
//! Fee computation never fails. A negative notional or an
//! out-of-range probability here means an invariant broke upstream,
//! so it is rejected with an assert rather than clamped.

use std::ops::{Add, AddAssign};

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Fee totals partitioned by category.
///
/// Pointwise addition is associative and commutative, so the combined
/// fees of a primary trade and any number of sibling adjustments can
/// be reduced in any order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fees {
    pub platform: Decimal,
    pub creator: Decimal,
    pub liquidity: Decimal,
}

impl Fees {
    /// The zero fee record (identity for `+`).
    pub fn none() -> Self {
        Self::default()
    }

    pub fn total(&self) -> Decimal {
        self.platform + self.creator + self.liquidity
    }

    /// Round each category to `dp` places, half-to-even.
    pub fn quantize(&self, dp: u32) -> Self {
        let round = |d: Decimal| {
            d.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven)
        };
        Self {
            platform: round(self.platform),
            creator: round(self.creator),
            liquidity: round(self.liquidity),
        }
    }
}

impl Add for Fees {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            platform: self.platform + rhs.platform,
            creator: self.creator + rhs.creator,
            liquidity: self.liquidity + rhs.liquidity,
        }
    }
}

impl AddAssign for Fees {
    fn add_assign(&mut self, rhs: Self) {
        self.platform += rhs.platform;
        self.creator += rhs.creator;
        self.liquidity += rhs.liquidity;
    }
}

/// Configured per-category fee rates. Each rate is in `[0, 1)` and
/// the rates sum below 1, so fees never consume a full notional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub platform_rate: Decimal,
    pub creator_rate: Decimal,
    pub liquidity_rate: Decimal,
}

impl FeeSchedule {
    /// # Panics
    /// Panics if any rate is outside `[0, 1)` or the rates sum to 1
    /// or more.
    pub fn new(
        platform_rate: Decimal,
        creator_rate: Decimal,
        liquidity_rate: Decimal,
    ) -> Self {
        for rate in [platform_rate, creator_rate, liquidity_rate] {
            assert!(
                rate >= Decimal::ZERO && rate < Decimal::ONE,
                "fee rate must be in [0, 1), got {rate}"
            );
        }
        assert!(
            platform_rate + creator_rate + liquidity_rate < Decimal::ONE,
            "fee rates must sum below 1"
        );
        Self {
            platform_rate,
            creator_rate,
            liquidity_rate,
        }
    }

    /// Fees for a trade that moved probability from `prob_before` to
    /// `prob_after` with the given curve notional.
    ///
    /// Per category: `notional * |Δprob| * rate`. Zero impact means
    /// zero fee; larger impact means a proportionally larger fee.
    pub fn fees_on_trade(
        &self,
        prob_before: Decimal,
        prob_after: Decimal,
        notional: Decimal,
    ) -> Fees {
        assert!(
            notional >= Decimal::ZERO,
            "fee notional must be non-negative, got {notional}"
        );
        for prob in [prob_before, prob_after] {
            assert!(
                prob >= Decimal::ZERO && prob <= Decimal::ONE,
                "fee probability out of range: {prob}"
            );
        }
        let base = notional * (prob_after - prob_before).abs();
        Fees {
            platform: base * self.platform_rate,
            creator: base * self.creator_rate,
            liquidity: base * self.liquidity_rate,
        }
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::new(dec!(0.25), dec!(0.25), dec!(0.10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_impact_zero_fee() {
        let schedule = FeeSchedule::default();
        let fees = schedule.fees_on_trade(dec!(0.5), dec!(0.5), dec!(100));
        assert_eq!(fees, Fees::none());
    }

    #[test]
    fn test_fee_split_by_rates() {
        let schedule =
            FeeSchedule::new(dec!(0.2), dec!(0.1), dec!(0.05));
        let fees = schedule.fees_on_trade(dec!(0.5), dec!(0.6), dec!(100));
        // base = 100 * 0.1 = 10
        assert_eq!(fees.platform, dec!(2.0));
        assert_eq!(fees.creator, dec!(1.0));
        assert_eq!(fees.liquidity, dec!(0.50));
        assert_eq!(fees.total(), dec!(3.50));
    }

    #[test]
    fn test_fee_monotone_in_impact() {
        let schedule = FeeSchedule::default();
        let small = schedule.fees_on_trade(dec!(0.5), dec!(0.52), dec!(50));
        let large = schedule.fees_on_trade(dec!(0.5), dec!(0.70), dec!(50));
        assert!(large.total() > small.total());
    }

    #[test]
    fn test_combine_associative_commutative() {
        let a = Fees {
            platform: dec!(1),
            creator: dec!(2),
            liquidity: dec!(3),
        };
        let b = Fees {
            platform: dec!(0.5),
            creator: dec!(0.25),
            liquidity: dec!(0.125),
        };
        let c = Fees {
            platform: dec!(10),
            creator: dec!(0),
            liquidity: dec!(1),
        };
        assert_eq!(
            (a.clone() + b.clone()) + c.clone(),
            a.clone() + (b.clone() + c.clone())
        );
        assert_eq!(a.clone() + b.clone(), b + a.clone());
        assert_eq!(a.clone() + Fees::none(), a);
    }

    #[test]
    #[should_panic(expected = "non-negative")]
    fn test_negative_notional_asserts() {
        FeeSchedule::default().fees_on_trade(
            dec!(0.5),
            dec!(0.6),
            dec!(-1),
        );
    }

    #[test]
    #[should_panic(expected = "sum below 1")]
    fn test_rates_summing_to_one_rejected() {
        FeeSchedule::new(dec!(0.5), dec!(0.4), dec!(0.1));
    }
}
