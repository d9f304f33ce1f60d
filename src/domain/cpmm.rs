//! Weighted constant-product probability model.
//!
//! Maps a reserve pair plus curve weight `p` to an implied YES
//! probability and back. The invariant `yes^(1-p) * no^p` is constant
//! across every trade: shares in, capital out (and vice versa) are
//! always solved against it.
//!
//! Reserves and probabilities travel as `Decimal`; the power kernels
//! run in `f64`, converting back once per call.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;

use super::market::Pool;

/// Probabilities are clamped to `(PROB_EPSILON, 1 - PROB_EPSILON)`;
/// the model never returns exactly 0 or 1.
pub const PROB_EPSILON: f64 = 1e-9;

pub(crate) fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

pub(crate) fn to_decimal(x: f64) -> Decimal {
    Decimal::from_f64(x).unwrap_or(Decimal::ZERO)
}

/// Clamp into the open unit interval.
pub(crate) fn clamp_prob(prob: f64) -> f64 {
    if !prob.is_finite() {
        return 0.5;
    }
    prob.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON)
}

/// f64 kernel for [`probability`]. Degenerate reserves clamp rather
/// than divide by zero.
pub(crate) fn probability_f64(yes: f64, no: f64, p: f64) -> f64 {
    let denom = yes.max(0.0).powf(1.0 - p) + no.max(0.0).powf(p);
    if denom <= 0.0 || !denom.is_finite() {
        return 0.5;
    }
    clamp_prob(no.max(0.0).powf(p) / denom)
}

/// Implied YES probability of a pool:
/// `no^p / (yes^(1-p) + no^p)`, clamped into `(ε, 1-ε)`.
///
/// Monotonic: a pool absorbing YES shares (growing `yes` relative to
/// `no`) prices YES lower.
pub fn probability(pool: &Pool, p: Decimal) -> Decimal {
    to_decimal(probability_f64(
        to_f64(pool.yes),
        to_f64(pool.no),
        to_f64(p),
    ))
}

/// Invariant value `yes^(1-p) * no^p`. Constant across trades;
/// changes only when liquidity capital is added or removed.
pub fn invariant(pool: &Pool, p: Decimal) -> Decimal {
    let pf = to_f64(p);
    to_decimal(
        to_f64(pool.yes).powf(1.0 - pf) * to_f64(pool.no).powf(pf),
    )
}

/// f64 kernel for [`implied_yes_reserve`].
pub(crate) fn implied_yes_reserve_f64(prob: f64, no: f64, p: f64) -> f64 {
    let q = clamp_prob(prob);
    ((1.0 - q) / q * no.powf(p)).powf(1.0 / (1.0 - p))
}

/// Closed-form inverse of [`probability`]: the YES reserve a pool
/// must hold to price at `prob`, given its NO reserve.
///
/// Used to seed answer pools from target probabilities and to
/// reconstruct sibling pools after redistribution. No iteration.
pub fn implied_yes_reserve(prob: Decimal, no: Decimal, p: Decimal) -> Decimal {
    to_decimal(implied_yes_reserve_f64(
        to_f64(prob),
        to_f64(no),
        to_f64(p),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balanced_pool_is_half() {
        let pool = Pool::new(dec!(100), dec!(100));
        let prob = probability(&pool, dec!(0.5));
        assert!((prob - dec!(0.5)).abs() < dec!(1e-12), "got {prob}");
    }

    #[test]
    fn test_more_yes_reserve_lowers_yes_prob() {
        let p = dec!(0.5);
        let balanced = probability(&Pool::new(dec!(100), dec!(100)), p);
        let heavy_yes = probability(&Pool::new(dec!(150), dec!(100)), p);
        assert!(heavy_yes < balanced);
    }

    #[test]
    fn test_degenerate_reserves_clamp() {
        let p = dec!(0.5);
        let no_yes = probability(&Pool::new(Decimal::ZERO, dec!(100)), p);
        let no_no = probability(&Pool::new(dec!(100), Decimal::ZERO), p);
        assert!(no_yes > Decimal::ZERO && no_yes < Decimal::ONE);
        assert!(no_no > Decimal::ZERO && no_no < Decimal::ONE);
        assert!(no_yes > dec!(0.99));
        assert!(no_no < dec!(0.01));

        let empty = probability(&Pool::new(Decimal::ZERO, Decimal::ZERO), p);
        assert_eq!(empty, dec!(0.5));
    }

    #[test]
    fn test_implied_reserve_roundtrip() {
        for (target, p) in [
            (dec!(0.5), dec!(0.5)),
            (dec!(0.3), dec!(0.5)),
            (dec!(0.85), dec!(0.5)),
            (dec!(0.42), dec!(0.3)),
        ] {
            let no = dec!(250);
            let yes = implied_yes_reserve(target, no, p);
            let prob = probability(&Pool::new(yes, no), p);
            assert!(
                (prob - target).abs() < dec!(1e-9),
                "p={p} target={target} got {prob}"
            );
        }
    }

    #[test]
    fn test_invariant_skewed_weight() {
        // yes^(0.7) * no^(0.3) for p = 0.3
        let pool = Pool::new(dec!(100), dec!(400));
        let k = invariant(&pool, dec!(0.3));
        let expected = 100f64.powf(0.7) * 400f64.powf(0.3);
        assert!((k.to_f64().unwrap() - expected).abs() < 1e-9);
    }
}
