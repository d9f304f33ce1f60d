//! Sum-to-one multi-outcome settlement.
//!
//! Trades one answer of a multi-outcome market and redistributes the
//! probability mass it released (or absorbed) across every other live
//! answer, so the live answers always sum to 1.
//!
//! Redistribution is an explicit reduction over the sibling answers
//! ordered by id ascending; any residual drift from 1 is absorbed by
//! the last answer in that order. Resolved answers are frozen and
//! never touched.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::calculator::TradeCalculator;
use super::cpmm;
use super::error::SettlementError;
use super::fees::Fees;
use super::market::{
    Answer, AnswerAdjustment, AnswerId, BalanceByUserId, CpmmState, LimitBet,
    MultiTradeResult, Outcome, Pool,
};

/// Answer pools always run the symmetric curve.
const ANSWER_P: Decimal = dec!(0.5);

/// Probabilities this close to 0 or 1 mean the redistribution cannot
/// be represented by a sane pool; the trade is rejected as illiquid.
const PROB_FLOOR: Decimal = dec!(0.000001);

/// Sum-to-one closure tolerance.
pub const SUM_TOLERANCE: Decimal = dec!(0.000001);

/// Shape of the primary trade on the target answer.
#[derive(Debug, Clone, Copy)]
enum PrimaryOrder {
    Sell { shares: Decimal },
    Buy { amount: Decimal },
}

/// Multi-outcome extension of [`TradeCalculator`].
///
/// Pure: returns a proposed full state transition (primary result
/// plus one adjustment per sibling) or fails without touching
/// anything.
#[derive(Debug, Clone)]
pub struct MultiOutcomeCalculator {
    calc: TradeCalculator,
}

impl MultiOutcomeCalculator {
    pub fn new(calc: TradeCalculator) -> Self {
        Self { calc }
    }

    /// Sell shares of one answer, keeping the live answers summing
    /// to 1. Only the primary trade pays out; sibling adjustments owe
    /// no shares or proceeds to anyone.
    pub fn sell(
        &self,
        answers: &[Answer],
        target_id: &str,
        shares: Decimal,
        outcome: Outcome,
        bets: &[LimitBet],
        balances: &BalanceByUserId,
        now: DateTime<Utc>,
    ) -> Result<MultiTradeResult, SettlementError> {
        self.settle(
            answers,
            target_id,
            PrimaryOrder::Sell { shares },
            outcome,
            bets,
            balances,
            now,
        )
    }

    /// Buy shares of one answer with `amount` cash; the dual of
    /// [`Self::sell`]. Siblings shed the probability mass the target
    /// gains.
    pub fn buy(
        &self,
        answers: &[Answer],
        target_id: &str,
        amount: Decimal,
        outcome: Outcome,
        bets: &[LimitBet],
        balances: &BalanceByUserId,
        now: DateTime<Utc>,
    ) -> Result<MultiTradeResult, SettlementError> {
        self.settle(
            answers,
            target_id,
            PrimaryOrder::Buy { amount },
            outcome,
            bets,
            balances,
            now,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn settle(
        &self,
        answers: &[Answer],
        target_id: &str,
        order: PrimaryOrder,
        outcome: Outcome,
        bets: &[LimitBet],
        balances: &BalanceByUserId,
        now: DateTime<Utc>,
    ) -> Result<MultiTradeResult, SettlementError> {
        let target = answers
            .iter()
            .find(|a| a.id == target_id && !a.resolved)
            .ok_or_else(|| {
                SettlementError::UnknownAnswer(target_id.to_string())
            })?;

        // Siblings in id order; the last one absorbs closure residue.
        let mut siblings: Vec<&Answer> = answers
            .iter()
            .filter(|a| a.id != target_id && !a.resolved)
            .collect();
        siblings.sort_by(|a, b| a.id.cmp(&b.id));
        if siblings.is_empty() {
            return Err(SettlementError::InvariantViolation(
                "sum-to-one market has no live sibling answers".into(),
            ));
        }

        let answer_bets: Vec<LimitBet> = bets
            .iter()
            .filter(|b| b.answer_id.as_deref() == Some(target_id))
            .cloned()
            .collect();
        let state = CpmmState::new(target.pool.clone(), ANSWER_P);
        let primary = match order {
            PrimaryOrder::Sell { shares } => self.calc.sell(
                &state,
                shares,
                outcome,
                &answer_bets,
                balances,
                now,
            )?,
            PrimaryOrder::Buy { amount } => self.calc.buy(
                &state,
                amount,
                outcome,
                &answer_bets,
                balances,
                now,
            )?,
        };

        // Mass released by the target (negative when the target
        // gained probability), shared out in proportion to each
        // sibling's current probability.
        let delta = primary.initial_prob - primary.result_prob;
        let sibling_probs: Vec<Decimal> = siblings
            .iter()
            .map(|a| cpmm::probability(&a.pool, ANSWER_P))
            .collect();
        let sibling_total: Decimal = sibling_probs.iter().copied().sum();
        if sibling_total <= Decimal::ZERO {
            return Err(SettlementError::InvariantViolation(
                "live sibling probabilities sum to zero".into(),
            ));
        }

        let mut new_probs: Vec<Decimal> = sibling_probs
            .iter()
            .map(|prob| *prob + delta * *prob / sibling_total)
            .collect();

        // Force exact closure: the last sibling (id order) absorbs
        // whatever numerical drift the redistribution left.
        let total: Decimal =
            primary.result_prob + new_probs.iter().copied().sum::<Decimal>();
        let residual = Decimal::ONE - total;
        if let Some(last) = new_probs.last_mut() {
            *last += residual;
        }

        for prob in &new_probs {
            if *prob < PROB_FLOOR || *prob > Decimal::ONE - PROB_FLOOR {
                return Err(SettlementError::IlliquidMarket(format!(
                    "redistribution would push a sibling answer to \
                     probability {prob}"
                )));
            }
        }
        let closed: Decimal =
            primary.result_prob + new_probs.iter().copied().sum::<Decimal>();
        if (Decimal::ONE - closed).abs() > SUM_TOLERANCE {
            return Err(SettlementError::InvariantViolation(format!(
                "answer probabilities sum to {closed} after residual \
                 correction"
            )));
        }

        let mut others = Vec::with_capacity(siblings.len());
        let mut total_fees = primary.fees.clone();
        for ((answer, prob_before), prob_after) in
            siblings.iter().zip(sibling_probs).zip(new_probs)
        {
            let adjustment =
                adjust_answer(answer, prob_before, prob_after, &self.calc);
            total_fees += adjustment.fees.clone();
            others.push(adjustment);
        }

        Ok(MultiTradeResult {
            answer_id: target.id.clone(),
            primary,
            others,
            total_fees,
        })
    }
}

/// Move one sibling answer to its new probability by rebuilding its
/// YES reserve in closed form, NO reserve held fixed. The notional
/// for its fee contribution is the YES-reserve change.
fn adjust_answer(
    answer: &Answer,
    prob_before: Decimal,
    prob_after: Decimal,
    calc: &TradeCalculator,
) -> AnswerAdjustment {
    let new_yes =
        cpmm::implied_yes_reserve(prob_after, answer.pool.no, ANSWER_P);
    let notional = (new_yes - answer.pool.yes).abs();
    let fees = calc
        .schedule()
        .fees_on_trade(prob_before, prob_after, notional);
    AnswerAdjustment {
        answer_id: answer.id.clone(),
        pool: Pool::new(new_yes, answer.pool.no),
        prob_before,
        prob_after,
        fees,
    }
}

/// Seed an answer pool that prices at `prob` with the given NO
/// reserve of liquidity.
pub fn answer_from_prob(
    id: impl Into<AnswerId>,
    prob: Decimal,
    no_reserve: Decimal,
) -> Answer {
    let yes = cpmm::implied_yes_reserve(prob, no_reserve, ANSWER_P);
    Answer::new(id, Pool::new(yes, no_reserve))
}

/// Derived probability of one answer.
pub fn answer_probability(answer: &Answer) -> Decimal {
    cpmm::probability(&answer.pool, ANSWER_P)
}

/// Combined fee total of a multi-outcome result, reduced with
/// [`Fees`] addition in sibling order.
pub fn combined_fees(result: &MultiTradeResult) -> Fees {
    result
        .others
        .iter()
        .fold(result.primary.fees.clone(), |acc, adj| {
            acc + adj.fees.clone()
        })
}
