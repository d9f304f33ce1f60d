//! Trading Use Case - Quote and Commit Settlement
//!
//! Orchestrates the pure calculators with the three collaborator
//! ports. Quotes are read-only previews; commits run the identical
//! computation and hand the repository a `SettlementUpdate` to
//! persist atomically (pools, fee delta, bet decrements).
//!
//! Concurrency is the caller's problem by design: exactly one
//! settlement may be in flight per market, and the repository rejects
//! stale-version applies rather than merging.

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::domain::calculator::TradeCalculator;
use crate::domain::error::SettlementError;
use crate::domain::market::{
  LimitBet, MarketStatus, MultiTradeResult, Outcome, TradeResult, UserId,
};
use crate::domain::multi::MultiOutcomeCalculator;
use crate::ports::ledger::BalanceSource;
use crate::ports::order_book::OrderBookSource;
use crate::ports::repository::{
  MarketRepository, MarketSnapshot, Mechanism, PoolWrite, RepositoryError,
  SettlementUpdate,
};

/// Result of one quote or commit.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum Settlement {
  Binary(TradeResult),
  Multi(MultiTradeResult),
}

impl Settlement {
  /// Probability of the traded pool/answer after the trade.
  pub fn result_prob(&self) -> Decimal {
    match self {
      Self::Binary(r) => r.result_prob,
      Self::Multi(r) => r.primary.result_prob,
    }
  }

  /// Net proceeds (sell) or cash applied (buy).
  pub fn net_value(&self) -> Decimal {
    match self {
      Self::Binary(r) => r.net_value,
      Self::Multi(r) => r.primary.net_value,
    }
  }

  fn fee_delta(&self) -> crate::domain::fees::Fees {
    match self {
      Self::Binary(r) => r.fees.clone(),
      Self::Multi(r) => r.total_fees.clone(),
    }
  }

  fn fills(&self) -> Vec<crate::domain::market::LimitFill> {
    match self {
      Self::Binary(r) => r.fills.clone(),
      Self::Multi(r) => r.primary.fills.clone(),
    }
  }

  fn quantize(self, dp: u32) -> Self {
    match self {
      Self::Binary(r) => Self::Binary(r.quantize(dp)),
      Self::Multi(r) => Self::Multi(r.quantize(dp)),
    }
  }
}

#[derive(Debug, Error)]
pub enum TradeError {
  #[error(transparent)]
  Settlement(#[from] SettlementError),

  #[error(transparent)]
  Repository(#[from] RepositoryError),

  #[error(transparent)]
  Collaborator(#[from] anyhow::Error),
}

/// Buy or sell, for dispatch and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TradeSide {
  Buy,
  Sell,
}

impl std::fmt::Display for TradeSide {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Buy => write!(f, "BUY"),
      Self::Sell => write!(f, "SELL"),
    }
  }
}

/// The trading endpoint's settlement service.
pub struct TradeService<R, O, L> {
  repo: R,
  order_book: O,
  ledger: L,
  calc: TradeCalculator,
  multi: MultiOutcomeCalculator,
  currency_decimals: u32,
}

impl<R, O, L> TradeService<R, O, L>
where
  R: MarketRepository,
  O: OrderBookSource,
  L: BalanceSource,
{
  pub fn new(repo: R, order_book: O, ledger: L, config: &EngineConfig) -> Self {
    let calc = TradeCalculator::new(
      config.fees.schedule(),
      config.engine.min_fill_decimal(),
      config.engine.min_pool_reserve_decimal(),
    );
    Self {
      repo,
      order_book,
      ledger,
      multi: MultiOutcomeCalculator::new(calc.clone()),
      calc,
      currency_decimals: config.engine.currency_decimals,
    }
  }

  /// Read-only sell preview. Never mutates anything; calling it
  /// twice on the same snapshot returns identical results.
  pub fn quote_sell(
    &self,
    market_id: &str,
    answer_id: Option<&str>,
    shares: Decimal,
    outcome: Outcome,
  ) -> Result<Settlement, TradeError> {
    let (settlement, snapshot) =
      self.compute(market_id, answer_id, shares, outcome, TradeSide::Sell)?;
    debug!(
      market_id,
      version = snapshot.version,
      %shares,
      %outcome,
      result_prob = %settlement.result_prob(),
      "Sell quoted"
    );
    Ok(settlement)
  }

  /// Compute a sell and hand the resulting state transition to the
  /// repository. The caller's persistence layer is expected to also
  /// credit the trader and archive filled bets in the same
  /// transaction.
  pub fn commit_sell(
    &self,
    market_id: &str,
    answer_id: Option<&str>,
    shares: Decimal,
    outcome: Outcome,
  ) -> Result<Settlement, TradeError> {
    let (settlement, snapshot) =
      self.compute(market_id, answer_id, shares, outcome, TradeSide::Sell)?;
    self.apply(&settlement, &snapshot)?;
    info!(
      market_id,
      version = snapshot.version,
      %shares,
      %outcome,
      net_value = %settlement.net_value(),
      result_prob = %settlement.result_prob(),
      "Sell settled"
    );
    Ok(settlement)
  }

  /// Read-only buy preview; `amount` is cash.
  pub fn quote_buy(
    &self,
    market_id: &str,
    answer_id: Option<&str>,
    amount: Decimal,
    outcome: Outcome,
  ) -> Result<Settlement, TradeError> {
    let (settlement, snapshot) =
      self.compute(market_id, answer_id, amount, outcome, TradeSide::Buy)?;
    debug!(
      market_id,
      version = snapshot.version,
      %amount,
      %outcome,
      result_prob = %settlement.result_prob(),
      "Buy quoted"
    );
    Ok(settlement)
  }

  /// Compute a buy and persist the transition; see
  /// [`Self::commit_sell`].
  pub fn commit_buy(
    &self,
    market_id: &str,
    answer_id: Option<&str>,
    amount: Decimal,
    outcome: Outcome,
  ) -> Result<Settlement, TradeError> {
    let (settlement, snapshot) =
      self.compute(market_id, answer_id, amount, outcome, TradeSide::Buy)?;
    self.apply(&settlement, &snapshot)?;
    let shares = match &settlement {
      Settlement::Binary(r) => r.shares,
      Settlement::Multi(r) => r.primary.shares,
    };
    info!(
      market_id,
      version = snapshot.version,
      %amount,
      %outcome,
      %shares,
      "Buy settled"
    );
    Ok(settlement)
  }

  /// Shared quote/commit computation against one loaded snapshot.
  fn compute(
    &self,
    market_id: &str,
    answer_id: Option<&str>,
    size: Decimal,
    outcome: Outcome,
    side: TradeSide,
  ) -> Result<(Settlement, MarketSnapshot), TradeError> {
    let snapshot = self.repo.load_market(market_id)?;
    if snapshot.status != MarketStatus::Active {
      return Err(SettlementError::MarketClosed.into());
    }

    let bets = self.order_book.unfilled_bets(market_id)?;
    let owners: Vec<UserId> = {
      let mut ids: Vec<UserId> =
        bets.iter().map(|b| b.user_id.clone()).collect();
      ids.sort();
      ids.dedup();
      ids
    };
    let balances = self.ledger.balances(&owners)?;
    let now = Utc::now();

    let settlement = match &snapshot.mechanism {
      Mechanism::Binary { pool, p } => {
        if let Some(answer) = answer_id {
          return Err(
            SettlementError::UnknownAnswer(answer.to_string()).into(),
          );
        }
        let state = crate::domain::market::CpmmState::new(pool.clone(), *p);
        let bets: Vec<LimitBet> =
          bets.into_iter().filter(|b| b.answer_id.is_none()).collect();
        let result = match side {
          TradeSide::Sell => {
            self.calc.sell(&state, size, outcome, &bets, &balances, now)?
          }
          TradeSide::Buy => {
            self.calc.buy(&state, size, outcome, &bets, &balances, now)?
          }
        };
        Settlement::Binary(result)
      }
      Mechanism::MultiSumsToOne { answers } => {
        let target = answer_id.ok_or(SettlementError::AnswerRequired)?;
        let result = match side {
          TradeSide::Sell => self.multi.sell(
            answers, target, size, outcome, &bets, &balances, now,
          )?,
          TradeSide::Buy => self.multi.buy(
            answers, target, size, outcome, &bets, &balances, now,
          )?,
        };
        Settlement::Multi(result)
      }
    };

    // Single boundary rounding; everything before this ran at full
    // precision.
    Ok((settlement.quantize(self.currency_decimals), snapshot))
  }

  fn apply(
    &self,
    settlement: &Settlement,
    snapshot: &MarketSnapshot,
  ) -> Result<(), TradeError> {
    let pools = match settlement {
      Settlement::Binary(result) => PoolWrite::Binary {
        pool: result.pool.clone(),
      },
      Settlement::Multi(result) => {
        let mut pools = vec![(
          result.answer_id.clone(),
          result.primary.pool.clone(),
        )];
        pools.extend(
          result
            .others
            .iter()
            .map(|adj| (adj.answer_id.clone(), adj.pool.clone())),
        );
        PoolWrite::Multi { pools }
      }
    };
    let update = SettlementUpdate {
      market_id: snapshot.market_id.clone(),
      expected_version: snapshot.version,
      pools,
      fee_delta: settlement.fee_delta(),
      fills: settlement.fills(),
    };
    self.repo.apply_settlement(&update)?;
    Ok(())
  }
}
