//! Settlement error taxonomy.
//!
//! Three classes, matching how callers must react:
//! - invalid requests, rejected before any computation;
//! - illiquid markets, surfaced as "reduce trade size";
//! - invariant violations, which indicate a bug: the caller must
//!   abort and alert, never persist.
//!
//! Every failure is side-effect-free; the engine mutates nothing.

use rust_decimal::Decimal;
use thiserror::Error;

use super::market::AnswerId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettlementError {
    #[error("shares must be positive, got {0}")]
    NonPositiveShares(Decimal),

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("unknown or resolved answer {0}")]
    UnknownAnswer(AnswerId),

    #[error("answer id is required for a multi-outcome market")]
    AnswerRequired,

    #[error("market is closed to trading")]
    MarketClosed,

    #[error("illiquid market: {0}")]
    IlliquidMarket(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl SettlementError {
    /// True for the bug class: the caller should abort its
    /// transaction and alert rather than surface a user error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}
