//! Domain layer - the pure settlement core.
//!
//! Everything under here is synchronous, deterministic and free of
//! I/O: snapshots in, proposed state transitions out. The caller owns
//! all mutation, locking and persistence.

pub mod calculator;
pub mod cpmm;
pub mod error;
pub mod fees;
pub mod market;
pub mod matching;
pub mod multi;

// Re-export core types for convenience
pub use calculator::TradeCalculator;
pub use error::SettlementError;
pub use fees::{FeeSchedule, Fees};
pub use market::{
    Answer, AnswerAdjustment, BalanceByUserId, CpmmState, LimitBet,
    LimitFill, MarketStatus, MultiTradeResult, Outcome, Pool, TradeResult,
};
pub use multi::MultiOutcomeCalculator;
