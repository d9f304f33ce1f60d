//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates the pure domain calculators with the port interfaces.
//! One use case: `TradeService`, the quote/commit settlement surface
//! consumed by the trading endpoint layer.

pub mod trading;

pub use trading::{Settlement, TradeError, TradeService};
