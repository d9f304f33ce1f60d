//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) the settlement engine requires
//! from its collaborators. Adapters implement these traits; the
//! domain layer never sees them.
//!
//! Port categories:
//! - `MarketRepository`: market snapshots in, versioned settlement
//!   writes out
//! - `OrderBookSource`: resting limit-bet snapshots
//! - `BalanceSource`: order-owner balances from the ledger
//!
//! All ports are synchronous: the engine is a pure calculation and
//! never suspends.

pub mod ledger;
pub mod order_book;
pub mod repository;
