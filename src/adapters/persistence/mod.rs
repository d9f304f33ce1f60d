//! Persistence Adapters
//!
//! Concrete implementations of the collaborator ports:
//! - `InMemoryStore`: mutex-guarded, versioned market state; the
//!   reference implementation of the caller-side apply contract
//! - `SettlementJournal`: JSONL append-only audit log of committed
//!   settlements

pub mod journal;
pub mod memory;

pub use journal::{SettlementJournal, SettlementRecord};
pub use memory::InMemoryStore;
