//! Persistence layer (sync ledger).

pub mod ledger;

pub use ledger::{JsonFileStore, Ledger, LedgerStore, MemoryStore};
