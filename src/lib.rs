//! # Ledger Core
//!
//! The double-entry bookkeeping ledger with funding-source tracing at
//! the heart of a pharmacy point-of-sale platform.
//!
//! ## Features
//!
//! - **Double-entry bookkeeping**: balanced transaction groups with
//!   embedded debit/credit entries and a draft/confirmed/cancelled
//!   lifecycle
//! - **Funding-source tracing**: a cycle-free graph of which
//!   transactions fund which, resolved breadth-first with defensive
//!   cycle handling
//! - **Availability calculation**: remaining usable amount of any
//!   transaction, with proportional allocation across multiple
//!   funding sources, computed on read and never persisted
//! - **Account balances**: initial balance plus signed entry effects,
//!   official (confirmed) or projected (incl. drafts)
//! - **Storage abstraction**: database-agnostic design with
//!   trait-based storage and optimistic concurrency
//!
//! ## Quick Start
//!
//! ```rust
//! use ledger_core::{Ledger, MemoryStorage};
//!
//! # async fn demo() -> ledger_core::LedgerResult<()> {
//! let storage = MemoryStorage::new();
//! let mut ledger = Ledger::new(storage);
//! let _accounts = ledger.setup_pharmacy_chart().await?;
//! # Ok(())
//! # }
//! ```

pub mod ledger;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use ledger::*;
pub use traits::*;
pub use types::*;
pub use utils::memory_storage::MemoryStorage;
pub use utils::validation::{check_entries, BalanceCheck};

// Re-export transaction patterns for convenience
pub use ledger::transaction::patterns;
