//! Ledger module: accounts, transaction groups, funding graph and
//! availability calculation

pub mod account;
pub mod availability;
pub mod core;
pub mod funding;
pub mod transaction;

pub use account::*;
pub use availability::*;
pub use self::core::*;
pub use funding::*;
pub use transaction::*;
