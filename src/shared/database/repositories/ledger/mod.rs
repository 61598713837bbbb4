// Ledger repositories
pub mod account_repository;
pub mod ledger_entry_repository;
pub mod request_dedup_repository;

pub use account_repository::*;
pub use ledger_entry_repository::*;
pub use request_dedup_repository::*;
