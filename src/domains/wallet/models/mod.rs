// Wallet ledger domain models
pub mod request;
pub mod ledger_entry;
pub mod account;
pub mod queue_item;

pub use request::*;
pub use ledger_entry::*;
pub use account::*;
pub use queue_item::*;
