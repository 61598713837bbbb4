// External clients
pub mod single_wallet;

pub use single_wallet::*;
