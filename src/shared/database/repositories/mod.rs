// All repositories module
pub mod ledger;

// Re-export all repositories for convenience
pub use ledger::*;
