// Wallet ledger services module
// 원장 서비스 모듈

pub mod reaper;
pub mod state;

pub use reaper::*;
pub use state::*;
