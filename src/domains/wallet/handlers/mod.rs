// Wallet ledger handlers module
// 원장 핸들러 모듈

pub mod ledger_handler;
pub mod ops_handler;

pub use ledger_handler::*;
pub use ops_handler::*;
