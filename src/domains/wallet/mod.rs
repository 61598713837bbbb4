// Wallet ledger domain module
pub mod models;
pub mod engine;
pub mod runtime;
pub mod services;
pub mod handlers;
pub mod routes;

pub use models::*;
