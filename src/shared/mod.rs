// Shared module
pub mod clients;
pub mod config;
pub mod database;
pub mod errors;
pub mod kv;
pub mod logging;
pub mod services;
pub mod utils;

pub use clients::*;
pub use database::*;
pub use errors::*;
pub use services::*;
