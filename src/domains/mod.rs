// Domains
pub mod wallet;
