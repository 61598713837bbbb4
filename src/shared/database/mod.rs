// Database module: 연결 풀, 저장소 인터페이스, 구현체
pub mod connection;
pub mod store;
pub mod pg_store;
pub mod memory;
pub mod repositories;

pub use connection::*;
pub use store::*;
pub use pg_store::*;
pub use memory::*;
