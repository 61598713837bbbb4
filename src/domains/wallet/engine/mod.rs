// =====================================================
// 원장 일관성 엔진 모듈
// Ledger Consistency Engine Module
// =====================================================
// 구조:
// - idempotency: 요청 ID 중복 방지 (SET NX + TTL)
// - lock: 계정 단위 분산 락
// - balance_cache: 계정 잔고 캐시 (cache-aside, 지연 재적재)
// - agent_cache: 에이전트 메타데이터 캐시 (단일 외부 지갑 URL)
// - mutation: 요청 하나를 처리하는 엔진
//
// 모든 컴포넌트는 시작 시 한 번 만든 KvStore / LedgerStore 핸들을
// 주입받아 사용합니다. (전역 싱글턴 없음)
// =====================================================

pub mod idempotency;
pub mod lock;
pub mod balance_cache;
pub mod agent_cache;
pub mod mutation;

pub use idempotency::IdempotencyGuard;
pub use lock::{DistributedLock, LockSettings};
pub use balance_cache::BalanceCache;
pub use agent_cache::AgentCache;
pub use mutation::MutationEngine;
