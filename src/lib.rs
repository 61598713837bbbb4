// =====================================================
// wallet_ledger - 지갑 원장 서비스
// =====================================================
// 역할: 입금/출금 요청을 정확히 한 번 처리하고, 캐시에 권위 있는 잔고를 유지하며,
//       모든 변경을 쓰기 지연 큐를 통해 DB 원장에 반영
//
// 구조:
// - domains::wallet: 엔진(중복 방지, 락, 캐시, 변경), 런타임(큐, 워커), HTTP
// - shared: 설정, 로깅, 에러, KvStore(Redis), LedgerStore(PostgreSQL)
// =====================================================

pub mod domains;
pub mod routes;
pub mod shared;
