// =====================================================
// Runtime - 백그라운드 처리
// =====================================================
// 역할: 쓰기 지연 큐와 이를 비우는 워커들
//
// 구조:
// - queue: pending / processing 리스트 기반 신뢰성 큐
// - workers: N개의 동기화 워커 (큐 → DB)
// - sweeper: 오래 처리 중인 항목을 다시 대기 큐로 (선택)
// =====================================================

pub mod queue;
pub mod workers;
pub mod sweeper;

pub use queue::{QueueStats, WriteBehindQueue};
pub use workers::{SyncOutcome, SyncWorker, SyncWorkerPool};
pub use sweeper::ProcessingSweeper;
