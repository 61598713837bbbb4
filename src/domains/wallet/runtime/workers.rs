// =====================================================
// SyncWorkerPool - 큐 → DB 동기화 워커
// =====================================================
// 역할: 쓰기 지연 큐를 비우면서 원장 항목과 지갑 잔고를 DB에 반영
//
// 워커 루프:
// loop {
//     claim (최대 claim_timeout 대기)
//         ↓
//     LedgerStore::persist_entry (트랜잭션)
//         ↓ 성공
//     ack + LastSync 갱신 + 캐시/주문 스냅샷 만료 갱신 (원자 배치)
// }
//
// 실패 처리:
// - DB 반영 실패: 롤백, 로그만 남김. 항목은 processing에 남음 (자동 재시도 없음)
// - 종료 신호: claim 사이마다 확인. claim 자체는 짧은 타임아웃으로 끝나므로
//   이미 가져온 항목을 버리지 않음
//
// 각 워커는 자기 KvStore 연결(isolated)을 가지며 서로 상태를 공유하지 않습니다.
// =====================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domains::wallet::engine::BalanceCache;
use crate::domains::wallet::models::ClaimedItem;
use crate::shared::config::AppConfig;
use crate::shared::database::LedgerStore;
use crate::shared::kv::{KvOp, KvStore};
use crate::shared::utils::key_builder;

use super::queue::WriteBehindQueue;

/// claim 에러 후 재시도까지 대기
const CLAIM_ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// 항목 하나 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// 이번에 처음 DB에 반영됨
    Persisted,
    /// 이미 반영된 항목 (재전달), ack만 함
    AlreadyPersisted,
    /// DB 반영 실패, processing에 남음
    Failed,
}

/// 워커 하나
pub struct SyncWorker {
    id: usize,
    kv: Arc<dyn KvStore>,
    queue: WriteBehindQueue,
    cache: BalanceCache,
    store: Arc<dyn LedgerStore>,
    orders_ttl: Duration,
}

impl SyncWorker {
    pub fn new(
        id: usize,
        kv: Arc<dyn KvStore>,
        store: Arc<dyn LedgerStore>,
        cache_ttl: Duration,
        orders_ttl: Duration,
    ) -> Self {
        Self {
            id,
            queue: WriteBehindQueue::new(kv.clone()),
            cache: BalanceCache::new(kv.clone(), cache_ttl),
            kv,
            store,
            orders_ttl,
        }
    }

    /// 종료 신호가 올 때까지 처리
    pub async fn run(self, claim_timeout: Duration, cancel: CancellationToken) {
        tracing::info!(worker = self.id, "sync worker started");

        while !cancel.is_cancelled() {
            match self.run_once(claim_timeout).await {
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(worker = self.id, error = %e, "queue claim failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(CLAIM_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        tracing::info!(worker = self.id, "sync worker stopped");
    }

    /// 항목 하나 claim + 처리
    ///
    /// # Returns
    /// * `Ok(None)` - `claim_timeout` 동안 큐가 비어 있음
    /// * `Ok(Some(outcome))` - 처리 결과
    /// * `Err` - claim 실패 (저장소 에러 또는 읽을 수 없는 항목)
    pub async fn run_once(&self, claim_timeout: Duration) -> Result<Option<SyncOutcome>> {
        match self.queue.claim(claim_timeout).await? {
            Some(claimed) => Ok(Some(self.process(&claimed).await)),
            None => Ok(None),
        }
    }

    async fn process(&self, claimed: &ClaimedItem) -> SyncOutcome {
        let entry = &claimed.item.entry;

        // 1. DB 반영 (트랜잭션)
        let outcome = match self.store.persist_entry(entry).await {
            Ok(true) => SyncOutcome::Persisted,
            Ok(false) => SyncOutcome::AlreadyPersisted,
            Err(e) => {
                tracing::error!(
                    worker = self.id,
                    order_id = %entry.id,
                    request_id = %entry.request_id,
                    error = %format!("{:#}", e),
                    "persistence failure, item left in processing"
                );
                return SyncOutcome::Failed;
            }
        };

        // 2. ack + 캐시 동기화 표시 + 주문 스냅샷 만료 갱신
        let account_key = BalanceCache::key(&entry.agent, &entry.user);
        let mut ops = WriteBehindQueue::ack_ops(claimed);
        ops.extend(self.cache.sync_ops(&account_key, Utc::now().timestamp_millis()));
        ops.push(KvOp::Expire {
            key: key_builder::order_key(&entry.id.to_string()),
            ttl: self.orders_ttl,
        });

        if let Err(e) = self.kv.exec_atomic(ops).await {
            // DB에는 반영됨. 재전달되어도 persist_entry가 중복 반영하지 않음
            tracing::warn!(worker = self.id, order_id = %entry.id, error = %e, "ack failed");
        } else {
            tracing::debug!(worker = self.id, order_id = %entry.id, ?outcome, "ledger entry synced");
        }

        outcome
    }
}

/// 워커 풀
/// Fixed-size pool of sync workers
pub struct SyncWorkerPool {
    kv: Arc<dyn KvStore>,
    store: Arc<dyn LedgerStore>,
    workers: usize,
    claim_timeout: Duration,
    cache_ttl: Duration,
    orders_ttl: Duration,
}

impl SyncWorkerPool {
    pub fn new(kv: Arc<dyn KvStore>, store: Arc<dyn LedgerStore>, config: &AppConfig) -> Self {
        Self {
            kv,
            store,
            workers: config.sync_workers,
            claim_timeout: config.queue_claim_timeout,
            cache_ttl: config.cache_ttl,
            orders_ttl: config.orders_ttl,
        }
    }

    /// 워커 시작
    /// Spawn all workers, each with its own store connection
    pub async fn start(&self, cancel: CancellationToken) -> Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::with_capacity(self.workers);

        for id in 0..self.workers {
            let kv = self.kv.isolated().await?;
            let worker = SyncWorker::new(id, kv, self.store.clone(), self.cache_ttl, self.orders_ttl);
            handles.push(tokio::spawn(worker.run(self.claim_timeout, cancel.clone())));
        }

        tracing::info!(workers = self.workers, "sync worker pool started");
        Ok(handles)
    }
}
