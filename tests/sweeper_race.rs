// =====================================================
// 처리 중 항목 스위퍼 경쟁 조건 테스트
// =====================================================
// 스위퍼가 processing 목록을 읽은 뒤 워커의 ack가 끼어드는 경우
// - claim 시각 조회 전 ack: claim 기록이 새로 생기면 안 됨
// - claim 시각 조회 후 ack: 이미 ack된 항목이 다시 적재되면 안 됨
// =====================================================

mod common;
use common::*;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use wallet_ledger::domains::wallet::models::QueueItem;
use wallet_ledger::domains::wallet::runtime::{SyncOutcome, WriteBehindQueue};
use wallet_ledger::shared::kv::{KvOp, KvStore, MemoryKvStore};
use wallet_ledger::shared::utils::key_builder::{PROCESSING_CLAIMS, PROCESSING_QUEUE};

/// claim 시각을 조회할 때 워커 ack를 한 번 끼워 넣는 저장소
struct AckDuringSweep {
    inner: MemoryKvStore,
    pending_ack: Mutex<Option<(String, String)>>,
    ack_after_read: bool,
}

impl AckDuringSweep {
    fn new(inner: MemoryKvStore, raw: String, order_id: String, ack_after_read: bool) -> Self {
        Self {
            inner,
            pending_ack: Mutex::new(Some((raw, order_id))),
            ack_after_read,
        }
    }

    async fn ack_once(&self) -> Result<()> {
        let taken = self.pending_ack.lock().take();
        if let Some((raw, order_id)) = taken {
            self.inner
                .exec_atomic(vec![
                    KvOp::LRem { key: PROCESSING_QUEUE.to_string(), count: -1, value: raw },
                    KvOp::HDel { key: PROCESSING_CLAIMS.to_string(), field: order_id },
                ])
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for AckDuringSweep {
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.inner.set_nx(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.inner.del(key).await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        if key != PROCESSING_CLAIMS {
            return self.inner.hget(key, field).await;
        }
        if !self.ack_after_read {
            self.ack_once().await?;
        }
        let value = self.inner.hget(key, field).await?;
        if self.ack_after_read {
            self.ack_once().await?;
        }
        Ok(value)
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        self.inner.hset(key, fields).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.inner.expire(key, ttl).await
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        self.inner.lpush(key, value).await
    }

    async fn brpoplpush(&self, source: &str, destination: &str, timeout: Duration) -> Result<Option<String>> {
        self.inner.brpoplpush(source, destination, timeout).await
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> Result<i64> {
        self.inner.lrem(key, count, value).await
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.inner.lrange(key, start, stop).await
    }

    async fn llen(&self, key: &str) -> Result<i64> {
        self.inner.llen(key).await
    }

    async fn exec_atomic(&self, ops: Vec<KvOp>) -> Result<()> {
        self.inner.exec_atomic(ops).await
    }

    async fn lmove_if_present(
        &self,
        source: &str,
        destination: &str,
        value: &str,
        hash: &str,
        field: &str,
    ) -> Result<bool> {
        self.inner.lmove_if_present(source, destination, value, hash, field).await
    }

    async fn hsetnx_if_listed(
        &self,
        list: &str,
        value: &str,
        hash: &str,
        field: &str,
        field_value: &str,
    ) -> Result<bool> {
        self.inner.hsetnx_if_listed(list, value, hash, field, field_value).await
    }

    async fn isolated(&self) -> Result<Arc<dyn KvStore>> {
        self.inner.isolated().await
    }
}

/// 실패한 반영으로 processing에 남은 항목 하나를 만들고 (원본, 주문 ID) 반환
async fn leave_item_in_processing(ctx: &TestContext) -> (String, String) {
    ctx.engine.apply(debit("R1", 300)).await.unwrap();
    ctx.store.set_fail_persist(true);
    let outcome = ctx.worker(0).run_once(Duration::from_millis(50)).await.unwrap();
    assert_eq!(outcome, Some(SyncOutcome::Failed));

    let raw = ctx.queue().processing_items().await.unwrap().remove(0);
    let item: QueueItem = serde_json::from_str(&raw).unwrap();
    (raw, item.entry.id.to_string())
}

/// 테스트: claim 시각 조회 전에 ack되면 claim 기록을 남기지 않음
#[tokio::test]
async fn test_ack_before_stamp_leaves_no_claim_record() {
    let ctx = setup_test();
    let (raw, order_id) = leave_item_in_processing(&ctx).await;

    // claim 시각이 없는 상태로 만듦
    ctx.kv.exec_atomic(vec![KvOp::HDel { key: PROCESSING_CLAIMS.to_string(), field: order_id.clone() }])
        .await
        .unwrap();

    let kv = AckDuringSweep::new(ctx.kv.clone(), raw, order_id.clone(), false);
    let queue = WriteBehindQueue::new(Arc::new(kv));

    assert_eq!(queue.requeue_stale(Duration::from_secs(60)).await.unwrap(), 0);

    assert!(ctx.kv.hget(PROCESSING_CLAIMS, &order_id).await.unwrap().is_none());
    let stats = ctx.queue().stats().await.unwrap();
    assert_eq!((stats.pending, stats.processing), (0, 0));
}

/// 테스트: 되돌리기 직전에 ack되면 다시 적재하지 않음
#[tokio::test]
async fn test_ack_before_requeue_is_not_requeued() {
    let ctx = setup_test();
    let (raw, order_id) = leave_item_in_processing(&ctx).await;

    let kv = AckDuringSweep::new(ctx.kv.clone(), raw, order_id.clone(), true);
    let queue = WriteBehindQueue::new(Arc::new(kv));

    // 기준 시간 0: claim 기록이 있으면 바로 되돌리기 대상
    assert_eq!(queue.requeue_stale(Duration::ZERO).await.unwrap(), 0);

    assert!(ctx.kv.hget(PROCESSING_CLAIMS, &order_id).await.unwrap().is_none());
    let stats = ctx.queue().stats().await.unwrap();
    assert_eq!((stats.pending, stats.processing), (0, 0));
}
