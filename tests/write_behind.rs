// =====================================================
// 쓰기 지연 큐 / 동기화 워커 통합 테스트
// =====================================================
// enqueue → claim → DB 반영 → ack
// DB 실패 시 processing에 남음, 재전달은 중복 반영되지 않음
// =====================================================

mod common;
use common::*;

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use wallet_ledger::domains::wallet::engine::BalanceCache;
use wallet_ledger::domains::wallet::runtime::{ProcessingSweeper, SyncOutcome, SyncWorkerPool};
use wallet_ledger::shared::database::LedgerStore;
use wallet_ledger::shared::kv::KvStore;
use wallet_ledger::shared::utils::key_builder;

/// 테스트: 워커가 항목을 DB에 반영하고 ack
#[tokio::test]
async fn test_worker_persists_and_acks() {
    let ctx = setup_test();
    let entry = ctx.engine.apply(debit("R1", 300)).await.unwrap();

    let outcome = ctx.worker(0).run_once(Duration::from_millis(50)).await.unwrap();
    assert_eq!(outcome, Some(SyncOutcome::Persisted));

    let stats = ctx.queue().stats().await.unwrap();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.processing, 0);

    assert_eq!(ctx.store.wallet_balance(TEST_AGENT, TEST_USER), Some(700));
    let entries = ctx.store.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, entry.id);

    // LastSync 기록 + claim 시각 정리
    let key = BalanceCache::key(TEST_AGENT, TEST_USER);
    let record = ctx.engine.cache().read_record(&key).await.unwrap().unwrap();
    assert!(record.last_sync_ms.is_some());
    assert!(ctx
        .kv
        .hget(key_builder::PROCESSING_CLAIMS, &entry.id.to_string())
        .await
        .unwrap()
        .is_none());
}

/// 테스트: 빈 큐에서는 타임아웃 후 None
#[tokio::test]
async fn test_empty_queue_times_out() {
    let ctx = setup_test();

    let outcome = ctx.worker(0).run_once(Duration::from_millis(20)).await.unwrap();
    assert!(outcome.is_none());
}

/// 테스트: DB 반영 실패 → 롤백, 항목은 processing에 남음
#[tokio::test]
async fn test_persistence_failure_keeps_item_claimed() {
    let ctx = setup_test();
    ctx.engine.apply(debit("R1", 300)).await.unwrap();
    ctx.store.set_fail_persist(true);

    let outcome = ctx.worker(0).run_once(Duration::from_millis(50)).await.unwrap();
    assert_eq!(outcome, Some(SyncOutcome::Failed));

    let stats = ctx.queue().stats().await.unwrap();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.processing, 1);
    assert!(ctx.store.entries().is_empty());
    assert_eq!(ctx.store.wallet_balance(TEST_AGENT, TEST_USER), Some(INITIAL_BALANCE));

    // 자동 재시도 없음: 다음 claim은 빈 큐
    let next = ctx.worker(0).run_once(Duration::from_millis(20)).await.unwrap();
    assert!(next.is_none());
}

/// 테스트: 스위퍼가 오래된 processing 항목을 되돌리고, 재처리는 성공
#[tokio::test]
async fn test_sweeper_requeues_stale_items() {
    let ctx = setup_test();
    ctx.engine.apply(debit("R1", 300)).await.unwrap();
    ctx.store.set_fail_persist(true);
    ctx.worker(0).run_once(Duration::from_millis(50)).await.unwrap();

    let sweeper = ProcessingSweeper::new(ctx.queue(), Duration::from_millis(30), Duration::from_secs(1));

    // 아직 기준 시간 전
    assert_eq!(sweeper.run_once().await.unwrap(), 0);

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(sweeper.run_once().await.unwrap(), 1);

    let stats = ctx.queue().stats().await.unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.processing, 0);

    ctx.store.set_fail_persist(false);
    let outcome = ctx.worker(0).run_once(Duration::from_millis(50)).await.unwrap();
    assert_eq!(outcome, Some(SyncOutcome::Persisted));
    assert_eq!(ctx.store.wallet_balance(TEST_AGENT, TEST_USER), Some(700));
}

/// 테스트: 이미 반영된 항목이 다시 전달되면 ack만 하고 잔고는 그대로
#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let ctx = setup_test();
    ctx.engine.apply(debit("R1", 300)).await.unwrap();

    // 같은 원본 문자열을 복제해서 두 번 전달
    let raw = ctx.queue().pending_items().await.unwrap().remove(0);
    ctx.kv.lpush(key_builder::PENDING_QUEUE, &raw).await.unwrap();

    let worker = ctx.worker(0);
    let first = worker.run_once(Duration::from_millis(50)).await.unwrap();
    let second = worker.run_once(Duration::from_millis(50)).await.unwrap();

    assert_eq!(first, Some(SyncOutcome::Persisted));
    assert_eq!(second, Some(SyncOutcome::AlreadyPersisted));
    assert_eq!(ctx.store.entries().len(), 1);
    assert_eq!(ctx.store.wallet_balance(TEST_AGENT, TEST_USER), Some(700));

    let stats = ctx.queue().stats().await.unwrap();
    assert_eq!(stats.processing, 0);
}

/// 테스트: 늦게 도착한 오래된 항목은 최신 잔고를 덮어쓰지 않음
#[tokio::test]
async fn test_stale_entry_does_not_overwrite_newer_balance() {
    let ctx = setup_test();
    ctx.engine.apply(debit("R1", 300)).await.unwrap();
    ctx.engine.apply(debit("R2", 200)).await.unwrap();

    // 두 번째 항목(머리)을 먼저 처리하도록 순서를 뒤집음
    let items = ctx.queue().pending_items().await.unwrap();
    let (newer, older) = (items[0].clone(), items[1].clone());
    ctx.kv.lrem(key_builder::PENDING_QUEUE, 0, &newer).await.unwrap();
    ctx.kv.lrem(key_builder::PENDING_QUEUE, 0, &older).await.unwrap();
    ctx.kv.lpush(key_builder::PENDING_QUEUE, &older).await.unwrap();
    ctx.kv.lpush(key_builder::PENDING_QUEUE, &newer).await.unwrap();

    assert_eq!(ctx.drain_queue().await, 2);

    assert_eq!(ctx.store.entries().len(), 2);
    assert_eq!(ctx.store.wallet_balance(TEST_AGENT, TEST_USER), Some(500));
}

/// 테스트: 인스턴스 시계가 어긋나도 락 순서대로 잔고가 반영됨
#[tokio::test]
async fn test_wallet_follows_lock_order_not_clock() {
    let ctx = setup_test();
    let mut first = ctx.engine.apply(debit("R1", 100)).await.unwrap();
    let mut second = ctx.engine.apply(debit("R2", 100)).await.unwrap();
    assert_eq!((first.seq, second.seq), (1, 2));

    // 첫 항목을 만든 인스턴스의 시계가 2초 앞서 있었던 경우
    let now = Utc::now();
    first.created_at = now + chrono::Duration::seconds(2);
    second.created_at = now;

    assert!(ctx.store.persist_entry(&first).await.unwrap());
    assert!(ctx.store.persist_entry(&second).await.unwrap());

    assert_eq!(ctx.store.wallet_balance(TEST_AGENT, TEST_USER), Some(800));
}

/// 테스트: 캐시가 비워진 뒤 재적재되면 DB 순번에서 이어감
#[tokio::test]
async fn test_sequence_continues_after_reload() {
    let ctx = setup_test();
    ctx.engine.apply(credit("R1", 10)).await.unwrap();
    ctx.engine.apply(credit("R2", 10)).await.unwrap();
    assert_eq!(ctx.drain_queue().await, 2);

    ctx.kv.del(&BalanceCache::key(TEST_AGENT, TEST_USER)).await.unwrap();

    let entry = ctx.engine.apply(credit("R3", 10)).await.unwrap();
    assert_eq!(entry.seq, 3);
    assert_eq!(entry.after_amount, INITIAL_BALANCE + 30);

    assert_eq!(ctx.drain_queue().await, 1);
    assert_eq!(ctx.store.wallet_balance(TEST_AGENT, TEST_USER), Some(INITIAL_BALANCE + 30));
}

/// 테스트: 워커 풀은 취소 신호를 받으면 종료
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_worker_pool_drains_and_stops_on_cancel() {
    let ctx = setup_test();
    for i in 0..20 {
        ctx.engine.apply(credit(&format!("R{}", i), 5)).await.unwrap();
    }

    let pool = SyncWorkerPool::new(ctx.kv_handle(), ctx.store_handle(), &ctx.config);
    let cancel = CancellationToken::new();
    let handles = pool.start(cancel.clone()).await.unwrap();
    assert_eq!(handles.len(), ctx.config.sync_workers);

    // 모두 반영될 때까지 대기
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while ctx.store.entries().len() < 20 {
        assert!(tokio::time::Instant::now() < deadline, "workers did not drain the queue");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    cancel.cancel();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    assert_eq!(ctx.store.wallet_balance(TEST_AGENT, TEST_USER), Some(INITIAL_BALANCE + 100));
    let stats = ctx.queue().stats().await.unwrap();
    assert_eq!((stats.pending, stats.processing), (0, 0));
}
