// =====================================================
// 잔고 변경 엔진 통합 테스트
// =====================================================
// 중복 요청, 잔고 규칙, 락 대기 시간 초과, 주문 스냅샷
// =====================================================

mod common;
use common::*;

use std::time::Duration;

use wallet_ledger::domains::wallet::engine::BalanceCache;
use wallet_ledger::domains::wallet::models::{OperationKind, OrderStatus};
use wallet_ledger::shared::errors::LedgerError;
use wallet_ledger::shared::kv::KvStore;
use wallet_ledger::shared::utils::key_builder;

fn account_key() -> String {
    BalanceCache::key(TEST_AGENT, TEST_USER)
}

/// 테스트: 출금 성공 시 before/after와 캐시 잔고
#[tokio::test]
async fn test_debit_updates_cache_and_enqueues() {
    let ctx = setup_test();

    let entry = ctx.engine.apply(debit("R1", 300)).await.unwrap();

    assert_eq!(entry.before_amount, 1000);
    assert_eq!(entry.after_amount, 700);
    assert_eq!(entry.status, OrderStatus::Ok);
    assert_eq!(ctx.engine.cache().read(&account_key()).await.unwrap(), Some(700));

    let stats = ctx.queue().stats().await.unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.processing, 0);

    // 락은 해제되어 있어야 함
    assert!(!ctx.kv.contains_key(&key_builder::lock_key(TEST_AGENT, TEST_USER)));
}

/// 테스트: 입금은 잔고를 늘림
#[tokio::test]
async fn test_credit_increases_balance() {
    let ctx = setup_test();

    let entry = ctx.engine.apply(credit("R1", 250)).await.unwrap();

    assert_eq!(entry.before_amount, 1000);
    assert_eq!(entry.after_amount, 1250);
    assert_eq!(entry.kind, OperationKind::Credit);
}

/// 테스트: 같은 요청 ID는 한 번만 반영
#[tokio::test]
async fn test_duplicate_request_is_rejected() {
    let ctx = setup_test();

    ctx.engine.apply(debit("R1", 300)).await.unwrap();
    let err = ctx.engine.apply(debit("R1", 300)).await.unwrap_err();

    assert!(matches!(err, LedgerError::DuplicateRequest { ref request_id } if request_id == "R1"));
    assert_eq!(ctx.engine.cache().read(&account_key()).await.unwrap(), Some(700));
    assert_eq!(ctx.queue().stats().await.unwrap().pending, 1);
}

/// 테스트: 동시에 같은 요청 ID 제출 → 정확히 하나만 성공
#[tokio::test]
async fn test_concurrent_duplicate_applies_once() {
    let ctx = setup_test();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = ctx.engine.clone();
        handles.push(tokio::spawn(async move { engine.apply(debit("R-same", 100)).await }));
    }

    let mut accepted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(LedgerError::DuplicateRequest { .. }) => duplicates += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(duplicates, 9);
    assert_eq!(ctx.engine.cache().read(&account_key()).await.unwrap(), Some(900));
}

/// 테스트: 잔고 부족 출금은 캐시와 큐를 건드리지 않음
#[tokio::test]
async fn test_insufficient_funds_leaves_state_untouched() {
    let ctx = setup_test();
    ctx.engine.apply(debit("R1", 300)).await.unwrap();

    let err = ctx.engine.apply(debit("R2", 5000)).await.unwrap_err();

    assert!(matches!(
        err,
        LedgerError::InsufficientFunds { balance: 700, requested: 5000 }
    ));
    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
    assert_eq!(ctx.engine.cache().read(&account_key()).await.unwrap(), Some(700));
    assert_eq!(ctx.queue().stats().await.unwrap().pending, 1);
    assert!(!ctx.kv.contains_key(&key_builder::lock_key(TEST_AGENT, TEST_USER)));
}

/// 테스트: 잔고 전액 출금은 허용 (0까지)
#[tokio::test]
async fn test_debit_to_zero_is_allowed() {
    let ctx = setup_test();

    let entry = ctx.engine.apply(debit("R1", INITIAL_BALANCE)).await.unwrap();
    assert_eq!(entry.after_amount, 0);

    let err = ctx.engine.apply(debit("R2", 1)).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { balance: 0, .. }));
}

/// 테스트: 잘못된 입력은 요청 ID를 소모하지 않음
#[tokio::test]
async fn test_invalid_amount_does_not_consume_request_id() {
    let ctx = setup_test();

    let err = ctx.engine.apply(debit("R1", 0)).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidRequest(_)));
    assert!(!ctx.kv.contains_key(&key_builder::request_key("R1")));

    // 같은 ID로 올바른 요청은 성공
    ctx.engine.apply(debit("R1", 10)).await.unwrap();
}

/// 테스트: 락이 계속 잡혀 있으면 LockTimeout + FailedRequest 기록
#[tokio::test]
async fn test_lock_timeout_records_failed_request() {
    let ctx = setup_test();
    let lock_key = key_builder::lock_key(TEST_AGENT, TEST_USER);
    assert!(ctx
        .kv
        .set_nx(&lock_key, "someone-else", Duration::from_secs(10))
        .await
        .unwrap());

    let err = ctx.engine.apply(debit("R1", 100)).await.unwrap_err();

    assert!(matches!(err, LedgerError::LockTimeout { .. }));
    assert_eq!(err.status_code().as_u16(), 500);

    let failed = ctx.kv.lrange(key_builder::FAILED_REQUESTS, 0, -1).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].contains("R1"));

    // 다른 사람의 락은 그대로, 큐는 비어 있음
    assert_eq!(ctx.kv.get(&lock_key).await.unwrap().as_deref(), Some("someone-else"));
    assert_eq!(ctx.queue().stats().await.unwrap().pending, 0);
}

/// 테스트: 락이 풀리면 대기 중인 요청이 이어서 처리됨
#[tokio::test]
async fn test_waiter_proceeds_after_release() {
    let ctx = setup_test();
    let lock_key = key_builder::lock_key(TEST_AGENT, TEST_USER);
    ctx.kv
        .set_nx(&lock_key, "someone-else", Duration::from_secs(10))
        .await
        .unwrap();

    let kv = ctx.kv.clone();
    let releaser = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        kv.del(&key_builder::lock_key(TEST_AGENT, TEST_USER)).await.unwrap();
    });

    let entry = ctx.engine.apply(debit("R1", 100)).await.unwrap();
    releaser.await.unwrap();

    assert_eq!(entry.after_amount, 900);
}

/// 테스트: 성공한 변경의 주문 스냅샷 조회
#[tokio::test]
async fn test_order_snapshot_lookup() {
    let ctx = setup_test();

    let entry = ctx.engine.apply(debit("R1", 300)).await.unwrap();
    let snapshot = ctx.engine.order_snapshot(&entry.id.to_string()).await.unwrap();
    assert_eq!(snapshot, entry);

    let ttl = ctx.kv.ttl(&key_builder::order_key(&entry.id.to_string())).unwrap();
    assert!(ttl <= ctx.config.orders_ttl);

    let err = ctx.engine.order_snapshot("missing").await.unwrap_err();
    assert!(matches!(err, LedgerError::OrderNotFound { .. }));
}

/// 테스트: 출금 시 게임 ID가 캐시에 기록됨
#[tokio::test]
async fn test_debit_records_last_game_id() {
    let ctx = setup_test();
    let mut mutation = debit("R1", 100);
    mutation.kind = OperationKind::Debit { game_id: Some(42) };

    ctx.engine.apply(mutation).await.unwrap();

    let record = ctx.engine.cache().read_record(&account_key()).await.unwrap().unwrap();
    assert_eq!(record.last_game_id, Some(42));
    assert!(record.last_change_ms.is_some());
}

/// 테스트: 캐시 저장소 장애 → CacheUnavailable, 아무것도 반영되지 않음
#[tokio::test]
async fn test_kv_outage_surfaces_cache_unavailable() {
    let ctx = setup_test();
    ctx.kv.set_unavailable(true);

    let err = ctx.engine.apply(debit("R1", 100)).await.unwrap_err();
    assert!(matches!(err, LedgerError::CacheUnavailable(_)));
    assert_eq!(err.status_code().as_u16(), 503);

    ctx.kv.set_unavailable(false);
    assert_eq!(ctx.queue().stats().await.unwrap().pending, 0);
}
