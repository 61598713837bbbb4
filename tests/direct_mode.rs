// =====================================================
// 직접 DB 모드 통합 테스트
// =====================================================
// 캐시/락/큐를 거치지 않고 한 트랜잭션으로 반영
// 중복 판정은 (요청 ID, 호출자 IP) 기준
// =====================================================

mod common;
use common::*;

use wallet_ledger::shared::errors::LedgerError;

/// 테스트: 직접 출금은 DB 잔고와 원장 항목을 바로 반영
#[tokio::test]
async fn test_direct_debit_commits_immediately() {
    let ctx = setup_test();

    let mutation = debit("D1", 300).with_client_ip(Some("10.0.0.1".into()));
    let entry = ctx.engine.apply_direct(mutation).await.unwrap();

    assert_eq!(entry.before_amount, 1000);
    assert_eq!(entry.after_amount, 700);
    assert_eq!(ctx.store.wallet_balance(TEST_AGENT, TEST_USER), Some(700));
    assert_eq!(ctx.store.entries().len(), 1);
    assert_eq!(ctx.store.dedup_count(), 1);

    // 캐시와 큐는 사용하지 않음
    assert_eq!(ctx.queue().stats().await.unwrap().pending, 0);
    assert_eq!(ctx.store.account_loads(), 0);
}

/// 테스트: 같은 요청 ID + 같은 IP는 중복
#[tokio::test]
async fn test_direct_duplicate_same_ip() {
    let ctx = setup_test();
    let ip = Some("10.0.0.1".to_string());

    ctx.engine
        .apply_direct(credit("D1", 10).with_client_ip(ip.clone()))
        .await
        .unwrap();
    let err = ctx
        .engine
        .apply_direct(credit("D1", 10).with_client_ip(ip))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::DuplicateRequest { .. }));
    assert_eq!(ctx.store.wallet_balance(TEST_AGENT, TEST_USER), Some(1010));
}

/// 테스트: 같은 요청 ID라도 다른 IP면 별개 요청
#[tokio::test]
async fn test_direct_same_request_id_different_ip() {
    let ctx = setup_test();

    ctx.engine
        .apply_direct(credit("D1", 10).with_client_ip(Some("10.0.0.1".into())))
        .await
        .unwrap();
    ctx.engine
        .apply_direct(credit("D1", 10).with_client_ip(Some("10.0.0.2".into())))
        .await
        .unwrap();

    assert_eq!(ctx.store.wallet_balance(TEST_AGENT, TEST_USER), Some(1020));
    assert_eq!(ctx.store.dedup_count(), 2);
}

/// 테스트: 잔고 부족은 지갑을 바꾸지 않음
#[tokio::test]
async fn test_direct_insufficient_funds() {
    let ctx = setup_test();

    let err = ctx.engine.apply_direct(debit("D1", 5000)).await.unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientFunds { balance: 1000, requested: 5000 }));
    assert_eq!(ctx.store.wallet_balance(TEST_AGENT, TEST_USER), Some(1000));
    assert!(ctx.store.entries().is_empty());
}

/// 테스트: 비활성 계정
#[tokio::test]
async fn test_direct_disabled_account() {
    let ctx = setup_test();
    ctx.store.set_account_enabled(TEST_AGENT, TEST_USER, false);

    let err = ctx.engine.apply_direct(credit("D1", 10)).await.unwrap_err();

    assert!(matches!(err, LedgerError::AccountDisabled { .. }));
    assert!(ctx.store.entries().is_empty());
}
