// =====================================================
// 통합 테스트 공통 헬퍼
// =====================================================
// 목적: 모든 통합 테스트에서 공통으로 사용하는 셋업 함수 제공
//
// 메모리 저장소(MemoryKvStore, MemoryLedgerStore)를 사용하므로
// Redis / PostgreSQL 없이 실행됩니다.
//
// 사용법:
// ```rust
// mod common;
// use common::*;
//
// #[tokio::test]
// async fn test_something() {
//     let ctx = setup_test();
//     // 테스트 코드...
// }
// ```
// =====================================================

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use wallet_ledger::domains::wallet::engine::MutationEngine;
use wallet_ledger::domains::wallet::models::{Mutation, OperationKind};
use wallet_ledger::domains::wallet::runtime::{SyncWorker, WriteBehindQueue};
use wallet_ledger::shared::config::AppConfig;
use wallet_ledger::shared::database::{LedgerStore, MemoryLedgerStore};
use wallet_ledger::shared::kv::{KvStore, MemoryKvStore};

// 테스트용 상수
pub const TEST_AGENT: &str = "agent01";
pub const TEST_USER: &str = "10001";
pub const INITIAL_BALANCE: i64 = 1000;

/// 테스트 설정 (짧은 락 대기 / 짧은 claim 대기)
pub fn test_config() -> AppConfig {
    AppConfig {
        lock_ttl: Duration::from_secs(10),
        lock_timeout: Duration::from_millis(300),
        lock_retry_interval: Duration::from_millis(5),
        http_client_timeout: Duration::from_secs(2),
        queue_claim_timeout: Duration::from_millis(50),
        sync_workers: 2,
        ..AppConfig::default()
    }
}

pub struct TestContext {
    pub config: AppConfig,
    pub kv: MemoryKvStore,
    pub store: MemoryLedgerStore,
    pub engine: Arc<MutationEngine>,
}

impl TestContext {
    pub fn kv_handle(&self) -> Arc<dyn KvStore> {
        Arc::new(self.kv.clone())
    }

    pub fn store_handle(&self) -> Arc<dyn LedgerStore> {
        Arc::new(self.store.clone())
    }

    pub fn queue(&self) -> WriteBehindQueue {
        WriteBehindQueue::new(self.kv_handle())
    }

    pub fn worker(&self, id: usize) -> SyncWorker {
        SyncWorker::new(
            id,
            self.kv_handle(),
            self.store_handle(),
            self.config.cache_ttl,
            self.config.orders_ttl,
        )
    }

    /// 큐가 빌 때까지 워커 하나로 처리
    ///
    /// # Returns
    /// 처리한 항목 수
    pub async fn drain_queue(&self) -> usize {
        let worker = self.worker(0);
        let mut processed = 0;
        while worker
            .run_once(Duration::from_millis(10))
            .await
            .expect("claim failed")
            .is_some()
        {
            processed += 1;
        }
        processed
    }
}

/// 테스트 전 초기화
///
/// 계정 하나(TEST_AGENT / TEST_USER, 잔고 1000)를 가진 저장소와 엔진을 만듭니다.
pub fn setup_test() -> TestContext {
    setup_test_with_config(test_config())
}

pub fn setup_test_with_config(config: AppConfig) -> TestContext {
    let kv = MemoryKvStore::new();
    let store = MemoryLedgerStore::new();
    store.seed_account(TEST_AGENT, TEST_USER, INITIAL_BALANCE);

    let engine = MutationEngine::new(Arc::new(kv.clone()), Arc::new(store.clone()), &config)
        .expect("Failed to create engine");

    TestContext {
        config,
        kv,
        store,
        engine: Arc::new(engine),
    }
}

pub fn debit(request_id: &str, amount: i64) -> Mutation {
    mutation_for(TEST_AGENT, TEST_USER, request_id, amount, OperationKind::Debit { game_id: None })
}

pub fn credit(request_id: &str, amount: i64) -> Mutation {
    mutation_for(TEST_AGENT, TEST_USER, request_id, amount, OperationKind::Credit)
}

pub fn mutation_for(
    agent: &str,
    user: &str,
    request_id: &str,
    amount: i64,
    kind: OperationKind,
) -> Mutation {
    Mutation {
        agent: agent.to_string(),
        user: user.to_string(),
        request_id: request_id.to_string(),
        amount,
        kind,
        client_ip: None,
    }
}
