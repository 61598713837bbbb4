// =====================================================
// LedgerStore - 영속 저장소 인터페이스
// =====================================================
// 역할: 계정/지갑/원장/에이전트/중복요청 테이블에 대한 트랜잭션 접근
//
// 구현체:
// - PgLedgerStore: PostgreSQL (sqlx)
// - MemoryLedgerStore: 테스트/벤치마크용
//
// 엔진과 워커는 이 trait만 참조합니다.
// =====================================================

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domains::wallet::models::{AccountSnapshot, AgentRecord, LedgerEntry, Mutation};
use crate::shared::errors::LedgerError;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 계정 + 지갑 조회 (캐시 재적재용)
    ///
    /// 계정이 없으면 `None`, 지갑이 없으면 `wallet: None`
    async fn load_account(&self, agent: &str, user: &str) -> Result<Option<AccountSnapshot>>;

    /// 에이전트 메타데이터 조회
    async fn load_agent(&self, agent: &str) -> Result<Option<AgentRecord>>;

    /// 원장 항목 + 지갑 잔고를 하나의 트랜잭션으로 반영
    /// Persist a ledger entry and its wallet balance in one transaction
    ///
    /// 같은 항목이 두 번 전달되어도 한 번만 반영됩니다.
    /// 지갑은 항목이 처음 삽입될 때, 그리고 지갑의 마지막 갱신보다 오래되지 않았을 때만 갱신됩니다.
    ///
    /// # Returns
    /// * `true` - 이번 호출로 처음 반영됨
    /// * `false` - 이미 반영된 항목
    async fn persist_entry(&self, entry: &LedgerEntry) -> Result<bool>;

    /// 오래된 중복 요청 기록 삭제
    ///
    /// # Returns
    /// 삭제된 행 수
    async fn purge_request_dedup(&self, older_than: DateTime<Utc>) -> Result<u64>;

    /// 캐시를 거치지 않는 직접 처리 (DB 트랜잭션이 상호 배제를 담당)
    /// Direct-to-database mutation
    async fn apply_direct(&self, mutation: &Mutation, entry_id: Uuid) -> Result<LedgerEntry, LedgerError>;
}
