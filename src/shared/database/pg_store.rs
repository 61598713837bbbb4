// =====================================================
// PgLedgerStore - PostgreSQL 영속 저장소
// =====================================================
// 역할: LedgerStore trait의 운영 구현체
//
// 금액 변환은 이 경계에서만 일어납니다.
// (도메인: i64 최소 단위 <-> DB: NUMERIC(20,2))
// =====================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domains::wallet::models::{AccountSnapshot, AgentRecord, LedgerEntry, Mutation};
use crate::shared::database::repositories::{
    AccountRepository, LedgerEntryRepository, RequestDedupRepository,
};
use crate::shared::database::{Database, LedgerStore};
use crate::shared::errors::LedgerError;
use crate::shared::utils::money;

/// 직접 모드의 DB 에러 (트랜잭션은 drop 시 롤백)
fn persistence_failure(e: anyhow::Error) -> LedgerError {
    LedgerError::PersistenceFailure(format!("{:#}", e))
}

#[derive(Clone)]
pub struct PgLedgerStore {
    db: Database,
}

impl PgLedgerStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// ID로 원장 항목 조회
    pub async fn find_entry(&self, id: Uuid) -> Result<Option<LedgerEntry>> {
        LedgerEntryRepository::new(self.db.pool().clone())
            .find_by_id(id)
            .await
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn load_account(&self, agent: &str, user: &str) -> Result<Option<AccountSnapshot>> {
        AccountRepository::new(self.db.pool().clone())
            .load_account(agent, user)
            .await
    }

    async fn load_agent(&self, agent: &str) -> Result<Option<AgentRecord>> {
        AccountRepository::new(self.db.pool().clone())
            .load_agent(agent)
            .await
    }

    async fn persist_entry(&self, entry: &LedgerEntry) -> Result<bool> {
        // 트랜잭션 시작
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .context("Failed to begin transaction")?;

        // 1. 원장 항목 삽입 (재전달이면 아무 것도 하지 않음)
        let inserted = LedgerEntryRepository::insert(&mut *tx, entry).await?;
        if !inserted {
            tx.commit().await.context("Failed to commit transaction")?;
            return Ok(false);
        }

        // 2. 지갑 행 잠금
        let wallet = AccountRepository::lock_wallet_by_id(&mut *tx, entry.wallet_id)
            .await?
            .with_context(|| format!("Wallet {} not found", entry.wallet_id))?;

        // 3. 더 최신 상태를 덮어쓰지 않도록 순번 비교 후 갱신 (시각은 인스턴스마다 다를 수 있음)
        if entry.seq > wallet.seq {
            AccountRepository::update_wallet_balance(
                &mut *tx,
                wallet.id,
                money::to_decimal(entry.after_amount),
                entry.seq,
                Utc::now(),
            )
            .await?;
        } else {
            tracing::warn!(
                order_id = %entry.id,
                wallet_id = wallet.id,
                entry_seq = entry.seq,
                wallet_seq = wallet.seq,
                "wallet row is newer than ledger entry; balance left unchanged"
            );
        }

        // 트랜잭션 커밋
        tx.commit().await.context("Failed to commit transaction")?;
        Ok(true)
    }

    async fn purge_request_dedup(&self, older_than: DateTime<Utc>) -> Result<u64> {
        RequestDedupRepository::new(self.db.pool().clone())
            .delete_older_than(older_than)
            .await
    }

    async fn apply_direct(&self, mutation: &Mutation, entry_id: Uuid) -> Result<LedgerEntry, LedgerError> {
        // 1. 중복 요청 기록 (트랜잭션 밖에서 먼저 커밋, 거절된 요청도 재사용 불가)
        let client_ip = mutation.client_ip.as_deref().unwrap_or("");
        let registered = RequestDedupRepository::new(self.db.pool().clone())
            .register(&mutation.request_id, client_ip)
            .await
            .map_err(persistence_failure)?;
        if !registered {
            return Err(LedgerError::DuplicateRequest {
                request_id: mutation.request_id.clone(),
            });
        }

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(persistence_failure)?;

        // 2. 계정 상태 확인
        match AccountRepository::account_status(&mut *tx, &mutation.agent, &mutation.user)
            .await
            .map_err(persistence_failure)? {
            None => {
                return Err(LedgerError::AccountNotFound {
                    agent: mutation.agent.clone(),
                    user: mutation.user.clone(),
                })
            }
            Some(false) => {
                return Err(LedgerError::AccountDisabled {
                    agent: mutation.agent.clone(),
                    user: mutation.user.clone(),
                })
            }
            Some(true) => {}
        }

        // 3. 지갑 잠금 + 잔고 계산
        let wallet = AccountRepository::lock_wallet_by_account(&mut *tx, &mutation.agent, &mutation.user)
            .await
            .map_err(persistence_failure)?
            .ok_or_else(|| LedgerError::WalletNotProvisioned {
                agent: mutation.agent.clone(),
                user: mutation.user.clone(),
            })?;

        let before = money::from_decimal(wallet.balance)?;
        let after = mutation.kind.apply(before, mutation.amount)?;

        // 4. 원장 항목 + 지갑 갱신
        let entry = LedgerEntry::accepted(entry_id, mutation, wallet.id, wallet.seq + 1, before, after);
        LedgerEntryRepository::insert(&mut *tx, &entry)
            .await
            .map_err(persistence_failure)?;
        AccountRepository::update_wallet_balance(
            &mut *tx,
            wallet.id,
            money::to_decimal(after),
            entry.seq,
            entry.created_at,
        )
        .await
        .map_err(persistence_failure)?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(persistence_failure)?;
        Ok(entry)
    }
}
