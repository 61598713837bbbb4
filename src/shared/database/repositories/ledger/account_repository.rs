use sqlx::{PgConnection, PgPool, Row};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domains::wallet::models::{AccountSnapshot, AgentRecord, WalletSnapshot};
use crate::shared::utils::money;

/// 계정 / 지갑 / 에이전트 조회
/// Accounts, wallets and agents
pub struct AccountRepository {
    pool: PgPool,
}

/// FOR UPDATE로 잠근 지갑 행
pub struct LockedWallet {
    pub id: i64,
    pub balance: Decimal,
    pub seq: i64,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 계정 + 지갑 조회
    /// Load account with its wallet
    ///
    /// 상태는 사용자와 에이전트가 모두 활성일 때만 활성
    pub async fn load_account(&self, agent: &str, user: &str) -> Result<Option<AccountSnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT a.status AS user_status,
                   ag.status AS agent_status,
                   w.id AS wallet_id,
                   w.balance,
                   w.currency,
                   w.seq,
                   w.updated_at
            FROM accounts a
            INNER JOIN agents ag ON ag.id = a.agent_id
            LEFT JOIN wallets w ON w.agent_id = a.agent_id AND w.user_id = a.user_id
            WHERE a.agent_id = $1 AND a.user_id = $2
            "#,
        )
        .bind(agent)
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let user_status: bool = row.get("user_status");
        let agent_status: bool = row.get("agent_status");

        let wallet = match row.get::<Option<i64>, _>("wallet_id") {
            Some(id) => {
                let balance: Decimal = row.get("balance");
                Some(WalletSnapshot {
                    id,
                    balance: money::from_decimal(balance)
                        .with_context(|| format!("Wallet {} balance is not representable", id))?,
                    currency: row.get("currency"),
                    seq: row.get("seq"),
                    updated_at: row.get("updated_at"),
                })
            }
            None => None,
        };

        Ok(Some(AccountSnapshot {
            agent: agent.to_string(),
            user: user.to_string(),
            enabled: user_status && agent_status,
            wallet,
        }))
    }

    /// 에이전트 조회
    /// Load agent metadata
    pub async fn load_agent(&self, agent: &str) -> Result<Option<AgentRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, status, single_wallet_url
            FROM agents
            WHERE id = $1
            "#,
        )
        .bind(agent)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch agent")?;

        Ok(row.map(|row| AgentRecord {
            agent_id: row.get("id"),
            enabled: row.get("status"),
            single_wallet_url: row
                .get::<Option<String>, _>("single_wallet_url")
                .filter(|url| !url.is_empty()),
        }))
    }

    /// 계정 상태 조회 (트랜잭션 안에서)
    ///
    /// # Returns
    /// * `None` - 계정 없음
    /// * `Some(enabled)` - 사용자 && 에이전트 활성 여부
    pub async fn account_status(
        conn: &mut PgConnection,
        agent: &str,
        user: &str,
    ) -> Result<Option<bool>> {
        let row = sqlx::query(
            r#"
            SELECT a.status AND ag.status AS enabled
            FROM accounts a
            INNER JOIN agents ag ON ag.id = a.agent_id
            WHERE a.agent_id = $1 AND a.user_id = $2
            "#,
        )
        .bind(agent)
        .bind(user)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch account status")?;

        Ok(row.map(|r| r.get("enabled")))
    }

    /// 지갑 행 잠금 (SELECT ... FOR UPDATE)
    /// Lock the wallet row for the rest of the transaction
    pub async fn lock_wallet_by_account(
        conn: &mut PgConnection,
        agent: &str,
        user: &str,
    ) -> Result<Option<LockedWallet>> {
        let row = sqlx::query(
            r#"
            SELECT id, balance, seq
            FROM wallets
            WHERE agent_id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(agent)
        .bind(user)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to lock wallet")?;

        Ok(row.map(|r| LockedWallet {
            id: r.get("id"),
            balance: r.get("balance"),
            seq: r.get("seq"),
        }))
    }

    pub async fn lock_wallet_by_id(conn: &mut PgConnection, wallet_id: i64) -> Result<Option<LockedWallet>> {
        let row = sqlx::query(
            r#"
            SELECT id, balance, seq
            FROM wallets
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(wallet_id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to lock wallet")?;

        Ok(row.map(|r| LockedWallet {
            id: r.get("id"),
            balance: r.get("balance"),
            seq: r.get("seq"),
        }))
    }

    /// 지갑 잔고 + 순번 갱신
    /// Set wallet balance together with the sequence of the entry it came from
    pub async fn update_wallet_balance(
        conn: &mut PgConnection,
        wallet_id: i64,
        balance: Decimal,
        seq: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE wallets
            SET balance = $1, seq = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(balance)
        .bind(seq)
        .bind(updated_at)
        .bind(wallet_id)
        .execute(&mut *conn)
        .await
        .context("Failed to update wallet balance")?;

        Ok(())
    }
}
