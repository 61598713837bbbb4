use sqlx::{PgConnection, PgPool, Row};
use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domains::wallet::models::{LedgerEntry, OperationKind, OrderStatus};
use crate::shared::utils::money;

/// 원장 항목 저장소
/// Ledger entry repository
pub struct LedgerEntryRepository {
    pool: PgPool,
}

impl LedgerEntryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 원장 항목 삽입 (이미 있으면 무시)
    /// Insert a ledger entry, ignoring an existing id
    ///
    /// # Returns
    /// 새로 삽입되면 `true`
    pub async fn insert(conn: &mut PgConnection, entry: &LedgerEntry) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, agent_id, user_id, wallet_id, kind, game_id, request_id,
                amount, before_amount, after_amount, status, seq, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(entry.id)
        .bind(&entry.agent)
        .bind(&entry.user)
        .bind(entry.wallet_id)
        .bind(entry.kind.as_str())
        .bind(entry.game_id())
        .bind(&entry.request_id)
        .bind(money::to_decimal(entry.amount))
        .bind(money::to_decimal(entry.before_amount))
        .bind(money::to_decimal(entry.after_amount))
        .bind(entry.status.as_str())
        .bind(entry.seq)
        .bind(entry.created_at)
        .bind(chrono::Utc::now())
        .execute(&mut *conn)
        .await
        .context("Failed to insert ledger entry")?;

        Ok(result.rows_affected() == 1)
    }

    /// ID로 원장 항목 조회
    /// Find ledger entry by id
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query(
            r#"
            SELECT id, agent_id, user_id, wallet_id, kind, game_id, request_id,
                   amount, before_amount, after_amount, status, seq, created_at
            FROM ledger_entries
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch ledger entry")?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let kind = match row.get::<String, _>("kind").as_str() {
            "credit" => OperationKind::Credit,
            "debit" => OperationKind::Debit {
                game_id: row.get("game_id"),
            },
            other => bail!("Unknown ledger entry kind: {}", other),
        };
        let status_raw: String = row.get("status");
        let status = OrderStatus::parse(&status_raw)
            .with_context(|| format!("Unknown ledger entry status: {}", status_raw))?;

        Ok(Some(LedgerEntry {
            id: row.get("id"),
            agent: row.get("agent_id"),
            user: row.get("user_id"),
            wallet_id: row.get("wallet_id"),
            kind,
            request_id: row.get("request_id"),
            amount: money::from_decimal(row.get::<Decimal, _>("amount"))?,
            before_amount: money::from_decimal(row.get::<Decimal, _>("before_amount"))?,
            after_amount: money::from_decimal(row.get::<Decimal, _>("after_amount"))?,
            status,
            seq: row.get("seq"),
            created_at: row.get("created_at"),
        }))
    }
}
