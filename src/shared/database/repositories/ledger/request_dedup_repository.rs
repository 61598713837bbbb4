use sqlx::PgPool;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

/// 직접 모드 중복 요청 기록
/// Request dedup records (direct mode)
pub struct RequestDedupRepository {
    pool: PgPool,
}

impl RequestDedupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 요청 ID 기록
    ///
    /// # Returns
    /// * `true` - 처음 기록됨
    /// * `false` - 이미 같은 (request_id, client_ip)가 있음
    pub async fn register(&self, request_id: &str, client_ip: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO request_dedup (request_id, client_ip, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (request_id, client_ip) DO NOTHING
            "#,
        )
        .bind(request_id)
        .bind(client_ip)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to register request id")?;

        Ok(result.rows_affected() == 1)
    }

    /// 기준 시각 이전 기록 삭제
    /// Delete records created before `older_than`
    pub async fn delete_older_than(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM request_dedup WHERE created_at < $1
            "#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await
        .context("Failed to delete expired request ids")?;

        Ok(result.rows_affected())
    }
}
