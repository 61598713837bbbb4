// =====================================================
// BalanceCache - 캐시 기반 잔고 관리 (cache-aside)
// =====================================================
// 역할: 계정별 잔고/상태/지갑 ID를 KvStore hash에 보관
//
// 레코드 (Users:{agent}:{user}):
//   Wallet      잔고 (최소 단위)
//   WalletID    지갑 ID (없으면 지갑 미생성)
//   Status      "1" / "0"
//   Seq         마지막 변경 순번 (락 순서)
//   LastChange  마지막 변경 시각 (epoch ms)
//   LastSync    마지막 DB 반영 시각 (epoch ms)
//   LastGameID  마지막 출금의 게임 ID
//
// 캐시는 원본이 아닙니다. 언제든 비어 있을 수 있고 DB에서 다시 채웁니다.
// Wallet 필드가 없거나 읽을 수 없으면 미스로 취급합니다.
// WalletID / Status / Seq가 빠진 레코드도 미스입니다.
// =====================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use crate::domains::wallet::models::{AccountSnapshot, CacheDiff, CachedBalance};
use crate::shared::kv::{KvOp, KvStore};
use crate::shared::utils::key_builder::{
    self, FIELD_LAST_CHANGE, FIELD_LAST_GAME_ID, FIELD_LAST_SYNC, FIELD_SEQ, FIELD_STATUS,
    FIELD_WALLET, FIELD_WALLET_ID,
};

#[derive(Clone)]
pub struct BalanceCache {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

fn parse_i64(raw: Option<String>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
}

fn status_value(enabled: bool) -> String {
    let value = if enabled { "1" } else { "0" };
    value.to_string()
}

impl BalanceCache {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    pub fn key(agent: &str, user: &str) -> String {
        key_builder::account_key(agent, user)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 조회 (Read)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 잔고 조회 (None = 미스)
    pub async fn read(&self, key: &str) -> Result<Option<i64>> {
        let raw = self.kv.hget(key, FIELD_WALLET).await?;
        if let Some(value) = &raw {
            if value.trim().parse::<i64>().is_err() {
                tracing::warn!(key, value = %value, "unreadable cached balance, treating as miss");
            }
        }
        Ok(parse_i64(raw))
    }

    /// 레코드 전체 조회
    /// Read the full record
    ///
    /// Wallet / WalletID / Status / Seq 중 하나라도 없으면 미스로 취급합니다.
    /// (일부 필드만 남은 레코드는 DB에서 다시 채움)
    pub async fn read_record(&self, key: &str) -> Result<Option<CachedBalance>> {
        let balance = match self.read(key).await? {
            Some(b) => b,
            None => return Ok(None),
        };

        let wallet_id = parse_i64(self.kv.hget(key, FIELD_WALLET_ID).await?);
        let status = self.kv.hget(key, FIELD_STATUS).await?;
        let seq = parse_i64(self.kv.hget(key, FIELD_SEQ).await?);

        let (wallet_id, status, seq) = match (wallet_id, status, seq) {
            (Some(w), Some(st), Some(sq)) => (w, st, sq),
            _ => {
                tracing::warn!(key, "incomplete cache record, treating as miss");
                return Ok(None);
            }
        };

        Ok(Some(CachedBalance {
            balance,
            wallet_id: Some(wallet_id),
            enabled: matches!(status.as_str(), "1" | "true"),
            seq,
            last_change_ms: parse_i64(self.kv.hget(key, FIELD_LAST_CHANGE).await?),
            last_sync_ms: parse_i64(self.kv.hget(key, FIELD_LAST_SYNC).await?),
            last_game_id: parse_i64(self.kv.hget(key, FIELD_LAST_GAME_ID).await?),
        }))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 쓰기 (Write)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 필드 쓰기 + 만료 갱신 (원자적)
    pub async fn write(&self, key: &str, fields: Vec<(String, String)>) -> Result<()> {
        self.kv
            .exec_atomic(vec![
                KvOp::HSet { key: key.to_string(), fields },
                self.expire_op(key),
            ])
            .await
    }

    /// DB 스냅샷으로 캐시 채우기 (필드 + 만료를 한 배치로)
    /// Populate the record from the durable store
    ///
    /// 지갑이 없으면 아무 것도 쓰지 않습니다. (호출자가 WalletNotProvisioned로 처리)
    pub async fn populate(&self, key: &str, snapshot: &AccountSnapshot) -> Result<()> {
        let wallet = match &snapshot.wallet {
            Some(w) => w,
            None => return Ok(()),
        };

        let now = Utc::now().timestamp_millis().to_string();
        let fields = vec![
            (FIELD_WALLET.to_string(), wallet.balance.to_string()),
            (FIELD_WALLET_ID.to_string(), wallet.id.to_string()),
            (FIELD_STATUS.to_string(), status_value(snapshot.enabled)),
            (FIELD_SEQ.to_string(), wallet.seq.to_string()),
            (FIELD_LAST_SYNC.to_string(), now.clone()),
            (FIELD_LAST_CHANGE.to_string(), now),
        ];
        self.write(key, fields).await
    }

    /// 변경 결과를 캐시에 쓰는 명령 (큐 적재와 같은 배치에 들어감)
    ///
    /// 조회 후 레코드가 만료되었을 수 있으므로 WalletID / Status까지 전체 레코드를 씁니다.
    pub fn mutation_ops(&self, key: &str, record: &CachedBalance, diff: &CacheDiff) -> Vec<KvOp> {
        let mut fields = vec![
            (FIELD_WALLET.to_string(), diff.wallet.to_string()),
            (FIELD_SEQ.to_string(), diff.seq.to_string()),
            (FIELD_STATUS.to_string(), status_value(record.enabled)),
            (FIELD_LAST_CHANGE.to_string(), diff.last_change_ms.to_string()),
        ];
        if let Some(wallet_id) = record.wallet_id {
            fields.push((FIELD_WALLET_ID.to_string(), wallet_id.to_string()));
        }
        if let Some(game_id) = diff.last_game_id {
            fields.push((FIELD_LAST_GAME_ID.to_string(), game_id.to_string()));
        }
        vec![
            KvOp::HSet { key: key.to_string(), fields },
            self.expire_op(key),
        ]
    }

    /// DB 반영 완료 표시 명령 (LastSync + 만료 갱신)
    pub fn sync_ops(&self, key: &str, synced_at_ms: i64) -> Vec<KvOp> {
        vec![
            KvOp::HSet {
                key: key.to_string(),
                fields: vec![(FIELD_LAST_SYNC.to_string(), synced_at_ms.to_string())],
            },
            self.expire_op(key),
        ]
    }

    fn expire_op(&self, key: &str) -> KvOp {
        KvOp::Expire { key: key.to_string(), ttl: self.ttl }
    }
}
