use chrono::{DateTime, Utc};
use serde::Serialize;

/// DB에서 읽은 계정 + 지갑 스냅샷
/// Account snapshot loaded from the durable store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub agent: String,
    pub user: String,
    /// 사용자 활성 && 에이전트 활성
    pub enabled: bool,
    /// 지갑이 아직 없으면 None
    pub wallet: Option<WalletSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSnapshot {
    pub id: i64,
    /// 최소 단위
    pub balance: i64,
    pub currency: String,
    /// 마지막으로 반영된 원장 항목의 순번
    pub seq: i64,
    pub updated_at: DateTime<Utc>,
}

/// 에이전트 메타데이터
/// Agent metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRecord {
    pub agent_id: String,
    pub enabled: bool,
    /// 단일 외부 지갑 URL (없으면 단일 지갑 모드 불가)
    pub single_wallet_url: Option<String>,
}

/// 캐시에 있는 잔고 레코드
/// Balance record as held by the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBalance {
    pub balance: i64,
    pub wallet_id: Option<i64>,
    pub enabled: bool,
    /// 마지막 변경 순번
    pub seq: i64,
    pub last_change_ms: Option<i64>,
    pub last_sync_ms: Option<i64>,
    pub last_game_id: Option<i64>,
}
