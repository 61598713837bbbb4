use serde::{Deserialize, Serialize};

use super::ledger_entry::LedgerEntry;

/// 쓰기 지연 큐 항목
/// Write-behind queue item
///
/// 직렬화된 JSON 문자열 그대로 큐에 저장되고,
/// ack는 같은 문자열을 값으로 찾아서 제거합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub request_id: String,
    pub entry: LedgerEntry,
    pub cache: CacheDiff,
}

/// 변경으로 캐시에 기록된 필드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheDiff {
    pub wallet: i64,
    pub seq: i64,
    pub last_change_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_game_id: Option<i64>,
}

impl QueueItem {
    pub fn new(entry: LedgerEntry, last_change_ms: i64) -> Self {
        Self {
            request_id: entry.request_id.clone(),
            cache: CacheDiff {
                wallet: entry.after_amount,
                seq: entry.seq,
                last_change_ms,
                last_game_id: entry.game_id(),
            },
            entry,
        }
    }
}

/// 워커가 가져간 항목 (ack용 원본 문자열 포함)
/// A claimed item together with its raw payload
#[derive(Debug, Clone)]
pub struct ClaimedItem {
    pub raw: String,
    pub item: QueueItem,
}
