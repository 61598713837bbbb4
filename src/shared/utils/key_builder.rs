/// 키 생성기
/// Key builder for the key-value store
///
/// 모든 컴포넌트는 이 함수들을 통해서만 키를 만듭니다.
/// 키 형식이 바뀌면 여기만 수정하면 됩니다.
///
/// | 용도 | 키 |
/// |------|----|
/// | 잔고 캐시 (hash) | `Users:{agent}:{user}` |
/// | 계정 락 | `LockOps:{agent}:{user}` |
/// | 에이전트 캐시 (hash) | `Agent:{agent}` |
/// | 중복 요청 방지 | `RequestID:{request_id}` |
/// | 주문 스냅샷 | `Orders:{order_id}` |
/// | 대기 큐 / 처리 중 큐 | `Jobs` / `Processing` |

/// 대기 중인 동기화 작업 리스트
pub const PENDING_QUEUE: &str = "Jobs";

/// 워커가 가져간 (아직 DB 반영 전) 작업 리스트
pub const PROCESSING_QUEUE: &str = "Processing";

/// 처리 중 작업의 claim 시각 (order_id -> epoch ms)
pub const PROCESSING_CLAIMS: &str = "ProcessingClaims";

/// 락 획득 실패로 수동 처리가 필요한 요청 리스트
pub const FAILED_REQUESTS: &str = "FailedRequest";

// 잔고 캐시 hash 필드
pub const FIELD_WALLET: &str = "Wallet";
pub const FIELD_WALLET_ID: &str = "WalletID";
pub const FIELD_LAST_CHANGE: &str = "LastChange";
pub const FIELD_LAST_SYNC: &str = "LastSync";
pub const FIELD_LAST_GAME_ID: &str = "LastGameID";
pub const FIELD_STATUS: &str = "Status";
pub const FIELD_SEQ: &str = "Seq";

// 에이전트 캐시 hash 필드
pub const FIELD_AGENT_ID: &str = "AgentID";
pub const FIELD_SINGLE_WALLET_URL: &str = "SingleWalletURL";

pub fn account_key(agent: &str, user: &str) -> String {
    format!("Users:{}:{}", agent, user)
}

pub fn lock_key(agent: &str, user: &str) -> String {
    format!("LockOps:{}:{}", agent, user)
}

pub fn agent_key(agent: &str) -> String {
    format!("Agent:{}", agent)
}

pub fn request_key(request_id: &str) -> String {
    format!("RequestID:{}", request_id)
}

pub fn order_key(order_id: &str) -> String {
    format!("Orders:{}", order_id)
}
