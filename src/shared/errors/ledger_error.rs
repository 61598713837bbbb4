use thiserror::Error;
use axum::{http::StatusCode, Json};
use serde_json::json;

/// 원장 처리 에러
/// Ledger errors
///
/// 검증/경합 에러는 호출자에게 바로 반환되고 상태 변경이 전혀 없습니다.
/// `PersistenceFailure`는 비동기 워커 안에서만 발생하며 로그로만 남습니다.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// 같은 요청 ID가 이미 처리됨
    /// Request id already seen within its lifetime window
    #[error("Duplicate request: {request_id}")]
    DuplicateRequest { request_id: String },

    /// 계정 락 대기 시간 초과
    /// Lock wait exceeded its bound
    #[error("Lock timeout: {key}")]
    LockTimeout { key: String },

    /// 계정 없음
    /// Account not found
    #[error("Account not found: agent={agent}, user={user}")]
    AccountNotFound { agent: String, user: String },

    /// 계정 비활성화
    /// Account (or its agent) is disabled
    #[error("Account disabled: agent={agent}, user={user}")]
    AccountDisabled { agent: String, user: String },

    /// 지갑이 생성되지 않은 계정
    /// Account has no wallet
    #[error("Wallet not provisioned: agent={agent}, user={user}")]
    WalletNotProvisioned { agent: String, user: String },

    /// 잔고 부족
    /// Insufficient funds
    #[error("Insufficient funds: balance={balance}, requested={requested}")]
    InsufficientFunds { balance: i64, requested: i64 },

    /// 결과 잔고가 표현 범위를 벗어남
    /// Resulting balance is out of representable range
    #[error("Amount out of range: balance={balance}, amount={amount}")]
    AmountOutOfRange { balance: i64, amount: i64 },

    /// 외부 지갑 호출 실패 (타임아웃 / 비정상 상태 코드 / 잘못된 응답)
    /// External wallet authority failed
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// 캐시 저장소 사용 불가 또는 재적재 실패
    /// Cache store unavailable or reload attempts exhausted
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// 주문 스냅샷 없음 (만료 포함)
    /// Order snapshot not found
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    /// 잘못된 요청
    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// DB 반영 실패
    /// Durable store write failed
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// 내부 서버 에러
    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// 응답 본문에 들어가는 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::DuplicateRequest { .. } => "DUPLICATE_REQUEST",
            LedgerError::LockTimeout { .. } => "LOCK_TIMEOUT",
            LedgerError::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            LedgerError::AccountDisabled { .. } => "ACCOUNT_DISABLED",
            LedgerError::WalletNotProvisioned { .. } => "WALLET_NOT_PROVISIONED",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            LedgerError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            LedgerError::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            LedgerError::OrderNotFound { .. } => "ORDER_NOT_FOUND",
            LedgerError::InvalidRequest(_) => "INVALID_REQUEST",
            LedgerError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            LedgerError::Internal(_) => "INTERNAL",
        }
    }

    /// HTTP 상태 코드
    pub fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::DuplicateRequest { .. } => StatusCode::PRECONDITION_FAILED,
            LedgerError::LockTimeout { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            LedgerError::AccountNotFound { .. } | LedgerError::OrderNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            LedgerError::AccountDisabled { .. }
            | LedgerError::WalletNotProvisioned { .. }
            | LedgerError::InsufficientFunds { .. }
            | LedgerError::AmountOutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            LedgerError::CacheUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            LedgerError::PersistenceFailure(_) | LedgerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<anyhow::Error> for LedgerError {
    fn from(err: anyhow::Error) -> Self {
        LedgerError::Internal(format!("{:#}", err))
    }
}

/// LedgerError를 HTTP 응답으로 변환
impl From<LedgerError> for (StatusCode, Json<serde_json::Value>) {
    fn from(err: LedgerError) -> Self {
        let status = err.status_code();
        (
            status,
            Json(json!({
                "success": false,
                "error": {
                    "code": err.code(),
                    "message": err.to_string(),
                }
            })),
        )
    }
}
