// Ledger Mutation Handler
// 원장 변경 핸들러
// 역할: 입금/출금 API 엔드포인트 처리 (캐시 경로, 단일 외부 지갑, 직접 DB)

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domains::wallet::models::{LedgerEntry, MutationRequest};
use crate::shared::services::AppState;

/// 변경 성공 응답
/// Mutation response
#[derive(Debug, Serialize, ToSchema)]
pub struct MutationResponse {
    pub success: bool,
    pub data: LedgerEntry,
}

impl MutationResponse {
    pub fn ok(entry: LedgerEntry) -> Json<Self> {
        Json(Self { success: true, data: entry })
    }
}

type HandlerError = (StatusCode, Json<serde_json::Value>);

/// 호출자 IP (X-Forwarded-For 우선)
fn client_ip(headers: &HeaderMap, connect_info: Option<ConnectInfo<SocketAddr>>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 캐시 경로 (/v3/api)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 출금 핸들러
/// Debit (deduct) handler
///
/// 경로: POST /v3/api/deduct
///
/// # Returns
/// * `200 OK` - 변경 성공 (before/after 포함)
/// * `412 Precondition Failed` - 중복 요청 ID
/// * `422 Unprocessable Entity` - 잔고 부족 / 계정 비활성 / 지갑 없음
/// * `500 Internal Server Error` - 락 대기 시간 초과
#[utoipa::path(
    post,
    path = "/v3/api/deduct",
    request_body = MutationRequest,
    responses(
        (status = 200, description = "Debit applied", body = MutationResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Account not found"),
        (status = 412, description = "Duplicate request id"),
        (status = 422, description = "Insufficient funds, disabled account or missing wallet"),
        (status = 500, description = "Lock timeout"),
        (status = 503, description = "Cache unavailable")
    ),
    tag = "Ledger"
)]
pub async fn deduct(
    State(app_state): State<AppState>,
    Json(request): Json<MutationRequest>,
) -> Result<Json<MutationResponse>, HandlerError> {
    let entry = app_state
        .ledger_state
        .engine
        .apply(request.debit())
        .await
        .map_err(HandlerError::from)?;

    Ok(MutationResponse::ok(entry))
}

/// 입금 핸들러
/// Credit (store) handler
///
/// 경로: POST /v3/api/store
#[utoipa::path(
    post,
    path = "/v3/api/store",
    request_body = MutationRequest,
    responses(
        (status = 200, description = "Credit applied", body = MutationResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Account not found"),
        (status = 412, description = "Duplicate request id"),
        (status = 422, description = "Disabled account or missing wallet"),
        (status = 500, description = "Lock timeout")
    ),
    tag = "Ledger"
)]
pub async fn store(
    State(app_state): State<AppState>,
    Json(request): Json<MutationRequest>,
) -> Result<Json<MutationResponse>, HandlerError> {
    let entry = app_state
        .ledger_state
        .engine
        .apply(request.credit())
        .await
        .map_err(HandlerError::from)?;

    Ok(MutationResponse::ok(entry))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 단일 외부 지갑 (/v3/api/single)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 단일 외부 지갑 출금
///
/// 경로: POST /v3/api/single/deduct
#[utoipa::path(
    post,
    path = "/v3/api/single/deduct",
    request_body = MutationRequest,
    responses(
        (status = 200, description = "Debit applied by external wallet", body = MutationResponse),
        (status = 412, description = "Duplicate request id"),
        (status = 502, description = "External wallet failed")
    ),
    tag = "Ledger"
)]
pub async fn single_deduct(
    State(app_state): State<AppState>,
    Json(request): Json<MutationRequest>,
) -> Result<Json<MutationResponse>, HandlerError> {
    let entry = app_state
        .ledger_state
        .engine
        .apply_single(request.debit())
        .await
        .map_err(HandlerError::from)?;

    Ok(MutationResponse::ok(entry))
}

/// 단일 외부 지갑 입금
///
/// 경로: POST /v3/api/single/store
#[utoipa::path(
    post,
    path = "/v3/api/single/store",
    request_body = MutationRequest,
    responses(
        (status = 200, description = "Credit applied by external wallet", body = MutationResponse),
        (status = 412, description = "Duplicate request id"),
        (status = 502, description = "External wallet failed")
    ),
    tag = "Ledger"
)]
pub async fn single_store(
    State(app_state): State<AppState>,
    Json(request): Json<MutationRequest>,
) -> Result<Json<MutationResponse>, HandlerError> {
    let entry = app_state
        .ledger_state
        .engine
        .apply_single(request.credit())
        .await
        .map_err(HandlerError::from)?;

    Ok(MutationResponse::ok(entry))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 직접 DB 모드 (/v4/api), DIRECT_MODE_ENABLED=true 일 때만 등록
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 직접 DB 출금
///
/// 경로: POST /v4/api/deduct
#[utoipa::path(
    post,
    path = "/v4/api/deduct",
    request_body = MutationRequest,
    responses(
        (status = 200, description = "Debit committed", body = MutationResponse),
        (status = 412, description = "Duplicate request id"),
        (status = 422, description = "Insufficient funds")
    ),
    tag = "Ledger (direct)"
)]
pub async fn direct_deduct(
    State(app_state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<MutationRequest>,
) -> Result<Json<MutationResponse>, HandlerError> {
    let mutation = request.debit().with_client_ip(client_ip(&headers, connect_info));
    let entry = app_state
        .ledger_state
        .engine
        .apply_direct(mutation)
        .await
        .map_err(HandlerError::from)?;

    Ok(MutationResponse::ok(entry))
}

/// 직접 DB 입금
///
/// 경로: POST /v4/api/store
#[utoipa::path(
    post,
    path = "/v4/api/store",
    request_body = MutationRequest,
    responses(
        (status = 200, description = "Credit committed", body = MutationResponse),
        (status = 412, description = "Duplicate request id")
    ),
    tag = "Ledger (direct)"
)]
pub async fn direct_store(
    State(app_state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<MutationRequest>,
) -> Result<Json<MutationResponse>, HandlerError> {
    let mutation = request.credit().with_client_ip(client_ip(&headers, connect_info));
    let entry = app_state
        .ledger_state
        .engine
        .apply_direct(mutation)
        .await
        .map_err(HandlerError::from)?;

    Ok(MutationResponse::ok(entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(
            client_ip(&headers, Some(ConnectInfo(addr))).as_deref(),
            Some("10.0.0.1")
        );
        assert_eq!(
            client_ip(&HeaderMap::new(), Some(ConnectInfo(addr))).as_deref(),
            Some("127.0.0.1")
        );
        assert!(client_ip(&HeaderMap::new(), None).is_none());
    }
}
