// Ledger Ops Handler
// 운영 조회 핸들러
// 역할: 주문 스냅샷 조회, 큐 상태 조회

use axum::{extract::{Path, State}, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domains::wallet::models::LedgerEntry;
use crate::domains::wallet::runtime::QueueStats;
use crate::shared::errors::LedgerError;
use crate::shared::services::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub success: bool,
    pub data: LedgerEntry,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueueStatsResponse {
    pub success: bool,
    pub data: QueueStats,
}

/// 주문 스냅샷 조회 핸들러
/// Get order snapshot
///
/// 경로: GET /v3/api/orders/{order_id}
///
/// 스냅샷은 ORDERS_TTL 동안만 남습니다.
#[utoipa::path(
    get,
    path = "/v3/api/orders/{order_id}",
    params(
        ("order_id" = String, Path, description = "Order id (UUID)")
    ),
    responses(
        (status = 200, description = "Order snapshot", body = OrderResponse),
        (status = 404, description = "Order not found or expired")
    ),
    tag = "Ledger Ops"
)]
pub async fn get_order(
    State(app_state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<serde_json::Value>)> {
    let entry = app_state
        .ledger_state
        .engine
        .order_snapshot(&order_id)
        .await
        .map_err(<(StatusCode, Json<serde_json::Value>)>::from)?;

    Ok(Json(OrderResponse { success: true, data: entry }))
}

/// 큐 상태 조회 핸들러
/// Get write-behind queue lengths
///
/// 경로: GET /v3/api/queue
#[utoipa::path(
    get,
    path = "/v3/api/queue",
    responses(
        (status = 200, description = "Queue lengths", body = QueueStatsResponse),
        (status = 503, description = "Cache unavailable")
    ),
    tag = "Ledger Ops"
)]
pub async fn queue_stats(
    State(app_state): State<AppState>,
) -> Result<Json<QueueStatsResponse>, (StatusCode, Json<serde_json::Value>)> {
    let stats = app_state
        .ledger_state
        .queue
        .stats()
        .await
        .map_err(|e| LedgerError::CacheUnavailable(format!("{:#}", e)))?;

    Ok(Json(QueueStatsResponse { success: true, data: stats }))
}
