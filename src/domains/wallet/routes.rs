use axum::{
    routing::{get, post},
    Router,
};
use crate::shared::services::AppState;

use super::handlers;

/// 원장 라우터 생성 (캐시 경로 + 운영 조회)
/// Create ledger router
///
/// # Routes
///
/// ## Mutations (변경)
/// - `POST /v3/api/deduct` - 출금
/// - `POST /v3/api/store` - 입금
/// - `POST /v3/api/single/deduct` - 단일 외부 지갑 출금
/// - `POST /v3/api/single/store` - 단일 외부 지갑 입금
///
/// ## Ops (운영)
/// - `GET  /v3/api/orders/:order_id` - 주문 스냅샷
/// - `GET  /v3/api/queue` - 큐 길이
pub fn create_ledger_router() -> Router<AppState> {
    Router::new()
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Mutations (변경)
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        .route("/deduct", post(handlers::deduct))
        .route("/store", post(handlers::store))
        .route("/single/deduct", post(handlers::single_deduct))
        .route("/single/store", post(handlers::single_store))
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Ops (운영)
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        .route("/orders/:order_id", get(handlers::get_order))
        .route("/queue", get(handlers::queue_stats))
}

/// 직접 DB 모드 라우터
///
/// - `POST /v4/api/deduct`
/// - `POST /v4/api/store`
pub fn create_direct_router() -> Router<AppState> {
    Router::new()
        .route("/deduct", post(handlers::direct_deduct))
        .route("/store", post(handlers::direct_store))
}
