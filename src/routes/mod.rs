// Routes module: 라우팅 설정
// 역할: 모든 도메인의 라우터를 조합
// Routes module: combines all domain routers

use axum::Router;
use crate::shared::services::AppState;

use crate::domains::wallet::routes::{create_direct_router, create_ledger_router};

/// Create main router (combines all domain routers)
/// 메인 라우터 생성
///
/// 직접 DB 모드는 캐시 경로와 같은 계정에 섞어 쓰면 캐시가 낡으므로
/// 설정으로 켠 경우에만 등록합니다.
pub fn create_router(direct_mode_enabled: bool) -> Router<AppState> {
    let router = Router::new().nest("/v3/api", create_ledger_router());

    if direct_mode_enabled {
        router.nest("/v4/api", create_direct_router())
    } else {
        router
    }
}
