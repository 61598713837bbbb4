// 로깅 초기화
// 역할: tracing subscriber 설정 (RUST_LOG로 레벨 조절, 기본 info)
// Tracing initialization
use tracing_subscriber::{fmt, EnvFilter};

/// tracing subscriber 설치
///
/// 이미 설치되어 있으면 (테스트에서 여러 번 호출) 조용히 무시합니다.
pub fn init_tracing(service_name: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let _ = fmt()
        .with_target(false)
        .with_env_filter(env_filter)
        .compact()
        .try_init();

    tracing::info!(service = service_name, "tracing initialized");
}
