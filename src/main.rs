use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::{HeaderValue, Method};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use wallet_ledger::domains::wallet::handlers::{MutationResponse, OrderResponse, QueueStatsResponse};
use wallet_ledger::domains::wallet::models::*;
use wallet_ledger::domains::wallet::runtime::QueueStats;
use wallet_ledger::routes::create_router;
use wallet_ledger::shared::config::AppConfig;
use wallet_ledger::shared::database::{Database, PgLedgerStore};
use wallet_ledger::shared::kv::RedisKvStore;
use wallet_ledger::shared::logging::init_tracing;
use wallet_ledger::shared::services::AppState;

// OpenAPI 스키마 정의: Swagger 문서 자동 생성
#[derive(OpenApi)]
#[openapi(
    paths(
        wallet_ledger::domains::wallet::handlers::ledger_handler::deduct,
        wallet_ledger::domains::wallet::handlers::ledger_handler::store,
        wallet_ledger::domains::wallet::handlers::ledger_handler::single_deduct,
        wallet_ledger::domains::wallet::handlers::ledger_handler::single_store,
        wallet_ledger::domains::wallet::handlers::ledger_handler::direct_deduct,
        wallet_ledger::domains::wallet::handlers::ledger_handler::direct_store,
        wallet_ledger::domains::wallet::handlers::ops_handler::get_order,
        wallet_ledger::domains::wallet::handlers::ops_handler::queue_stats
    ),
    components(schemas(
        MutationRequest,
        MutationResponse,
        LedgerEntry,
        OrderStatus,
        OrderResponse,
        QueueStats,
        QueueStatsResponse
    )),
    tags(
        (name = "Ledger", description = "Balance mutation endpoints (cache path and single external wallet)"),
        (name = "Ledger (direct)", description = "Direct-to-database mutation endpoints"),
        (name = "Ledger Ops", description = "Order snapshots and queue status")
    ),
    info(
        title = "Wallet Ledger Service",
        description = "Exactly-once balance mutations with write-behind persistence",
        version = "1.0.0"
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("wallet_ledger");

    // 설정 읽기 + 검증
    let config = AppConfig::from_env()?;

    // DB 연결 + 마이그레이션
    let db = Database::new(&config.database_url, config.db_max_connections).await?;
    db.initialize().await?;

    // Redis 연결
    let kv = RedisKvStore::connect(&config.redis_url).await?;

    // AppState 생성 (모든 Service 초기화)
    let app_state = AppState::new(config.clone(), Arc::new(kv), Arc::new(PgLedgerStore::new(db)))?;

    // 백그라운드 태스크 (워커, 리퍼, 스위퍼)
    let cancel = CancellationToken::new();
    let background = app_state.start_background(cancel.clone()).await?;

    // CORS 설정
    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .with_context(|| format!("Invalid CORS_ORIGIN: {}", origin))?,
            )
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::ACCEPT,
            ]),
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    // Router 생성
    let app = Router::new()
        .merge(create_router(config.direct_mode_enabled))
        .merge(SwaggerUi::new("/api").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    // 서버 시작
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(
        %addr,
        workers = config.sync_workers,
        direct_mode = config.direct_mode_enabled,
        "wallet ledger listening (Swagger UI at /api)"
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // 종료: 백그라운드 태스크에 신호 후 유예 시간만큼 대기
    tracing::info!("shutting down background tasks");
    cancel.cancel();
    let drained = tokio::time::timeout(config.shutdown_grace, async {
        for handle in background {
            let _ = handle.await;
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!(grace = ?config.shutdown_grace, "background tasks did not stop in time");
    }

    Ok(())
}

/// Ctrl-C 또는 SIGTERM 대기
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
