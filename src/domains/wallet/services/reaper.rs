use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use anyhow::Result;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use crate::shared::database::LedgerStore;

/// 중복 요청 기록 정리 스케줄러
/// Idempotency Reaper
///
/// 역할:
/// - 주기적으로 보존 기간이 지난 중복 요청 기록(request_dedup)을 삭제
/// - 요청 트래픽과 무관하게 동작
/// - 실패는 로그만 남기고 다음 주기에 다시 시도 (치명적이지 않음)
///
/// KvStore의 요청 ID 레코드는 TTL로 스스로 만료되므로 여기서 다루지 않습니다.
#[derive(Clone)]
pub struct IdempotencyReaper {
    /// 영속 저장소
    store: Arc<dyn LedgerStore>,

    /// 실행 주기
    interval: Duration,

    /// 보존 기간
    retention: Duration,

    /// 활성화 상태
    enabled: Arc<AtomicBool>,
}

impl IdempotencyReaper {
    /// 새 리퍼 생성
    /// Create new reaper
    pub fn new(store: Arc<dyn LedgerStore>, interval: Duration, retention: Duration) -> Self {
        Self {
            store,
            interval,
            retention,
            enabled: Arc::new(AtomicBool::new(true)), // 기본값: 활성화
        }
    }

    /// 리퍼 시작
    /// Start reaper
    ///
    /// 백그라운드 태스크를 시작하여 `interval`마다 기록을 정리합니다.
    /// 종료 신호를 받으면 대기 중이어도 바로 끝납니다.
    pub fn start(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let reaper = self.clone();

        tokio::spawn(async move {
            let mut ticker = interval(reaper.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                // 활성화 상태 확인
                if !reaper.is_enabled() {
                    continue;
                }

                match reaper.run_once().await {
                    Ok(0) => {}
                    Ok(deleted) => tracing::info!(deleted, "expired request ids reaped"),
                    Err(e) => tracing::error!(error = %e, "idempotency reaper failed"),
                }
            }

            tracing::info!("idempotency reaper stopped");
        })
    }

    /// 한 번 실행 (보존 기간이 지난 기록 삭제)
    ///
    /// # Returns
    /// 삭제된 기록 수
    pub async fn run_once(&self) -> Result<u64> {
        let retention = chrono::Duration::from_std(self.retention)?;
        self.store.purge_request_dedup(Utc::now() - retention).await
    }

    /// 리퍼 활성화
    /// Enable reaper
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// 리퍼 비활성화
    /// Disable reaper
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// 리퍼 상태 조회
    /// Get reaper status
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}
