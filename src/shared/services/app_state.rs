use std::sync::Arc;
use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domains::wallet::runtime::{ProcessingSweeper, SyncWorkerPool, WriteBehindQueue};
use crate::domains::wallet::services::{IdempotencyReaper, LedgerState};
use crate::shared::config::AppConfig;
use crate::shared::database::LedgerStore;
use crate::shared::kv::KvStore;

/// Application state (combines all domain states)
/// 애플리케이션 상태 (모든 도메인 상태를 조합)
///
/// 저장소 핸들은 시작 시 한 번 만들어서 여기서 모든 컴포넌트에 주입합니다.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// 캐시 / 락 / 큐 저장소 (공유)
    pub kv: Arc<dyn KvStore>,
    /// 영속 저장소 (공유)
    pub store: Arc<dyn LedgerStore>,
    pub ledger_state: LedgerState,
    /// 중복 요청 기록 정리 스케줄러
    pub reaper: IdempotencyReaper,
}

impl AppState {
    /// Create AppState with store handles
    /// 모든 도메인 State를 초기화하고 조합
    pub fn new(config: AppConfig, kv: Arc<dyn KvStore>, store: Arc<dyn LedgerStore>) -> Result<Self> {
        let ledger_state = LedgerState::new(kv.clone(), store.clone(), &config)?;
        let reaper = IdempotencyReaper::new(
            store.clone(),
            config.reaper_interval,
            config.request_dedup_retention,
        );

        Ok(Self {
            config: Arc::new(config),
            kv,
            store,
            ledger_state,
            reaper,
        })
    }

    /// 백그라운드 태스크 시작
    /// Start sync workers, the reaper and (if configured) the processing sweeper
    pub async fn start_background(&self, cancel: CancellationToken) -> Result<Vec<JoinHandle<()>>> {
        // 1. 동기화 워커 풀
        let pool = SyncWorkerPool::new(self.kv.clone(), self.store.clone(), &self.config);
        let mut handles = pool.start(cancel.clone()).await?;

        // 2. 중복 요청 기록 리퍼
        handles.push(self.reaper.start(cancel.clone()));

        // 3. 처리 중 항목 스위퍼 (선택)
        if let Some(requeue_after) = self.config.processing_requeue_after {
            let sweeper = ProcessingSweeper::new(
                WriteBehindQueue::new(self.kv.clone()),
                requeue_after,
                self.config.processing_sweep_interval,
            );
            handles.push(sweeper.start(cancel));
            tracing::info!(?requeue_after, "processing sweeper started");
        }

        Ok(handles)
    }
}
