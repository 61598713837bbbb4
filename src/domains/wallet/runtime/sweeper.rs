use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::queue::WriteBehindQueue;

/// 처리 중 항목 스위퍼
/// Processing-list sweeper
///
/// 역할:
/// - 워커가 claim 후 죽어서 processing에 남은 항목을 다시 대기 큐로 이동
/// - `PROCESSING_REQUEUE_AFTER_SECS`가 설정된 경우에만 시작
///
/// DB 반영은 멱등이므로 아직 처리 중인 항목이 되돌려져도 이중 반영되지 않습니다.
#[derive(Clone)]
pub struct ProcessingSweeper {
    queue: WriteBehindQueue,
    requeue_after: Duration,
    interval: Duration,
}

impl ProcessingSweeper {
    pub fn new(queue: WriteBehindQueue, requeue_after: Duration, interval: Duration) -> Self {
        Self {
            queue,
            requeue_after,
            interval,
        }
    }

    /// 한 번 실행
    ///
    /// # Returns
    /// 되돌린 항목 수
    pub async fn run_once(&self) -> Result<usize> {
        self.queue.requeue_stale(self.requeue_after).await
    }

    /// 스위퍼 시작
    pub fn start(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let sweeper = self.clone();

        tokio::spawn(async move {
            let mut ticker = interval(sweeper.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match sweeper.run_once().await {
                    Ok(0) => {}
                    Ok(n) => tracing::warn!(requeued = n, "processing sweeper re-queued items"),
                    Err(e) => tracing::error!(error = %e, "processing sweep failed"),
                }
            }

            tracing::info!("processing sweeper stopped");
        })
    }
}
