// =====================================================
// WriteBehindQueue - 신뢰성 있는 쓰기 지연 큐
// =====================================================
// 역할: 엔진 → 동기화 워커로 원장 항목 전달 (at-least-once)
//
// 구조 (pending / processing 분리):
//   enqueue  LPUSH Jobs
//   claim    BRPOPLPUSH Jobs -> Processing  (원자적 이동, 블로킹)
//   ack      LREM Processing -1 <raw>       (DB 반영 후에만)
//
// 워커가 claim 후 ack 전에 죽으면 항목은 Processing에 그대로 남습니다.
// claim 시각은 ProcessingClaims hash에 기록되어 sweeper가 사용합니다.
// =====================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domains::wallet::models::{ClaimedItem, QueueItem};
use crate::shared::kv::{KvOp, KvStore};
use crate::shared::utils::key_builder::{FAILED_REQUESTS, PENDING_QUEUE, PROCESSING_CLAIMS, PROCESSING_QUEUE};

/// 큐 길이 (운영 확인용)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub failed_requests: i64,
}

#[derive(Clone)]
pub struct WriteBehindQueue {
    kv: Arc<dyn KvStore>,
}

impl WriteBehindQueue {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn encode(item: &QueueItem) -> Result<String> {
        serde_json::to_string(item).context("Failed to serialize queue item")
    }

    /// 적재 명령 (다른 캐시 쓰기와 같은 원자 배치에 넣을 때)
    pub fn enqueue_op(raw: String) -> KvOp {
        KvOp::LPush {
            key: PENDING_QUEUE.to_string(),
            value: raw,
        }
    }

    /// 가장 오래된 항목을 processing으로 옮기고 반환
    /// Claim the oldest pending item
    ///
    /// `timeout` 동안 비어 있으면 `None`.
    /// 읽을 수 없는 항목은 processing에 남기고 에러를 반환합니다.
    pub async fn claim(&self, timeout: Duration) -> Result<Option<ClaimedItem>> {
        let raw = match self
            .kv
            .brpoplpush(PENDING_QUEUE, PROCESSING_QUEUE, timeout)
            .await?
        {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let item: QueueItem = serde_json::from_str(&raw)
            .with_context(|| format!("Unreadable queue item left in processing: {}", raw))?;

        // claim 시각 기록 (실패해도 sweeper가 처음 본 시각으로 다시 기록)
        if let Err(e) = self
            .kv
            .hset(
                PROCESSING_CLAIMS,
                &[(item.entry.id.to_string(), Utc::now().timestamp_millis().to_string())],
            )
            .await
        {
            tracing::warn!(order_id = %item.entry.id, error = %e, "failed to stamp claim time");
        }

        Ok(Some(ClaimedItem { raw, item }))
    }

    /// ack 명령 (processing에서 제거 + claim 시각 삭제)
    pub fn ack_ops(claimed: &ClaimedItem) -> Vec<KvOp> {
        vec![
            KvOp::LRem {
                key: PROCESSING_QUEUE.to_string(),
                count: -1,
                value: claimed.raw.clone(),
            },
            KvOp::HDel {
                key: PROCESSING_CLAIMS.to_string(),
                field: claimed.item.entry.id.to_string(),
            },
        ]
    }

    /// 단독 ack
    pub async fn ack(&self, claimed: &ClaimedItem) -> Result<()> {
        self.kv.exec_atomic(Self::ack_ops(claimed)).await
    }

    /// processing 항목 전체 (머리 -> 꼬리)
    pub async fn processing_items(&self) -> Result<Vec<String>> {
        self.kv.lrange(PROCESSING_QUEUE, 0, -1).await
    }

    /// pending 항목 전체 (머리 -> 꼬리)
    pub async fn pending_items(&self) -> Result<Vec<String>> {
        self.kv.lrange(PENDING_QUEUE, 0, -1).await
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        Ok(QueueStats {
            pending: self.kv.llen(PENDING_QUEUE).await?,
            processing: self.kv.llen(PROCESSING_QUEUE).await?,
            failed_requests: self.kv.llen(FAILED_REQUESTS).await?,
        })
    }

    /// 처리 시간이 `requeue_after`를 넘은 processing 항목을 pending으로 되돌림
    /// Re-queue processing items whose claim is older than `requeue_after`
    ///
    /// claim 시각이 없는 항목은 지금 시각을 기록하고 다음 번에 판단합니다.
    /// 되돌리기와 시각 기록은 항목이 아직 processing에 있을 때만 일어나므로
    /// 그 사이 ack된 항목은 다시 적재되지 않고 claim 기록도 남지 않습니다.
    ///
    /// # Returns
    /// 되돌린 항목 수
    pub async fn requeue_stale(&self, requeue_after: Duration) -> Result<usize> {
        let now_ms = Utc::now().timestamp_millis();
        let deadline_ms = requeue_after.as_millis() as i64;
        let mut requeued = 0;

        for raw in self.processing_items().await? {
            let item: QueueItem = match serde_json::from_str(&raw) {
                Ok(item) => item,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable processing item");
                    continue;
                }
            };
            let order_id = item.entry.id.to_string();

            let claimed_at = self
                .kv
                .hget(PROCESSING_CLAIMS, &order_id)
                .await?
                .and_then(|v| v.parse::<i64>().ok());

            match claimed_at {
                None => {
                    self.kv
                        .hsetnx_if_listed(
                            PROCESSING_QUEUE,
                            &raw,
                            PROCESSING_CLAIMS,
                            &order_id,
                            &now_ms.to_string(),
                        )
                        .await?;
                }
                Some(at) if now_ms - at >= deadline_ms => {
                    let moved = self
                        .kv
                        .lmove_if_present(PROCESSING_QUEUE, PENDING_QUEUE, &raw, PROCESSING_CLAIMS, &order_id)
                        .await?;
                    if moved {
                        tracing::warn!(order_id = %order_id, "re-queued stale processing item");
                        requeued += 1;
                    }
                }
                Some(_) => {}
            }
        }

        Ok(requeued)
    }
}
