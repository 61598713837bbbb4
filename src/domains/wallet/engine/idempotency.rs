use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::shared::kv::KvStore;
use crate::shared::utils::key_builder;

/// 중복 요청 방지
/// Idempotency guard
///
/// 요청 ID를 SET NX + TTL 한 번으로 기록합니다. (읽고-쓰기 경쟁 없음)
/// TTL 안에서 같은 요청 ID는 한 번만 기록될 수 있습니다.
#[derive(Clone)]
pub struct IdempotencyGuard {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl IdempotencyGuard {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// 요청 ID 등록
    /// Register a request id with its serialized snapshot
    ///
    /// # Returns
    /// * `true` - 처음 본 요청
    /// * `false` - 이미 등록된 요청 (호출자는 DuplicateRequest로 실패해야 함)
    pub async fn register(&self, request_id: &str, payload: &str) -> Result<bool> {
        self.kv
            .set_nx(&key_builder::request_key(request_id), payload, self.ttl)
            .await
    }

    /// 등록된 요청 스냅샷 조회 (만료되면 None)
    pub async fn snapshot(&self, request_id: &str) -> Result<Option<String>> {
        self.kv.get(&key_builder::request_key(request_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::kv::MemoryKvStore;

    #[tokio::test]
    async fn test_second_registration_is_rejected() {
        let guard = IdempotencyGuard::new(Arc::new(MemoryKvStore::new()), Duration::from_secs(60));

        assert!(guard.register("R1", "{}").await.unwrap());
        assert!(!guard.register("R1", "{}").await.unwrap());
        assert!(guard.register("R2", "{}").await.unwrap());
    }

    #[tokio::test]
    async fn test_registration_reopens_after_ttl() {
        let guard = IdempotencyGuard::new(Arc::new(MemoryKvStore::new()), Duration::from_millis(20));

        assert!(guard.register("R1", "first").await.unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(guard.snapshot("R1").await.unwrap().is_none());
        assert!(guard.register("R1", "second").await.unwrap());
    }
}
