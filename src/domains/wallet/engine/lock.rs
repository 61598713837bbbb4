use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;

use crate::shared::errors::LedgerError;
use crate::shared::kv::KvStore;
use crate::shared::utils::key_builder;

/// 락 설정
#[derive(Debug, Clone, Copy)]
pub struct LockSettings {
    /// 보유자가 해제하지 못해도 이 시간 뒤 자동 만료
    pub ttl: Duration,
    /// 최대 대기 시간
    pub timeout: Duration,
    /// 재시도 간격
    pub retry_interval: Duration,
}

/// 계정 단위 분산 락
/// Per-account distributed lock
///
/// SET NX PX로 획득하고, 실패하면 `retry_interval`마다 재시도합니다.
/// 해제는 무조건 DEL 입니다. TTL은 임계 구역보다 충분히 길게 설정되어야 하며
/// 이 관계는 AppConfig::validate()에서 검사합니다.
#[derive(Clone)]
pub struct DistributedLock {
    kv: Arc<dyn KvStore>,
    settings: LockSettings,
}

impl DistributedLock {
    pub fn new(kv: Arc<dyn KvStore>, settings: LockSettings) -> Self {
        Self { kv, settings }
    }

    /// 락 획득
    /// Acquire `key` for `holder`
    ///
    /// # Errors
    /// * `LockTimeout` - `timeout` 안에 획득하지 못함
    /// * `CacheUnavailable` - 저장소 에러
    pub async fn acquire(&self, key: &str, holder: &str) -> Result<(), LedgerError> {
        let deadline = Instant::now() + self.settings.timeout;

        loop {
            let acquired = self
                .kv
                .set_nx(key, holder, self.settings.ttl)
                .await
                .map_err(|e| LedgerError::CacheUnavailable(format!("{:#}", e)))?;
            if acquired {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(key, holder, "lock wait timed out");
                return Err(LedgerError::LockTimeout { key: key.to_string() });
            }
            let wait = self.settings.retry_interval.min(deadline - now);
            tokio::time::sleep(wait).await;
        }
    }

    /// 락 해제 (무조건 삭제)
    /// Release `key` unconditionally
    pub async fn release(&self, key: &str) -> Result<()> {
        self.kv.del(key).await
    }

    /// 락 획득 실패 요청을 수동 처리 리스트에 기록
    /// Record a request that could not get the lock
    ///
    /// 요청 ID는 이미 등록되었으므로 클라이언트가 같은 ID로 재시도할 수 없습니다.
    pub async fn record_failed(&self, payload: &str) -> Result<()> {
        self.kv.lpush(key_builder::FAILED_REQUESTS, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::kv::MemoryKvStore;

    fn settings(timeout_ms: u64) -> LockSettings {
        LockSettings {
            ttl: Duration::from_secs(5),
            timeout: Duration::from_millis(timeout_ms),
            retry_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_second_holder_times_out() {
        let kv = Arc::new(MemoryKvStore::new());
        let lock = DistributedLock::new(kv.clone(), settings(50));

        lock.acquire("LockOps:a:u", "R1").await.unwrap();
        let err = lock.acquire("LockOps:a:u", "R2").await.unwrap_err();

        assert!(matches!(err, LedgerError::LockTimeout { .. }));
        assert_eq!(kv.get("LockOps:a:u").await.unwrap().as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_waiter_gets_lock_after_release() {
        let kv = Arc::new(MemoryKvStore::new());
        let lock = DistributedLock::new(kv.clone(), settings(1000));

        lock.acquire("LockOps:a:u", "R1").await.unwrap();

        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move { lock.acquire("LockOps:a:u", "R2").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        lock.release("LockOps:a:u").await.unwrap();

        waiter.await.unwrap().unwrap();
        assert_eq!(kv.get("LockOps:a:u").await.unwrap().as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn test_crashed_holder_expires_via_ttl() {
        let kv = Arc::new(MemoryKvStore::new());
        let short = LockSettings {
            ttl: Duration::from_millis(30),
            timeout: Duration::from_millis(500),
            retry_interval: Duration::from_millis(10),
        };
        let lock = DistributedLock::new(kv, short);

        // R1은 해제하지 않음
        lock.acquire("LockOps:a:u", "R1").await.unwrap();
        lock.acquire("LockOps:a:u", "R2").await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_request_is_recorded() {
        let kv = Arc::new(MemoryKvStore::new());
        let lock = DistributedLock::new(kv.clone(), settings(10));

        lock.record_failed(r#"{"requestId":"R1"}"#).await.unwrap();
        assert_eq!(kv.llen(key_builder::FAILED_REQUESTS).await.unwrap(), 1);
    }
}
