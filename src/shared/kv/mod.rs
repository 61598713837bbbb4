// =====================================================
// KvStore - 캐시 / 락 / 큐 저장소 인터페이스
// =====================================================
// 역할: Idempotency Guard, Distributed Lock, Balance Cache,
//       Write-Behind Queue가 공통으로 사용하는 키-값 저장소 추상화
//
// 필요한 프리미티브:
// 1. set-if-absent + TTL (SET NX PX)
// 2. hash field get/set (HGET / HSET)
// 3. list push / atomic move / remove (LPUSH / BRPOPLPUSH / LREM)
// 4. expire
// 5. 원자적 배치 (MULTI / EXEC)
// 6. 조건부 리스트 이동 / 조건부 hash 기록 (Lua 스크립트)
//
// 구현체:
// - RedisKvStore: 운영용 (redis crate, ConnectionManager)
// - MemoryKvStore: 테스트/벤치마크용 (프로세스 내 메모리)
// =====================================================

pub mod memory;
pub mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

pub use memory::MemoryKvStore;
pub use redis_store::RedisKvStore;

/// 원자적 배치에 들어가는 단일 명령
/// Single command inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    /// HSET key field value [field value ...]
    HSet { key: String, fields: Vec<(String, String)> },
    /// HDEL key field
    HDel { key: String, field: String },
    /// PEXPIRE key ttl
    Expire { key: String, ttl: Duration },
    /// LPUSH key value
    LPush { key: String, value: String },
    /// LREM key count value
    LRem { key: String, count: i64, value: String },
    /// SET key value PX ttl
    SetEx { key: String, value: String, ttl: Duration },
}

/// 키-값 저장소 인터페이스
/// Key-value store interface
///
/// 모든 메서드는 단일 원자 명령으로 동작해야 합니다.
/// (읽고-쓰기 사이에 경쟁 조건이 없어야 함)
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 키가 없을 때만 저장 (TTL 포함)
    ///
    /// # Returns
    /// * `true` - 저장 성공 (처음 기록)
    /// * `false` - 이미 키가 존재함
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn del(&self, key: &str) -> Result<()>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// 만료 시간 설정
    ///
    /// # Returns
    /// 키가 존재해서 만료 시간이 설정되면 `true`
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    async fn lpush(&self, key: &str, value: &str) -> Result<()>;

    /// 리스트 꼬리에서 꺼내서 다른 리스트 머리에 넣기 (원자적, 블로킹)
    ///
    /// `timeout` 동안 `source`가 비어 있으면 `None`
    async fn brpoplpush(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<String>>;

    /// 값이 일치하는 항목 제거
    ///
    /// * `count > 0` - 머리부터 최대 count개
    /// * `count < 0` - 꼬리부터 최대 |count|개
    /// * `count = 0` - 전부
    ///
    /// # Returns
    /// 제거된 개수
    async fn lrem(&self, key: &str, count: i64, value: &str) -> Result<i64>;

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;

    async fn llen(&self, key: &str) -> Result<i64>;

    /// 여러 명령을 하나의 원자적 배치로 실행 (MULTI / EXEC)
    async fn exec_atomic(&self, ops: Vec<KvOp>) -> Result<()>;

    /// `source`에 `value`가 남아 있을 때만 꼬리 쪽 하나를 제거하고 `destination` 머리에 넣음
    /// 이동했으면 `hash`의 `field`도 삭제 (전부 원자적)
    ///
    /// # Returns
    /// 이동했으면 `true`, 이미 없으면 `false` (아무 것도 쓰지 않음)
    async fn lmove_if_present(
        &self,
        source: &str,
        destination: &str,
        value: &str,
        hash: &str,
        field: &str,
    ) -> Result<bool>;

    /// `list`에 `value`가 있고 `hash`에 `field`가 없을 때만 기록 (원자적)
    ///
    /// # Returns
    /// 기록했으면 `true`
    async fn hsetnx_if_listed(
        &self,
        list: &str,
        value: &str,
        hash: &str,
        field: &str,
        field_value: &str,
    ) -> Result<bool>;

    /// 블로킹 명령 전용 핸들 생성
    ///
    /// 워커처럼 BRPOPLPUSH로 오래 대기하는 태스크는 공유 연결을 막지 않도록
    /// 자기 연결을 가져야 합니다. 메모리 구현은 같은 저장소를 공유합니다.
    async fn isolated(&self) -> Result<Arc<dyn KvStore>>;
}
