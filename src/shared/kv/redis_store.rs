use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;

use super::{KvOp, KvStore};

// Redis 저장소
// 역할: KvStore 운영 구현체 (redis crate + tokio ConnectionManager)
// Redis-backed KvStore
//
// ConnectionManager는 multiplexed 연결이라 clone 비용이 작지만,
// BRPOPLPUSH 같은 블로킹 명령은 같은 연결의 다른 명령을 막기 때문에
// 워커는 `isolated()`로 자기 연결을 받아서 사용합니다.
#[derive(Clone)]
pub struct RedisKvStore {
    client: Client,
    conn: ConnectionManager,
}

impl RedisKvStore {
    // Redis 연결 생성
    // Connect to Redis (e.g. "redis://127.0.0.1:6379/0")
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("Invalid Redis URL")?;
        let mut conn = ConnectionManager::new(client.clone())
            .await
            .context("Failed to connect to Redis")?;

        let pong: String = redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .context("Redis PING failed")?;
        tracing::info!(reply = %pong, "redis connected");

        Ok(Self { client, conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

// KEYS: source, destination, hash / ARGV: value, field
const LMOVE_IF_PRESENT: &str = r#"
if redis.call('LREM', KEYS[1], -1, ARGV[1]) == 1 then
    redis.call('HDEL', KEYS[3], ARGV[2])
    redis.call('LPUSH', KEYS[2], ARGV[1])
    return 1
end
return 0
"#;

// KEYS: list, hash / ARGV: value, field, field_value (LPOS는 Redis 6.0.6+)
const HSETNX_IF_LISTED: &str = r#"
if redis.call('LPOS', KEYS[1], ARGV[1]) then
    return redis.call('HSETNX', KEYS[2], ARGV[2], ARGV[3])
end
return 0
"#;

fn ttl_millis(ttl: Duration) -> u64 {
    // PX 0은 Redis가 거부하므로 최소 1ms
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<_, Option<String>>(&mut self.conn())
            .await
            .context("SET NX failed")?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut self.conn())
            .await
            .context("GET failed")
    }

    async fn del(&self, key: &str) -> Result<()> {
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut self.conn())
            .await
            .context("DEL failed")?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async::<_, Option<String>>(&mut self.conn())
            .await
            .context("HGET failed")
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        cmd.query_async::<_, i64>(&mut self.conn())
            .await
            .context("HSET failed")?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let updated: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .query_async::<_, i64>(&mut self.conn())
            .await
            .context("PEXPIRE failed")?;
        Ok(updated == 1)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        redis::cmd("LPUSH")
            .arg(key)
            .arg(value)
            .query_async::<_, i64>(&mut self.conn())
            .await
            .context("LPUSH failed")?;
        Ok(())
    }

    async fn brpoplpush(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        // BRPOPLPUSH timeout은 초 단위 (소수 허용, Redis 6+)
        let secs = timeout.as_secs_f64().max(0.01);
        redis::cmd("BRPOPLPUSH")
            .arg(source)
            .arg(destination)
            .arg(secs)
            .query_async::<_, Option<String>>(&mut self.conn())
            .await
            .context("BRPOPLPUSH failed")
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> Result<i64> {
        redis::cmd("LREM")
            .arg(key)
            .arg(count)
            .arg(value)
            .query_async::<_, i64>(&mut self.conn())
            .await
            .context("LREM failed")
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async::<_, Vec<String>>(&mut self.conn())
            .await
            .context("LRANGE failed")
    }

    async fn llen(&self, key: &str) -> Result<i64> {
        redis::cmd("LLEN")
            .arg(key)
            .query_async::<_, i64>(&mut self.conn())
            .await
            .context("LLEN failed")
    }

    async fn exec_atomic(&self, ops: Vec<KvOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        // MULTI ... EXEC
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &ops {
            match op {
                KvOp::HSet { key, fields } => {
                    if fields.is_empty() {
                        continue;
                    }
                    let cmd = pipe.cmd("HSET").arg(key);
                    for (field, value) in fields {
                        cmd.arg(field).arg(value);
                    }
                    cmd.ignore();
                }
                KvOp::HDel { key, field } => {
                    pipe.cmd("HDEL").arg(key).arg(field).ignore();
                }
                KvOp::Expire { key, ttl } => {
                    pipe.cmd("PEXPIRE").arg(key).arg(ttl_millis(*ttl)).ignore();
                }
                KvOp::LPush { key, value } => {
                    pipe.cmd("LPUSH").arg(key).arg(value).ignore();
                }
                KvOp::LRem { key, count, value } => {
                    pipe.cmd("LREM").arg(key).arg(*count).arg(value).ignore();
                }
                KvOp::SetEx { key, value, ttl } => {
                    pipe.cmd("SET")
                        .arg(key)
                        .arg(value)
                        .arg("PX")
                        .arg(ttl_millis(*ttl))
                        .ignore();
                }
            }
        }

        pipe.query_async::<_, ()>(&mut self.conn())
            .await
            .context("MULTI/EXEC batch failed")?;
        Ok(())
    }

    async fn lmove_if_present(
        &self,
        source: &str,
        destination: &str,
        value: &str,
        hash: &str,
        field: &str,
    ) -> Result<bool> {
        let script = redis::Script::new(LMOVE_IF_PRESENT);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(source)
            .key(destination)
            .key(hash)
            .arg(value)
            .arg(field);
        let moved: i64 = invocation
            .invoke_async(&mut self.conn())
            .await
            .context("Conditional list move failed")?;
        Ok(moved == 1)
    }

    async fn hsetnx_if_listed(
        &self,
        list: &str,
        value: &str,
        hash: &str,
        field: &str,
        field_value: &str,
    ) -> Result<bool> {
        let script = redis::Script::new(HSETNX_IF_LISTED);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(list)
            .key(hash)
            .arg(value)
            .arg(field)
            .arg(field_value);
        let written: i64 = invocation
            .invoke_async(&mut self.conn())
            .await
            .context("Conditional hash write failed")?;
        Ok(written == 1)
    }

    async fn isolated(&self) -> Result<Arc<dyn KvStore>> {
        let conn = ConnectionManager::new(self.client.clone())
            .await
            .context("Failed to open dedicated Redis connection")?;
        Ok(Arc::new(Self {
            client: self.client.clone(),
            conn,
        }))
    }
}
