use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{KvOp, KvStore};

/// 메모리 기반 KvStore (테스트/벤치마크용)
/// In-memory KvStore for tests and benchmarks
///
/// Redis와 같은 의미(SET NX, HSET, LPUSH/BRPOPLPUSH/LREM, TTL)를
/// 하나의 Mutex 안에서 흉내 냅니다. 한 번의 잠금 안에서 처리되므로
/// 각 명령과 `exec_atomic` 배치는 원자적입니다.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    /// 리스트에 값이 들어오면 BRPOPLPUSH 대기자를 깨움
    list_pushed: Notify,
    /// true면 모든 명령이 실패 (장애 주입)
    unavailable: Mutex<bool>,
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 장애 주입: 이후 모든 명령을 실패시키거나 복구
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.inner.unavailable.lock() = unavailable;
    }

    /// 키 존재 여부 (만료 반영)
    pub fn contains_key(&self, key: &str) -> bool {
        let mut entries = self.inner.entries.lock();
        purge_if_expired(&mut entries, key);
        entries.contains_key(key)
    }

    /// 남은 TTL 조회 (테스트용)
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let mut entries = self.inner.entries.lock();
        purge_if_expired(&mut entries, key);
        entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    fn check_available(&self) -> Result<()> {
        if *self.inner.unavailable.lock() {
            bail!("memory kv store is unavailable");
        }
        Ok(())
    }
}

fn purge_if_expired(entries: &mut HashMap<String, Entry>, key: &str) {
    let now = Instant::now();
    if entries.get(key).map(|e| e.is_expired(now)).unwrap_or(false) {
        entries.remove(key);
    }
}

fn wrong_type(key: &str) -> anyhow::Error {
    anyhow::anyhow!("WRONGTYPE operation against key holding the wrong kind of value: {}", key)
}

fn hash_mut<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> Result<&'a mut HashMap<String, String>> {
    purge_if_expired(entries, key);
    let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
        value: Value::Hash(HashMap::new()),
        expires_at: None,
    });
    match &mut entry.value {
        Value::Hash(hash) => Ok(hash),
        _ => Err(wrong_type(key)),
    }
}

fn list_mut<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> Result<&'a mut VecDeque<String>> {
    purge_if_expired(entries, key);
    let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
        value: Value::List(VecDeque::new()),
        expires_at: None,
    });
    match &mut entry.value {
        Value::List(list) => Ok(list),
        _ => Err(wrong_type(key)),
    }
}

/// 빈 리스트/해시는 Redis처럼 키 자체를 제거
fn drop_if_empty(entries: &mut HashMap<String, Entry>, key: &str) {
    let empty = match entries.get(key).map(|e| &e.value) {
        Some(Value::List(list)) => list.is_empty(),
        Some(Value::Hash(hash)) => hash.is_empty(),
        _ => false,
    };
    if empty {
        entries.remove(key);
    }
}

fn apply_hset(entries: &mut HashMap<String, Entry>, key: &str, fields: &[(String, String)]) -> Result<()> {
    let hash = hash_mut(entries, key)?;
    for (field, value) in fields {
        hash.insert(field.clone(), value.clone());
    }
    Ok(())
}

fn apply_expire(entries: &mut HashMap<String, Entry>, key: &str, ttl: Duration) -> bool {
    purge_if_expired(entries, key);
    match entries.get_mut(key) {
        Some(entry) => {
            entry.expires_at = Some(Instant::now() + ttl);
            true
        }
        None => false,
    }
}

fn apply_lrem(entries: &mut HashMap<String, Entry>, key: &str, count: i64, value: &str) -> Result<i64> {
    purge_if_expired(entries, key);
    if !entries.contains_key(key) {
        return Ok(0);
    }
    let list = list_mut(entries, key)?;
    let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
    let mut removed = 0usize;

    if count >= 0 {
        let mut idx = 0;
        while idx < list.len() && removed < limit {
            if list[idx] == value {
                list.remove(idx);
                removed += 1;
            } else {
                idx += 1;
            }
        }
    } else {
        let mut idx = list.len();
        while idx > 0 && removed < limit {
            idx -= 1;
            if list[idx] == value {
                list.remove(idx);
                removed += 1;
            }
        }
    }

    drop_if_empty(entries, key);
    Ok(removed as i64)
}

fn apply_set(entries: &mut HashMap<String, Entry>, key: &str, value: &str, ttl: Option<Duration>) {
    entries.insert(
        key.to_string(),
        Entry {
            value: Value::Str(value.to_string()),
            expires_at: ttl.map(|t| Instant::now() + t),
        },
    );
}

/// Redis LRANGE 인덱스 규칙 (음수는 꼬리 기준)
fn normalize_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.check_available()?;
        let mut entries = self.inner.entries.lock();
        purge_if_expired(&mut entries, key);
        if entries.contains_key(key) {
            return Ok(false);
        }
        apply_set(&mut entries, key, value, Some(ttl));
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let mut entries = self.inner.entries.lock();
        purge_if_expired(&mut entries, key);
        match entries.get(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.inner.entries.lock().remove(key);
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.check_available()?;
        let mut entries = self.inner.entries.lock();
        purge_if_expired(&mut entries, key);
        match entries.get(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        self.check_available()?;
        let mut entries = self.inner.entries.lock();
        apply_hset(&mut entries, key, fields)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.check_available()?;
        let mut entries = self.inner.entries.lock();
        Ok(apply_expire(&mut entries, key, ttl))
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        {
            let mut entries = self.inner.entries.lock();
            list_mut(&mut entries, key)?.push_front(value.to_string());
        }
        self.inner.list_pushed.notify_waiters();
        Ok(())
    }

    async fn brpoplpush(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;

        loop {
            self.check_available()?;

            // notify_waiters()는 호출 전에 만들어진 Notified만 깨우므로 먼저 생성
            let pushed = self.inner.list_pushed.notified();

            {
                let mut entries = self.inner.entries.lock();
                purge_if_expired(&mut entries, source);
                let popped = match entries.get_mut(source).map(|e| &mut e.value) {
                    Some(Value::List(list)) => list.pop_back(),
                    Some(_) => return Err(wrong_type(source)),
                    None => None,
                };
                if let Some(value) = popped {
                    drop_if_empty(&mut entries, source);
                    list_mut(&mut entries, destination)?.push_front(value.clone());
                    return Ok(Some(value));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // 타임아웃이든 깨어남이든 다시 확인
            let _ = tokio::time::timeout(deadline - now, pushed).await;
        }
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> Result<i64> {
        self.check_available()?;
        let mut entries = self.inner.entries.lock();
        apply_lrem(&mut entries, key, count, value)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.check_available()?;
        let mut entries = self.inner.entries.lock();
        purge_if_expired(&mut entries, key);
        match entries.get(key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(normalize_range(list.len(), start, stop)
                .map(|(from, to)| list.iter().skip(from).take(to - from + 1).cloned().collect())
                .unwrap_or_default()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn llen(&self, key: &str) -> Result<i64> {
        self.check_available()?;
        let mut entries = self.inner.entries.lock();
        purge_if_expired(&mut entries, key);
        match entries.get(key).map(|e| &e.value) {
            None => Ok(0),
            Some(Value::List(list)) => Ok(list.len() as i64),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn exec_atomic(&self, ops: Vec<KvOp>) -> Result<()> {
        self.check_available()?;
        let mut pushed = false;
        {
            let mut entries = self.inner.entries.lock();
            for op in &ops {
                match op {
                    KvOp::HSet { key, fields } => apply_hset(&mut entries, key, fields)?,
                    KvOp::HDel { key, field } => {
                        purge_if_expired(&mut entries, key);
                        if let Some(Entry { value: Value::Hash(hash), .. }) = entries.get_mut(key) {
                            hash.remove(field);
                        }
                        drop_if_empty(&mut entries, key);
                    }
                    KvOp::Expire { key, ttl } => {
                        apply_expire(&mut entries, key, *ttl);
                    }
                    KvOp::LPush { key, value } => {
                        list_mut(&mut entries, key)?.push_front(value.clone());
                        pushed = true;
                    }
                    KvOp::LRem { key, count, value } => {
                        apply_lrem(&mut entries, key, *count, value)?;
                    }
                    KvOp::SetEx { key, value, ttl } => apply_set(&mut entries, key, value, Some(*ttl)),
                }
            }
        }
        if pushed {
            self.inner.list_pushed.notify_waiters();
        }
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
        self.check_available()?;
        {
            let mut entries = self.inner.entries.lock();
            if apply_lrem(&mut entries, source, -1, value)? != 1 {
                return Ok(false);
            }
            purge_if_expired(&mut entries, hash);
            if let Some(Entry { value: Value::Hash(h), .. }) = entries.get_mut(hash) {
                h.remove(field);
            }
            drop_if_empty(&mut entries, hash);
            list_mut(&mut entries, destination)?.push_front(value.to_string());
        }
        self.inner.list_pushed.notify_waiters();
        Ok(true)
    }

    async fn hsetnx_if_listed(
        &self,
        list: &str,
        value: &str,
        hash: &str,
        field: &str,
        field_value: &str,
    ) -> Result<bool> {
        self.check_available()?;
        let mut entries = self.inner.entries.lock();
        purge_if_expired(&mut entries, list);
        let listed = match entries.get(list).map(|e| &e.value) {
            None => false,
            Some(Value::List(items)) => items.iter().any(|v| v == value),
            Some(_) => return Err(wrong_type(list)),
        };
        if !listed {
            return Ok(false);
        }
        let h = hash_mut(&mut entries, hash)?;
        if h.contains_key(field) {
            return Ok(false);
        }
        h.insert(field.to_string(), field_value.to_string());
        Ok(true)
    }

    async fn isolated(&self) -> Result<Arc<dyn KvStore>> {
        Ok(Arc::new(self.clone()))
    }
}
