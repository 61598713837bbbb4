// =====================================================
// MutationEngine - 잔고 변경 처리
// =====================================================
// 역할: 요청 하나에 대해
//   중복 확인 → 계정 락 → 캐시 조회(미스 시 DB 재적재) → 검증
//   → 캐시 쓰기 + 큐 적재 (원자 배치) → 락 해제
//
// 처리 흐름:
// 1. 요청 검증, 주문 ID 생성
// 2. IdempotencyGuard 등록 (중복이면 DuplicateRequest)
// 3. DistributedLock 획득 (시간 초과면 FailedRequest 기록 후 LockTimeout)
// 4. BalanceCache 조회 (미스면 최대 N번 재적재, 모두 실패하면 CacheUnavailable)
// 5. 상태 / 지갑 확인
// 6. 새 잔고 계산 (로컬 계산 또는 외부 지갑)
// 7. 캐시 필드 + 만료 + 큐 항목 + 주문 스냅샷을 한 배치로 기록
// 8. 락 해제
//
// 큐 적재는 락을 잡은 상태에서 일어나므로, 같은 계정의 항목은
// 만들어진 순서대로 큐에 들어갑니다.
// 거절된 요청은 캐시도 큐도 건드리지 않습니다.
// =====================================================

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domains::wallet::models::{CachedBalance, LedgerEntry, Mutation, QueueItem};
use crate::domains::wallet::runtime::WriteBehindQueue;
use crate::shared::clients::SingleWalletClient;
use crate::shared::config::AppConfig;
use crate::shared::database::LedgerStore;
use crate::shared::errors::LedgerError;
use crate::shared::kv::{KvOp, KvStore};
use crate::shared::utils::key_builder;

use super::agent_cache::AgentCache;
use super::balance_cache::BalanceCache;
use super::idempotency::IdempotencyGuard;
use super::lock::{DistributedLock, LockSettings};

/// 새 잔고를 누가 계산하는가
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Authority {
    /// 캐시 잔고로 직접 계산
    Local,
    /// 에이전트의 단일 외부 지갑이 계산
    SingleWallet,
}

fn cache_error(e: anyhow::Error) -> LedgerError {
    LedgerError::CacheUnavailable(format!("{:#}", e))
}

pub struct MutationEngine {
    kv: Arc<dyn KvStore>,
    store: Arc<dyn LedgerStore>,
    guard: IdempotencyGuard,
    lock: DistributedLock,
    cache: BalanceCache,
    agents: AgentCache,
    single_wallet: SingleWalletClient,
    reload_attempts: u32,
    orders_ttl: std::time::Duration,
}

impl MutationEngine {
    /// 엔진 생성
    /// Create engine from explicitly constructed store handles
    pub fn new(
        kv: Arc<dyn KvStore>,
        store: Arc<dyn LedgerStore>,
        config: &AppConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            guard: IdempotencyGuard::new(kv.clone(), config.request_id_ttl),
            lock: DistributedLock::new(
                kv.clone(),
                LockSettings {
                    ttl: config.lock_ttl,
                    timeout: config.lock_timeout,
                    retry_interval: config.lock_retry_interval,
                },
            ),
            cache: BalanceCache::new(kv.clone(), config.cache_ttl),
            agents: AgentCache::new(kv.clone(), config.cache_ttl),
            single_wallet: SingleWalletClient::new(config.http_client_timeout)?,
            reload_attempts: config.cache_reload_attempts,
            orders_ttl: config.orders_ttl,
            kv,
            store,
        })
    }

    pub fn cache(&self) -> &BalanceCache {
        &self.cache
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 공개 진입점
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 캐시 경로 변경 (입금/출금)
    /// Apply a mutation on the cache path
    pub async fn apply(&self, mutation: Mutation) -> Result<LedgerEntry, LedgerError> {
        self.run(mutation, Authority::Local).await
    }

    /// 단일 외부 지갑 경로 변경
    /// Apply a mutation whose result is decided by the agent's external wallet
    pub async fn apply_single(&self, mutation: Mutation) -> Result<LedgerEntry, LedgerError> {
        self.run(mutation, Authority::SingleWallet).await
    }

    /// 직접 DB 경로 (캐시/락/큐를 거치지 않음)
    /// Direct-to-database mutation
    pub async fn apply_direct(&self, mutation: Mutation) -> Result<LedgerEntry, LedgerError> {
        mutation.validate()?;
        let entry = self.store.apply_direct(&mutation, Uuid::new_v4()).await?;
        tracing::info!(
            order_id = %entry.id,
            request_id = %entry.request_id,
            before = entry.before_amount,
            after = entry.after_amount,
            "direct mutation committed"
        );
        Ok(entry)
    }

    /// 주문 스냅샷 조회 (만료되면 OrderNotFound)
    pub async fn order_snapshot(&self, order_id: &str) -> Result<LedgerEntry, LedgerError> {
        let raw = self
            .kv
            .get(&key_builder::order_key(order_id))
            .await
            .map_err(cache_error)?
            .ok_or_else(|| LedgerError::OrderNotFound { order_id: order_id.to_string() })?;

        serde_json::from_str(&raw)
            .map_err(|e| LedgerError::Internal(format!("Unreadable order snapshot: {}", e)))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 내부 처리
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn run(&self, mutation: Mutation, authority: Authority) -> Result<LedgerEntry, LedgerError> {
        mutation.validate()?;

        // 1. 주문 ID
        let order_id = Uuid::new_v4();

        // 2. 중복 요청 확인
        let payload = serde_json::to_string(&mutation)
            .map_err(|e| LedgerError::Internal(format!("Failed to serialize request: {}", e)))?;
        let accepted = self
            .guard
            .register(&mutation.request_id, &payload)
            .await
            .map_err(cache_error)?;
        if !accepted {
            return Err(LedgerError::DuplicateRequest {
                request_id: mutation.request_id.clone(),
            });
        }

        // 3. 계정 락
        let lock_key = key_builder::lock_key(&mutation.agent, &mutation.user);
        if let Err(err) = self.lock.acquire(&lock_key, &mutation.request_id).await {
            if matches!(err, LedgerError::LockTimeout { .. }) {
                self.record_failed_request(&mutation.request_id, &payload).await;
            }
            return Err(err);
        }

        // 4~7. 락 안에서 처리
        let result = self.apply_locked(&mutation, order_id, authority).await;

        // 8. 락 해제 (실패해도 TTL로 만료)
        if let Err(e) = self.lock.release(&lock_key).await {
            tracing::warn!(key = %lock_key, error = %e, "failed to release lock");
        }

        match &result {
            Ok(entry) => tracing::info!(
                order_id = %entry.id,
                request_id = %entry.request_id,
                kind = entry.kind.as_str(),
                before = entry.before_amount,
                after = entry.after_amount,
                "mutation accepted"
            ),
            Err(err) => tracing::info!(
                request_id = %mutation.request_id,
                code = err.code(),
                "mutation rejected"
            ),
        }
        result
    }

    async fn apply_locked(
        &self,
        mutation: &Mutation,
        order_id: Uuid,
        authority: Authority,
    ) -> Result<LedgerEntry, LedgerError> {
        let account_key = BalanceCache::key(&mutation.agent, &mutation.user);

        // 캐시 조회 (미스면 재적재)
        let record = self.load_cached(mutation, &account_key).await?;

        if !record.enabled {
            return Err(LedgerError::AccountDisabled {
                agent: mutation.agent.clone(),
                user: mutation.user.clone(),
            });
        }
        let wallet_id = record.wallet_id.ok_or_else(|| LedgerError::WalletNotProvisioned {
            agent: mutation.agent.clone(),
            user: mutation.user.clone(),
        })?;

        // 새 잔고 계산
        let before = record.balance;
        let after = match authority {
            Authority::Local => mutation.kind.apply(before, mutation.amount)?,
            Authority::SingleWallet => {
                let url = self.single_wallet_url(mutation).await?;
                self.single_wallet
                    .apply(&url, mutation)
                    .await
                    .map_err(|e| LedgerError::UpstreamUnavailable(format!("{:#}", e)))?
            }
        };

        // 캐시 쓰기 + 큐 적재 + 주문 스냅샷 (원자 배치)
        // 순번은 락 안에서 증가 (DB 반영 순서 판단에 사용)
        let seq = record.seq + 1;
        let entry = LedgerEntry::accepted(order_id, mutation, wallet_id, seq, before, after);
        let item = QueueItem::new(entry.clone(), Utc::now().timestamp_millis());
        let raw = WriteBehindQueue::encode(&item)?;
        let snapshot = serde_json::to_string(&entry)
            .map_err(|e| LedgerError::Internal(format!("Failed to serialize order: {}", e)))?;

        let mut ops = self.cache.mutation_ops(&account_key, &record, &item.cache);
        ops.push(WriteBehindQueue::enqueue_op(raw));
        ops.push(KvOp::SetEx {
            key: key_builder::order_key(&entry.id.to_string()),
            value: snapshot,
            ttl: self.orders_ttl,
        });

        if let Err(e) = self.kv.exec_atomic(ops).await {
            if authority == Authority::SingleWallet {
                // 외부 지갑은 이미 반영됨 (캐시는 다음 재적재 때 맞춰짐)
                tracing::error!(
                    order_id = %entry.id,
                    request_id = %entry.request_id,
                    after = entry.after_amount,
                    error = %e,
                    "external wallet applied but cache write failed"
                );
            }
            return Err(cache_error(e));
        }

        Ok(entry)
    }

    /// 캐시 레코드 조회, 미스면 DB에서 재적재 (최대 reload_attempts번)
    async fn load_cached(&self, mutation: &Mutation, key: &str) -> Result<CachedBalance, LedgerError> {
        let mut last_error = String::from("record missing after reload");

        for attempt in 1..=self.reload_attempts {
            if let Some(record) = self.cache.read_record(key).await.map_err(cache_error)? {
                return Ok(record);
            }

            let snapshot = match self.store.load_account(&mutation.agent, &mutation.user).await {
                Ok(Some(s)) => s,
                Ok(None) => {
                    return Err(LedgerError::AccountNotFound {
                        agent: mutation.agent.clone(),
                        user: mutation.user.clone(),
                    })
                }
                Err(e) => {
                    tracing::warn!(key, attempt, error = %e, "cache reload failed");
                    last_error = format!("{:#}", e);
                    continue;
                }
            };

            if snapshot.wallet.is_none() {
                return Err(LedgerError::WalletNotProvisioned {
                    agent: mutation.agent.clone(),
                    user: mutation.user.clone(),
                });
            }

            if let Err(e) = self.cache.populate(key, &snapshot).await {
                tracing::warn!(key, attempt, error = %e, "cache populate failed");
                last_error = format!("{:#}", e);
                continue;
            }
            tracing::debug!(key, attempt, "balance cache reloaded");
        }

        // 마지막 재적재 결과 확인
        match self.cache.read_record(key).await.map_err(cache_error)? {
            Some(record) => Ok(record),
            None => Err(LedgerError::CacheUnavailable(format!(
                "reload attempts exhausted for {}: {}",
                key, last_error
            ))),
        }
    }

    /// 에이전트의 외부 지갑 URL (미스면 DB에서 재적재)
    async fn single_wallet_url(&self, mutation: &Mutation) -> Result<String, LedgerError> {
        let mut record = self.agents.read(&mutation.agent).await.map_err(cache_error)?;

        let mut attempts = 0;
        while record.is_none() && attempts < self.reload_attempts {
            attempts += 1;
            match self.store.load_agent(&mutation.agent).await {
                Ok(Some(agent)) => {
                    if let Err(e) = self.agents.populate(&agent).await {
                        tracing::warn!(agent = %mutation.agent, error = %e, "agent cache populate failed");
                    }
                    record = Some(agent);
                }
                Ok(None) => {
                    return Err(LedgerError::AccountNotFound {
                        agent: mutation.agent.clone(),
                        user: mutation.user.clone(),
                    })
                }
                Err(e) => {
                    tracing::warn!(agent = %mutation.agent, attempt = attempts, error = %e, "agent reload failed");
                }
            }
        }

        let agent = record.ok_or_else(|| {
            LedgerError::CacheUnavailable(format!("agent {} could not be loaded", mutation.agent))
        })?;
        if !agent.enabled {
            return Err(LedgerError::AccountDisabled {
                agent: mutation.agent.clone(),
                user: mutation.user.clone(),
            });
        }
        agent.single_wallet_url.ok_or_else(|| {
            LedgerError::UpstreamUnavailable(format!(
                "single wallet url is not configured for agent {}",
                mutation.agent
            ))
        })
    }

    /// 락 시간 초과 요청을 FailedRequest 리스트에 기록
    async fn record_failed_request(&self, request_id: &str, payload: &str) {
        let snapshot = match self.guard.snapshot(request_id).await {
            Ok(Some(s)) => s,
            _ => payload.to_string(),
        };
        if let Err(e) = self.lock.record_failed(&snapshot).await {
            tracing::error!(request_id, error = %e, "failed to record failed request");
        }
    }
}
