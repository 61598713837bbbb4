// =====================================================
// MemoryLedgerStore - 메모리 기반 영속 저장소 (테스트용)
// =====================================================
// 역할: PostgreSQL 없이 엔진/워커/리퍼를 테스트하기 위한 LedgerStore 구현
//
// 추가 기능:
// - 조회 횟수 카운터 (캐시 재적재 검증)
// - 장애 주입 (persist 실패, 전체 불가)
// =====================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::domains::wallet::models::{
    AccountSnapshot, AgentRecord, LedgerEntry, Mutation, WalletSnapshot,
};
use crate::shared::database::LedgerStore;
use crate::shared::errors::LedgerError;

type AccountKey = (String, String);

#[derive(Default)]
struct State {
    agents: HashMap<String, AgentRecord>,
    accounts: HashMap<AccountKey, bool>,
    wallets: HashMap<AccountKey, WalletSnapshot>,
    entries: Vec<LedgerEntry>,
    dedup: HashMap<(String, String), DateTime<Utc>>,
    next_wallet_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<State>>,
    account_loads: Arc<AtomicUsize>,
    fail_persist: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 테스트 데이터 설정
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn insert_agent(&self, agent: &str, enabled: bool, single_wallet_url: Option<&str>) {
        self.state.lock().agents.insert(
            agent.to_string(),
            AgentRecord {
                agent_id: agent.to_string(),
                enabled,
                single_wallet_url: single_wallet_url.map(str::to_string),
            },
        );
    }

    pub fn insert_account(&self, agent: &str, user: &str, enabled: bool) {
        self.state
            .lock()
            .accounts
            .insert((agent.to_string(), user.to_string()), enabled);
    }

    /// 지갑 생성 (잔고는 최소 단위)
    ///
    /// # Returns
    /// 지갑 ID
    pub fn provision_wallet(&self, agent: &str, user: &str, balance: i64) -> i64 {
        let mut state = self.state.lock();
        state.next_wallet_id += 1;
        let id = state.next_wallet_id;
        state.wallets.insert(
            (agent.to_string(), user.to_string()),
            WalletSnapshot {
                id,
                balance,
                currency: "USD".to_string(),
                seq: 0,
                updated_at: DateTime::<Utc>::MIN_UTC,
            },
        );
        id
    }

    /// 에이전트 + 계정 + 지갑을 한 번에 생성
    pub fn seed_account(&self, agent: &str, user: &str, balance: i64) -> i64 {
        if !self.state.lock().agents.contains_key(agent) {
            self.insert_agent(agent, true, None);
        }
        self.insert_account(agent, user, true);
        self.provision_wallet(agent, user, balance)
    }

    pub fn set_account_enabled(&self, agent: &str, user: &str, enabled: bool) {
        self.insert_account(agent, user, enabled);
    }

    pub fn insert_request_dedup(&self, request_id: &str, client_ip: &str, created_at: DateTime<Utc>) {
        self.state
            .lock()
            .dedup
            .insert((request_id.to_string(), client_ip.to_string()), created_at);
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 검증용 조회
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn wallet_balance(&self, agent: &str, user: &str) -> Option<i64> {
        self.state
            .lock()
            .wallets
            .get(&(agent.to_string(), user.to_string()))
            .map(|w| w.balance)
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().entries.clone()
    }

    pub fn dedup_count(&self) -> usize {
        self.state.lock().dedup.len()
    }

    /// load_account 호출 횟수
    pub fn account_loads(&self) -> usize {
        self.account_loads.load(Ordering::SeqCst)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 장애 주입
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn set_fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("memory ledger store is unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn load_account(&self, agent: &str, user: &str) -> Result<Option<AccountSnapshot>> {
        self.account_loads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let state = self.state.lock();
        let key = (agent.to_string(), user.to_string());
        let user_enabled = match state.accounts.get(&key) {
            Some(enabled) => *enabled,
            None => return Ok(None),
        };
        let agent_enabled = state.agents.get(agent).map(|a| a.enabled).unwrap_or(false);

        Ok(Some(AccountSnapshot {
            agent: agent.to_string(),
            user: user.to_string(),
            enabled: user_enabled && agent_enabled,
            wallet: state.wallets.get(&key).cloned(),
        }))
    }

    async fn load_agent(&self, agent: &str) -> Result<Option<AgentRecord>> {
        self.check_available()?;
        Ok(self.state.lock().agents.get(agent).cloned())
    }

    async fn persist_entry(&self, entry: &LedgerEntry) -> Result<bool> {
        self.check_available()?;
        if self.fail_persist.load(Ordering::SeqCst) {
            bail!("injected persistence failure");
        }

        let mut state = self.state.lock();
        if state.entries.iter().any(|e| e.id == entry.id) {
            return Ok(false);
        }

        let wallet = match state.wallets.values_mut().find(|w| w.id == entry.wallet_id) {
            Some(w) => w,
            None => bail!("Wallet {} not found", entry.wallet_id),
        };
        if entry.seq > wallet.seq {
            wallet.balance = entry.after_amount;
            wallet.seq = entry.seq;
            wallet.updated_at = Utc::now();
        }
        state.entries.push(entry.clone());
        Ok(true)
    }

    async fn purge_request_dedup(&self, older_than: DateTime<Utc>) -> Result<u64> {
        self.check_available()?;
        let mut state = self.state.lock();
        let before = state.dedup.len();
        state.dedup.retain(|_, created_at| *created_at >= older_than);
        Ok((before - state.dedup.len()) as u64)
    }

    async fn apply_direct(&self, mutation: &Mutation, entry_id: Uuid) -> Result<LedgerEntry, LedgerError> {
        self.check_available()?;
        let mut state = self.state.lock();

        let dedup_key = (
            mutation.request_id.clone(),
            mutation.client_ip.clone().unwrap_or_default(),
        );
        if state.dedup.contains_key(&dedup_key) {
            return Err(LedgerError::DuplicateRequest {
                request_id: mutation.request_id.clone(),
            });
        }
        state.dedup.insert(dedup_key, Utc::now());

        let key = (mutation.agent.clone(), mutation.user.clone());
        let user_enabled = match state.accounts.get(&key) {
            Some(enabled) => *enabled,
            None => {
                return Err(LedgerError::AccountNotFound {
                    agent: mutation.agent.clone(),
                    user: mutation.user.clone(),
                })
            }
        };
        let agent_enabled = state.agents.get(&mutation.agent).map(|a| a.enabled).unwrap_or(false);
        if !(user_enabled && agent_enabled) {
            return Err(LedgerError::AccountDisabled {
                agent: mutation.agent.clone(),
                user: mutation.user.clone(),
            });
        }

        let wallet = state.wallets.get(&key).cloned().ok_or_else(|| LedgerError::WalletNotProvisioned {
            agent: mutation.agent.clone(),
            user: mutation.user.clone(),
        })?;

        let after = mutation.kind.apply(wallet.balance, mutation.amount)?;
        let entry = LedgerEntry::accepted(entry_id, mutation, wallet.id, wallet.seq + 1, wallet.balance, after);

        if let Some(w) = state.wallets.get_mut(&key) {
            w.balance = after;
            w.seq = entry.seq;
            w.updated_at = entry.created_at;
        }
        state.entries.push(entry.clone());
        Ok(entry)
    }
}
