// Wallet ledger domain state
// 원장 도메인 상태
use std::sync::Arc;
use anyhow::Result;

use crate::domains::wallet::engine::MutationEngine;
use crate::domains::wallet::runtime::WriteBehindQueue;
use crate::shared::config::AppConfig;
use crate::shared::database::LedgerStore;
use crate::shared::kv::KvStore;

/// Ledger domain state
/// 원장 도메인에서 필요한 서비스들을 포함하는 상태
#[derive(Clone)]
pub struct LedgerState {
    pub engine: Arc<MutationEngine>,
    pub queue: WriteBehindQueue,
}

impl LedgerState {
    /// Create LedgerState with store handles
    pub fn new(kv: Arc<dyn KvStore>, store: Arc<dyn LedgerStore>, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            engine: Arc::new(MutationEngine::new(kv.clone(), store, config)?),
            queue: WriteBehindQueue::new(kv),
        })
    }
}
