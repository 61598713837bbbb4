use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::domains::wallet::models::AgentRecord;
use crate::shared::kv::{KvOp, KvStore};
use crate::shared::utils::key_builder::{self, FIELD_AGENT_ID, FIELD_SINGLE_WALLET_URL, FIELD_STATUS};

/// 에이전트 메타데이터 캐시 (Agent:{agent})
/// Agent metadata cache used by the single external wallet variant
#[derive(Clone)]
pub struct AgentCache {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl AgentCache {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// 캐시된 에이전트 조회 (AgentID 필드가 없으면 미스)
    pub async fn read(&self, agent: &str) -> Result<Option<AgentRecord>> {
        let key = key_builder::agent_key(agent);
        let agent_id = match self.kv.hget(&key, FIELD_AGENT_ID).await? {
            Some(id) => id,
            None => return Ok(None),
        };
        let enabled = matches!(
            self.kv.hget(&key, FIELD_STATUS).await?.as_deref(),
            Some("1") | Some("true")
        );
        let single_wallet_url = self
            .kv
            .hget(&key, FIELD_SINGLE_WALLET_URL)
            .await?
            .filter(|url| !url.is_empty());

        Ok(Some(AgentRecord { agent_id, enabled, single_wallet_url }))
    }

    /// DB에서 읽은 에이전트로 캐시 채우기 (필드 + 만료 원자적)
    pub async fn populate(&self, record: &AgentRecord) -> Result<()> {
        let key = key_builder::agent_key(&record.agent_id);
        let fields = vec![
            (FIELD_AGENT_ID.to_string(), record.agent_id.clone()),
            (
                FIELD_STATUS.to_string(),
                if record.enabled { "1" } else { "0" }.to_string(),
            ),
            (
                FIELD_SINGLE_WALLET_URL.to_string(),
                record.single_wallet_url.clone().unwrap_or_default(),
            ),
        ];
        self.kv
            .exec_atomic(vec![
                KvOp::HSet { key: key.clone(), fields },
                KvOp::Expire { key, ttl: self.ttl },
            ])
            .await
    }
}
