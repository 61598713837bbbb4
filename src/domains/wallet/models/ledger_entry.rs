use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::request::{Mutation, OperationKind};

/// 주문(원장 항목) 상태
/// Ledger entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Ok,
    Failed,
    Other,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Ok => "ok",
            OrderStatus::Failed => "failed",
            OrderStatus::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(OrderStatus::Created),
            "ok" => Some(OrderStatus::Ok),
            "failed" => Some(OrderStatus::Failed),
            "other" => Some(OrderStatus::Other),
            _ => None,
        }
    }
}

/// 원장 항목 (주문)
/// Ledger entry (order)
///
/// 한 번 커밋되면 수정되지 않습니다.
/// `after_amount = before_amount ± amount` (연산 종류에 따라)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// 주문 ID (UUID v4)
    pub id: Uuid,
    pub agent: String,
    pub user: String,
    pub wallet_id: i64,
    #[schema(value_type = Object, example = json!({"kind": "debit", "game_id": 7}))]
    pub kind: OperationKind,
    pub request_id: String,
    /// 요청 금액 (최소 단위)
    pub amount: i64,
    pub before_amount: i64,
    pub after_amount: i64,
    pub status: OrderStatus,
    /// 계정별 변경 순번 (락 순서대로 1씩 증가)
    #[serde(default)]
    pub seq: i64,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// 성공한 변경에 대한 원장 항목 생성
    pub fn accepted(
        id: Uuid,
        mutation: &Mutation,
        wallet_id: i64,
        seq: i64,
        before_amount: i64,
        after_amount: i64,
    ) -> Self {
        Self {
            id,
            agent: mutation.agent.clone(),
            user: mutation.user.clone(),
            wallet_id,
            kind: mutation.kind,
            request_id: mutation.request_id.clone(),
            amount: mutation.amount,
            before_amount,
            after_amount,
            status: OrderStatus::Ok,
            seq,
            created_at: Utc::now(),
        }
    }

    pub fn game_id(&self) -> Option<i64> {
        self.kind.game_id()
    }
}
