use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::errors::LedgerError;

/// 요청 금액 상한 (최소 단위)
pub const MAX_REQUEST_AMOUNT: i64 = 999_999_999;

const MAX_IDENTITY_LEN: usize = 32;
const MAX_REQUEST_ID_LEN: usize = 64;

/// 잔고 변경 요청 본문
/// Balance mutation request body
///
/// `/deduct`, `/store` 엔드포인트가 같은 본문을 사용하고,
/// 어떤 연산인지는 경로로 결정됩니다.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MutationRequest {
    /// 에이전트 ID
    #[schema(example = "agent01")]
    pub agent: String,

    /// 에이전트 내 사용자 ID
    #[schema(example = "10001")]
    pub user: String,

    /// 클라이언트가 생성한 고유 요청 ID (재시도 시 동일해야 함)
    #[serde(alias = "requestid", alias = "request_id")]
    #[schema(example = "6f1c1c1e-6a3e-4c56-9a4c-2f0b4f1f9a10")]
    pub request_id: String,

    /// 금액 (최소 화폐 단위, 양수)
    #[schema(example = 300)]
    pub amount: i64,

    /// 게임 ID (차감 시 캐시에 LastGameID로 기록)
    #[serde(default, alias = "gameid", alias = "game_id")]
    pub game_id: Option<i64>,
}

impl MutationRequest {
    pub fn credit(self) -> Mutation {
        Mutation {
            agent: self.agent,
            user: self.user,
            request_id: self.request_id,
            amount: self.amount,
            kind: OperationKind::Credit,
            client_ip: None,
        }
    }

    pub fn debit(self) -> Mutation {
        Mutation {
            agent: self.agent,
            user: self.user,
            request_id: self.request_id,
            amount: self.amount,
            kind: OperationKind::Debit { game_id: self.game_id },
            client_ip: None,
        }
    }
}

/// 연산 종류
/// Operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationKind {
    /// 입금 (store)
    Credit,
    /// 출금 (deduct)
    Debit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_id: Option<i64>,
    },
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Credit => "credit",
            OperationKind::Debit { .. } => "debit",
        }
    }

    pub fn game_id(&self) -> Option<i64> {
        match self {
            OperationKind::Credit => None,
            OperationKind::Debit { game_id } => *game_id,
        }
    }

    /// 변경 후 잔고 계산
    /// Compute the balance after applying `amount`
    ///
    /// 출금은 잔고를 음수로 만들 수 없고, 입금은 i64 범위를 넘을 수 없습니다.
    pub fn apply(&self, before: i64, amount: i64) -> Result<i64, LedgerError> {
        match self {
            OperationKind::Credit => before
                .checked_add(amount)
                .ok_or(LedgerError::AmountOutOfRange { balance: before, amount }),
            OperationKind::Debit { .. } => {
                if amount > before {
                    return Err(LedgerError::InsufficientFunds {
                        balance: before,
                        requested: amount,
                    });
                }
                Ok(before - amount)
            }
        }
    }
}

/// 엔진에 전달되는 단일 잔고 변경 명령
/// A single validated-or-not mutation command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub agent: String,
    pub user: String,
    pub request_id: String,
    pub amount: i64,
    pub kind: OperationKind,
    /// 직접 모드의 중복 요청 기록에 남는 호출자 IP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
}

impl Mutation {
    pub fn with_client_ip(mut self, client_ip: Option<String>) -> Self {
        self.client_ip = client_ip;
        self
    }

    /// 입력 검증
    /// Validate identity, request id and amount
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.agent.trim().is_empty() || self.agent.len() > MAX_IDENTITY_LEN {
            return Err(LedgerError::InvalidRequest(format!(
                "agent must be 1..={} characters",
                MAX_IDENTITY_LEN
            )));
        }
        if self.user.trim().is_empty() || self.user.len() > MAX_IDENTITY_LEN {
            return Err(LedgerError::InvalidRequest(format!(
                "user must be 1..={} characters",
                MAX_IDENTITY_LEN
            )));
        }
        // ':'는 캐시 키 구분자
        if self.agent.contains(':') || self.user.contains(':') {
            return Err(LedgerError::InvalidRequest(
                "agent and user must not contain ':'".to_string(),
            ));
        }
        if self.request_id.trim().is_empty() || self.request_id.len() > MAX_REQUEST_ID_LEN {
            return Err(LedgerError::InvalidRequest(format!(
                "requestId must be 1..={} characters",
                MAX_REQUEST_ID_LEN
            )));
        }
        if self.amount <= 0 || self.amount > MAX_REQUEST_AMOUNT {
            return Err(LedgerError::InvalidRequest(format!(
                "amount must be in 1..={}",
                MAX_REQUEST_AMOUNT
            )));
        }
        Ok(())
    }
}
