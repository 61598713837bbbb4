use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domains::wallet::models::Mutation;

// 단일 외부 지갑 클라이언트
// 역할: 에이전트가 잔고를 직접 관리하는 경우, 잔고 계산을 외부 지갑에 위임
// Single external wallet authority client
//
// 응답 코드 200~399만 성공으로 보고, 재시도하지 않습니다.
// (같은 요청 안에서 재시도하면 외부 지갑에 이중 반영될 수 있음)
#[derive(Clone)]
pub struct SingleWalletClient {
    http_client: reqwest::Client,
}

/// 외부 지갑으로 보내는 요청 본문
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleWalletRequest<'a> {
    pub agent: &'a str,
    pub user: &'a str,
    pub request_id: &'a str,
    pub amount: i64,
    pub operation_kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_context: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct EchoResponse {
    echo: EchoBody,
}

#[derive(Debug, Deserialize)]
struct EchoBody {
    amount: i64,
}

impl SingleWalletClient {
    // 클라이언트 생성 (요청 전체 타임아웃 포함)
    // Create client with a bounded request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        // 3xx는 따라가지 않고 외부 지갑의 응답 그대로 판단
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http_client })
    }

    /// 외부 지갑에 변경 요청
    /// Ask the external wallet to apply the mutation
    ///
    /// # Returns
    /// 외부 지갑이 돌려준 변경 후 잔고 (최소 단위)
    pub async fn apply(&self, url: &str, mutation: &Mutation) -> Result<i64> {
        let body = SingleWalletRequest {
            agent: &mutation.agent,
            user: &mutation.user,
            request_id: &mutation.request_id,
            amount: mutation.amount,
            operation_kind: mutation.kind.as_str(),
            game_context: mutation.kind.game_id(),
        };

        // 타임아웃도 전송 실패와 같은 외부 지갑 장애로 처리
        let response = self
            .http_client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to single wallet")?;

        // HTTP 상태 코드 확인 (2xx, 3xx 성공)
        let status = response.status();
        if status.as_u16() < 200 || status.as_u16() > 399 {
            let text = response.text().await.unwrap_or_default();
            bail!("Single wallet returned error: {} - {}", status, text);
        }

        let echo: EchoResponse = response
            .json()
            .await
            .context("Failed to parse single wallet response")?;

        tracing::debug!(
            request_id = %mutation.request_id,
            after = echo.echo.amount,
            "single wallet responded"
        );
        Ok(echo.echo.amount)
    }
}
