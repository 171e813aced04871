//! 远程通道：POST 任务 JSON 到编排器 API
//!
//! 一次调用 = 一次网络请求，无重试、无内部超时；状态码 < 400 视为受理。

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::mission::Mission;
use crate::transport::{Transport, TransportOutcome};

/// 默认编排器端点
pub const DEFAULT_ENDPOINT: &str = "http://orchestrator:8787/missions";

/// HTTP 通道：持有复用的 reqwest Client 与目标端点
#[derive(Debug, Clone)]
pub struct RemoteTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteTransport {
    /// 端点必须是合法 URL
    pub fn new(endpoint: impl Into<String>) -> Result<Self, DispatchError> {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
    ) -> Result<Self, DispatchError> {
        let endpoint = endpoint.into();
        reqwest::Url::parse(&endpoint).map_err(|e| {
            DispatchError::InvalidConfig(format!("orchestrator api url '{}': {}", endpoint, e))
        })?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, mission: &Mission) -> Result<TransportOutcome, DispatchError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(mission)
            .send()
            .await
            .map_err(DispatchError::Transport)?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(DispatchError::Transport)?;
        tracing::debug!(status, body_len = body.len(), "orchestrator api responded");

        if status >= 400 {
            return Err(DispatchError::OrchestratorApi { status, body });
        }

        let response = if body.is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&body).map_err(DispatchError::ResponseDecode)?
        };

        Ok(TransportOutcome::Accepted {
            endpoint: self.endpoint.clone(),
            response,
        })
    }
}

#[async_trait]
impl Transport for RemoteTransport {
    fn name(&self) -> &str {
        "remote"
    }

    async fn dispatch(
        &self,
        mission: &Mission,
        cancel: &CancellationToken,
    ) -> Result<TransportOutcome, DispatchError> {
        // 取消时丢弃请求 future，连接随之关闭
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DispatchError::Cancelled),
            result = self.post(mission) => result,
        }
    }
}
