//! WhatsApp Cloud API 集成
//!
//! 通过 Webhook 接收消息，每条文本消息转成一次派发（channel = "whatsapp"，user.id = 发送者），
//! 后台执行并在配置了凭据时把结果回复给发送者。

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::integrations::webhook::WebhookState;
use crate::mission::TriggerEvent;
use crate::result::{DispatchResult, DispatchStatus};

/// 本渠道在 TriggerEvent 中的名称
pub const CHANNEL: &str = "whatsapp";

/// WhatsApp 单条消息长度上限为 4096 字符，留出余量
const MAX_MESSAGE_CHARS: usize = 4000;

/// Webhook 验证参数
#[derive(Debug, Deserialize)]
pub struct WebhookVerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// WhatsApp Webhook 请求体（只保留用到的字段）
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: Option<String>,
    pub entry: Option<Vec<WebhookEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    pub changes: Option<Vec<WebhookChange>>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    pub value: Option<WebhookValue>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookValue {
    pub messages: Option<Vec<WebhookMessage>>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    pub from: String,
    #[serde(rename = "type")]
    pub msg_type: Option<String>,
    pub text: Option<WebhookText>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookText {
    pub body: String,
}

/// WhatsApp 发送消息 API 请求体
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    messaging_product: &'a str,
    to: String,
    #[serde(rename = "type")]
    msg_type: &'a str,
    text: SendMessageText,
}

#[derive(Debug, Serialize)]
struct SendMessageText {
    body: String,
}

/// 回复所需的凭据与 HTTP Client
#[derive(Debug, Clone)]
pub struct WhatsappReply {
    client: reqwest::Client,
    access_token: String,
    phone_number_id: String,
}

impl WhatsappReply {
    pub fn new(access_token: impl Into<String>, phone_number_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.into(),
            phone_number_id: phone_number_id.into(),
        }
    }

    /// WHATSAPP_ACCESS_TOKEN 与 WHATSAPP_PHONE_NUMBER_ID 都设置时启用回复
    pub fn from_env() -> Option<Self> {
        let access_token = std::env::var("WHATSAPP_ACCESS_TOKEN").ok()?;
        let phone_number_id = std::env::var("WHATSAPP_PHONE_NUMBER_ID").ok()?;
        Some(Self::new(access_token, phone_number_id))
    }

    /// 通过 WhatsApp Cloud API 发送消息，超长按字符分段
    pub async fn send(&self, to: &str, body: &str) -> anyhow::Result<()> {
        let url = format!(
            "https://graph.facebook.com/v18.0/{}/messages",
            self.phone_number_id
        );

        for chunk in split_message(body, MAX_MESSAGE_CHARS) {
            let req = SendMessageRequest {
                messaging_product: "whatsapp",
                to: to.replace('+', ""),
                msg_type: "text",
                text: SendMessageText { body: chunk },
            };

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.access_token)
                .json(&req)
                .send()
                .await?;

            if !resp.status().is_success() {
                let text = resp.text().await?;
                anyhow::bail!("WhatsApp API error: {}", text);
            }
        }

        Ok(())
    }
}

/// 从 Webhook 请求体中取出文本消息，转成 (发送者, 触发事件)
pub fn trigger_events(payload: WebhookPayload) -> Vec<(String, TriggerEvent)> {
    if payload.object.as_deref() != Some("whatsapp_business_account") {
        return Vec::new();
    }

    payload
        .entry
        .into_iter()
        .flatten()
        .flat_map(|entry| entry.changes.into_iter().flatten())
        .filter_map(|change| change.value)
        .flat_map(|value| value.messages.into_iter().flatten())
        .filter(|msg| msg.msg_type.as_deref() == Some("text"))
        .filter_map(|msg| {
            let text = msg.text?;
            let event = TriggerEvent::new(text.body, CHANNEL, Some(msg.from.clone()));
            Some((msg.from, event))
        })
        .collect()
}

/// 派发结果转成给用户看的回复文本
pub fn reply_text(result: &Result<DispatchResult, DispatchError>) -> String {
    match result {
        Ok(r) => match r.status {
            DispatchStatus::Accepted => format!("Mission accepted: {}", r.objective),
            DispatchStatus::Ok => match r.output.as_deref() {
                Some(output) if !output.is_empty() => output.to_string(),
                _ => format!("Mission finished: {}", r.objective),
            },
        },
        Err(e) => format!("Mission failed: {}", e),
    }
}

fn split_message(body: &str, max_len: usize) -> Vec<String> {
    if body.chars().count() <= max_len {
        return vec![body.to_string()];
    }
    body.chars()
        .collect::<Vec<_>>()
        .chunks(max_len)
        .map(|c| c.iter().collect())
        .collect()
}

/// GET /webhook - Meta 验证 Webhook
pub async fn webhook_verify(
    State(state): State<Arc<WebhookState>>,
    Query(query): Query<WebhookVerifyQuery>,
) -> Result<String, StatusCode> {
    if query.mode.as_deref() == Some("subscribe")
        && query.verify_token.as_deref() == Some(state.verify_token.as_str())
    {
        Ok(query.challenge.unwrap_or_default())
    } else {
        Err(StatusCode::FORBIDDEN)
    }
}

/// POST /webhook - 接收 WhatsApp 消息；立即返回 200，派发在后台进行
pub async fn webhook_receive(
    State(state): State<Arc<WebhookState>>,
    Json(payload): Json<WebhookPayload>,
) -> StatusCode {
    for (sender, event) in trigger_events(payload) {
        let task_state = Arc::clone(&state);
        state.tasks.spawn(async move {
            let state = task_state;
            let result = state
                .dispatcher
                .run_with_cancel(&event, state.shutdown.child_token())
                .await;
            if let Err(e) = &result {
                tracing::error!(kind = e.kind(), error = %e, "whatsapp mission dispatch failed");
            }

            let Some(reply) = &state.whatsapp else { return };
            if let Err(e) = reply.send(&sender, &reply_text(&result)).await {
                tracing::error!("Failed to send WhatsApp message: {}", e);
            }
        });
    }

    StatusCode::OK
}
