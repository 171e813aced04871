//! HTTP 入口
//!
//! - GET  /health  → OK
//! - POST /trigger → 请求体为 TriggerEvent，返回 DispatchResult 或错误 JSON
//! - GET/POST /webhook → WhatsApp Cloud API（见 whatsapp 模块）

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::dispatcher::MissionDispatcher;
use crate::error::DispatchError;
use crate::integrations::whatsapp::{self, WhatsappReply};
use crate::mission::TriggerEvent;
use crate::result::DispatchResult;

/// 服务状态：派发器与 WhatsApp 配置，多请求共享
pub struct WebhookState {
    pub dispatcher: MissionDispatcher,
    /// Webhook 验证令牌
    pub verify_token: String,
    /// 配置了 WhatsApp 凭据时回复发送者
    pub whatsapp: Option<WhatsappReply>,
    /// 服务关闭时取消所有进行中的派发
    pub shutdown: CancellationToken,
    /// 后台派发任务；关闭时由服务方 close + wait
    pub tasks: TaskTracker,
}

/// 创建路由
pub fn create_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/trigger", post(trigger))
        .route(
            "/webhook",
            get(whatsapp::webhook_verify).post(whatsapp::webhook_receive),
        )
        .with_state(state)
}

/// 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

pub struct DispatchFailure(pub DispatchError);

impl IntoResponse for DispatchFailure {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DispatchError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        let body = ErrorBody {
            error: self.0.kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// POST /trigger
///
/// 客户端断开时 handler future 被丢弃，子进程随 kill_on_drop 一并结束。
async fn trigger(
    State(state): State<Arc<WebhookState>>,
    Json(event): Json<TriggerEvent>,
) -> Result<Json<DispatchResult>, DispatchFailure> {
    state
        .dispatcher
        .run_with_cancel(&event, state.shutdown.child_token())
        .await
        .map(Json)
        .map_err(DispatchFailure)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::mission::Mission;
    use crate::transport::{Transport, TransportOutcome};

    struct StubTransport(Result<TransportOutcome, fn() -> DispatchError>);

    #[async_trait]
    impl Transport for StubTransport {
        fn name(&self) -> &str {
            "stub"
        }

        async fn dispatch(
            &self,
            _mission: &Mission,
            _cancel: &CancellationToken,
        ) -> Result<TransportOutcome, DispatchError> {
            match &self.0 {
                Ok(outcome) => Ok(outcome.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn router(transport: StubTransport) -> Router {
        create_router(Arc::new(WebhookState {
            dispatcher: MissionDispatcher::new(Arc::new(transport)),
            verify_token: "secret".to_string(),
            whatsapp: None,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }))
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(StubTransport(Ok(TransportOutcome::Completed {
            output: String::new(),
        })));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_trigger_returns_dispatch_result() {
        let app = router(StubTransport(Ok(TransportOutcome::Completed {
            output: "done".to_string(),
        })));
        let (status, body) = post_json(
            app,
            "/trigger",
            json!({ "message": { "text": "ship it" }, "channel": "telegram" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["objective"], "ship it");
        assert_eq!(body["output"], "done");
        assert_eq!(body["telemetry"]["trigger_channel"], "telegram");
    }

    #[tokio::test]
    async fn test_trigger_maps_orchestrator_failure_to_bad_gateway() {
        let app = router(StubTransport(Err(|| DispatchError::OrchestratorApi {
            status: 500,
            body: "boom".to_string(),
        })));
        let (status, body) = post_json(app, "/trigger", json!({})).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "orchestrator_api_error");
        assert_eq!(body["message"], "orchestrator api error 500: boom");
    }

    #[tokio::test]
    async fn test_trigger_maps_cancel_to_unavailable() {
        let app = router(StubTransport(Err(|| DispatchError::Cancelled)));
        let (status, body) = post_json(app, "/trigger", json!({})).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "cancelled");
    }
}
