//! 任务派发器
//!
//! TriggerEvent → Mission → Transport → DispatchResult。派发器本身无状态，
//! 克隆后只共享不可变的 Transport，可在多个任务中并发调用。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::error::DispatchError;
use crate::mission::{Mission, TriggerEvent};
use crate::result::DispatchResult;
use crate::transport::{LocalTransport, RemoteTransport, Transport, TransportKind};

#[derive(Clone)]
pub struct MissionDispatcher {
    transport: Arc<dyn Transport>,
}

impl MissionDispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// 按配置选择 Remote / Local 通道
    pub fn from_config(cfg: &AppConfig) -> Result<Self, DispatchError> {
        let transport: Arc<dyn Transport> = match cfg.dispatch.transport {
            TransportKind::Remote => Arc::new(RemoteTransport::new(cfg.remote.api_url.clone())?),
            TransportKind::Local => Arc::new(LocalTransport::from_argv(
                &cfg.local.primary_command,
                &cfg.local.fallback_command,
                cfg.local.workspace_dir.clone(),
            )?),
        };
        Ok(Self::new(transport))
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// 派发一次任务（不可取消）
    pub async fn run(&self, event: &TriggerEvent) -> Result<DispatchResult, DispatchError> {
        self.run_with_cancel(event, CancellationToken::new()).await
    }

    /// 派发一次任务；cancel 触发时中止请求或杀掉子进程并返回 Cancelled
    pub async fn run_with_cancel(
        &self,
        event: &TriggerEvent,
        cancel: CancellationToken,
    ) -> Result<DispatchResult, DispatchError> {
        let mission = Mission::from_trigger(event);
        let span = tracing::info_span!(
            "dispatch",
            dispatch_id = %uuid::Uuid::new_v4(),
            transport = self.transport.name(),
            channel = %mission.channel(),
        );

        async {
            tracing::info!(objective = %mission.objective, "dispatching mission");
            let outcome = self.transport.dispatch(&mission, &cancel).await?;
            let result = DispatchResult::normalize(&mission, outcome);
            tracing::info!(status = ?result.status, "mission dispatched");
            Ok::<_, DispatchError>(result)
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for MissionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MissionDispatcher")
            .field("transport", &self.transport.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::mission::DEFAULT_OBJECTIVE;
    use crate::result::DispatchStatus;
    use crate::transport::TransportOutcome;

    /// 记录收到的任务并返回固定结果
    struct RecordingTransport {
        seen: Mutex<Vec<Mission>>,
        outcome: TransportOutcome,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn dispatch(
            &self,
            mission: &Mission,
            _cancel: &CancellationToken,
        ) -> Result<TransportOutcome, DispatchError> {
            self.seen.lock().unwrap().push(mission.clone());
            Ok(self.outcome.clone())
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        fn name(&self) -> &str {
            "failing"
        }

        async fn dispatch(
            &self,
            _mission: &Mission,
            _cancel: &CancellationToken,
        ) -> Result<TransportOutcome, DispatchError> {
            Err(DispatchError::OrchestratorApi {
                status: 503,
                body: "busy".to_string(),
            })
        }
    }

    fn recording(outcome: TransportOutcome) -> Arc<RecordingTransport> {
        Arc::new(RecordingTransport {
            seen: Mutex::new(Vec::new()),
            outcome,
        })
    }

    #[tokio::test]
    async fn test_run_builds_mission_and_normalizes() {
        let transport = recording(TransportOutcome::Accepted {
            endpoint: "http://orchestrator:8787/missions".to_string(),
            response: json!({ "id": "m1" }),
        });
        let dispatcher = MissionDispatcher::new(transport.clone());

        let result = dispatcher.run(&TriggerEvent::default()).await.unwrap();

        assert_eq!(result.status, DispatchStatus::Accepted);
        assert_eq!(result.objective, DEFAULT_OBJECTIVE);
        assert_eq!(result.telemetry.trigger_channel, "unknown");
        assert_eq!(result.response, Some(json!({ "id": "m1" })));
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].objective, DEFAULT_OBJECTIVE);
    }

    #[tokio::test]
    async fn test_repeated_runs_are_identical() {
        let transport = recording(TransportOutcome::Completed {
            output: "done".to_string(),
        });
        let dispatcher = MissionDispatcher::new(transport);
        let event = TriggerEvent::new("same", "whatsapp", Some("u1".to_string()));

        let first = dispatcher.run(&event).await.unwrap();
        let second = dispatcher.run(&event).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_transport_error_is_returned_verbatim() {
        let dispatcher = MissionDispatcher::new(Arc::new(FailingTransport));
        let err = dispatcher.run(&TriggerEvent::default()).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::OrchestratorApi { status: 503, ref body } if body == "busy"
        ));
    }

    #[test]
    fn test_from_config_selects_transport() {
        let mut cfg = AppConfig::default();
        assert_eq!(MissionDispatcher::from_config(&cfg).unwrap().transport_name(), "remote");

        cfg.dispatch.transport = TransportKind::Local;
        assert_eq!(MissionDispatcher::from_config(&cfg).unwrap().transport_name(), "local");

        cfg.local.fallback_command.clear();
        assert!(matches!(
            MissionDispatcher::from_config(&cfg),
            Err(DispatchError::InvalidConfig(_))
        ));
    }
}
