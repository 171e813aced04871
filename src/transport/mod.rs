//! 派发通道（Transport）
//!
//! 两种可互换的实现共用一个 trait：RemoteTransport（HTTP POST 到编排器 API）与
//! LocalTransport（本地启动编排器进程，失败时执行一次备用命令）。

pub mod local;
pub mod remote;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::mission::Mission;

pub use local::{LocalTransport, ProcessSpec};
pub use remote::RemoteTransport;

/// Transport 成功时的原始结果，由 result::DispatchResult::normalize 统一包装
#[derive(Debug, Clone, PartialEq)]
pub enum TransportOutcome {
    /// 编排器 API 已受理
    Accepted {
        endpoint: String,
        response: serde_json::Value,
    },
    /// 本地进程执行完毕（已 trim 的 stdout）
    Completed { output: String },
}

/// 派发通道：一次调用对应一次（Local 最多两次）执行尝试，无内部重试与超时
#[async_trait]
pub trait Transport: Send + Sync {
    /// 名称（日志用）
    fn name(&self) -> &str;

    /// 派发任务；cancel 触发时中止进行中的请求/进程并返回 Cancelled
    async fn dispatch(
        &self,
        mission: &Mission,
        cancel: &CancellationToken,
    ) -> Result<TransportOutcome, DispatchError>;
}

/// 配置中选择的通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Remote,
    Local,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Remote => write!(f, "remote"),
            TransportKind::Local => write!(f, "local"),
        }
    }
}
