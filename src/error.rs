//! 派发错误类型
//!
//! Remote 侧：Transport / OrchestratorApi / ResponseDecode；Local 侧：OrchestratorProcess；
//! 两侧共用 Cancelled。错误原样返回给调用方，核心层不吞掉也不格式化成用户消息。

use thiserror::Error;

/// 一次派发可能出现的错误
#[derive(Error, Debug)]
pub enum DispatchError {
    /// 网络层错误（DNS、连接被拒、连接重置等）
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// 编排器返回 HTTP 状态码 >= 400
    #[error("orchestrator api error {status}: {body}")]
    OrchestratorApi { status: u16, body: String },

    /// 成功状态码但响应体不是合法 JSON
    #[error("orchestrator response decode error: {0}")]
    ResponseDecode(#[source] serde_json::Error),

    /// 备用命令也失败（非零退出 / 被信号终止 / 无法启动）
    #[error("orchestrator process failed (exit {exit_code:?}): {stderr}")]
    OrchestratorProcess {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// 外部取消信号触发
    #[error("dispatch cancelled")]
    Cancelled,

    /// 构造 Transport 时的配置错误（空命令、非法 URL）；派发过程不会产生
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl DispatchError {
    /// 稳定的错误种类名，供入口层（Webhook 等）序列化
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Transport(_) => "transport_error",
            DispatchError::OrchestratorApi { .. } => "orchestrator_api_error",
            DispatchError::ResponseDecode(_) => "response_decode_error",
            DispatchError::OrchestratorProcess { .. } => "orchestrator_process_error",
            DispatchError::Cancelled => "cancelled",
            DispatchError::InvalidConfig(_) => "invalid_config",
        }
    }
}
