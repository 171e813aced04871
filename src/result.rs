//! 派发结果归一化
//!
//! 无论走哪个通道，返回给技能运行时的都是同一种 DispatchResult，并总是附带 telemetry。

use serde::Serialize;
use serde_json::Value;

use crate::mission::Mission;
use crate::transport::TransportOutcome;

/// 遥测字段中的迁移版本标记
pub const OTEL_MIGRATION: &str = "v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    /// 编排器 API 已受理（Remote）
    Accepted,
    /// 本地进程执行成功（Local）
    Ok,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Telemetry {
    pub otel_migration: String,
    pub trigger_channel: String,
}

/// 返回给调用方的派发结果；构造后不再修改
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchResult {
    pub status: DispatchStatus,
    pub objective: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub telemetry: Telemetry,
}

impl DispatchResult {
    /// 将通道原始结果包装为统一形状
    pub fn normalize(mission: &Mission, outcome: TransportOutcome) -> Self {
        let telemetry = Telemetry {
            otel_migration: OTEL_MIGRATION.to_string(),
            trigger_channel: mission.channel().to_string(),
        };
        let objective = mission.objective.clone();

        match outcome {
            TransportOutcome::Accepted { endpoint, response } => Self {
                status: DispatchStatus::Accepted,
                objective,
                endpoint: Some(endpoint),
                response: Some(response),
                output: None,
                telemetry,
            },
            TransportOutcome::Completed { output } => Self {
                status: DispatchStatus::Ok,
                objective,
                endpoint: None,
                response: None,
                output: Some(output),
                telemetry,
            },
        }
    }
}
