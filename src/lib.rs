//! SkyAgentOS 任务派发适配器
//!
//! 把聊天渠道（WhatsApp / Telegram 经技能运行时）的触发事件转成一次 Mission，
//! 交给外部编排器执行：远程 HTTP API，或本地进程（带一次备用命令）。
//!
//! 模块划分：
//! - **config**: 配置加载（TOML + 环境变量）
//! - **mission**: 触发事件与 Mission 归一化
//! - **transport**: 派发通道 trait 与 Remote / Local 实现
//! - **result**: DispatchResult 与结果归一化
//! - **dispatcher**: 对外入口 MissionDispatcher::run
//! - **error**: DispatchError
//! - **skill**: 技能清单
//! - **shutdown**: 信号 → 取消
//! - **observability**: 日志初始化
//! - **integrations**: Webhook / WhatsApp 入口（feature `whatsapp`）

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod integrations;
pub mod mission;
pub mod observability;
pub mod result;
pub mod shutdown;
pub mod skill;
pub mod transport;

pub use dispatcher::MissionDispatcher;
pub use error::DispatchError;
pub use mission::{Mission, TriggerEvent};
pub use result::{DispatchResult, DispatchStatus};
pub use transport::{LocalTransport, RemoteTransport, Transport, TransportKind, TransportOutcome};
