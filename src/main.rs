//! skyagent-dispatch：派发一次任务
//!
//! 用法：
//! - `skyagent-dispatch '<TriggerEvent JSON>'`
//! - `echo '<TriggerEvent JSON>' | skyagent-dispatch`（无输入时按空事件处理）
//! - `skyagent-dispatch --manifest` 输出技能清单
//!
//! 结果以 JSON 写到 stdout，日志写到 stderr；Ctrl+C / SIGTERM 取消进行中的派发。

use std::io::Read;

use anyhow::Context;
use skyagent_dispatch::config::load_config;
use skyagent_dispatch::{observability, shutdown, skill, MissionDispatcher, TriggerEvent};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let arg = std::env::args().nth(1);
    if arg.as_deref() == Some("--manifest") {
        println!("{}", serde_json::to_string_pretty(&skill::MANIFEST)?);
        return Ok(());
    }

    let raw = match arg {
        Some(raw) => raw,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read trigger event from stdin")?;
            buf
        }
    };
    let event: TriggerEvent = if raw.trim().is_empty() {
        TriggerEvent::default()
    } else {
        serde_json::from_str(&raw).context("Trigger event is not valid JSON")?
    };

    let cfg = load_config(None).context("Failed to load config")?;
    let dispatcher = MissionDispatcher::from_config(&cfg).context("Failed to build dispatcher")?;
    tracing::info!(transport = dispatcher.transport_name(), "dispatcher ready");

    let cancel = shutdown::cancel_on_signal(CancellationToken::new());
    let result = dispatcher
        .run_with_cancel(&event, cancel)
        .await
        .context("Mission dispatch failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
