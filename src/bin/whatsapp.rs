//! SkyAgentOS WhatsApp / Webhook 服务
//!
//! 接收 WhatsApp Cloud API Webhook 或直接 POST /trigger，把消息派发给编排器。
//!
//! 环境变量:
//! - ORCHESTRATOR_API_URL: 编排器 API 地址（remote 通道）
//! - SKYAGENT__DISPATCH__TRANSPORT: remote / local
//! - WHATSAPP_VERIFY_TOKEN: Webhook 验证令牌 (默认 "skyagent")
//! - WHATSAPP_ACCESS_TOKEN / WHATSAPP_PHONE_NUMBER_ID: 设置后把结果回复给发送者
//! - SKYAGENT_LISTEN_ADDR: 监听地址 (默认 0.0.0.0:3000)
//!
//! 启动: cargo run --bin skyagent-whatsapp --features whatsapp

#[cfg(feature = "whatsapp")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::sync::Arc;

    use anyhow::Context;
    use skyagent_dispatch::config::load_config;
    use skyagent_dispatch::integrations::webhook::{create_router, WebhookState};
    use skyagent_dispatch::integrations::whatsapp::WhatsappReply;
    use skyagent_dispatch::{observability, shutdown, MissionDispatcher};
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let dispatcher = MissionDispatcher::from_config(&cfg).context("Failed to build dispatcher")?;

    let whatsapp = WhatsappReply::from_env();
    if whatsapp.is_none() {
        tracing::warn!("WHATSAPP_ACCESS_TOKEN / WHATSAPP_PHONE_NUMBER_ID not set, replies disabled");
    }

    let shutdown_token = shutdown::cancel_on_signal(CancellationToken::new());
    let tasks = TaskTracker::new();
    let state = Arc::new(WebhookState {
        dispatcher,
        verify_token: std::env::var("WHATSAPP_VERIFY_TOKEN")
            .unwrap_or_else(|_| "skyagent".to_string()),
        whatsapp,
        shutdown: shutdown_token.clone(),
        tasks: tasks.clone(),
    });

    let app = create_router(state);

    let addr = std::env::var("SKYAGENT_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("SkyAgentOS dispatch server listening on http://{}", addr);
    tracing::info!("Webhook URL: http://YOUR_HOST:{}/webhook", listener.local_addr()?.port());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await?;

    // 关闭信号已取消进行中的派发，这里等它们收尾（子进程回收、回复发送）
    tasks.close();
    if !tasks.is_empty() {
        tracing::info!(pending = tasks.len(), "waiting for background dispatches");
    }
    tasks.wait().await;

    Ok(())
}

#[cfg(not(feature = "whatsapp"))]
fn main() {
    eprintln!("请使用 --features whatsapp 编译: cargo run --bin skyagent-whatsapp --features whatsapp");
    std::process::exit(1);
}
