//! 关闭信号处理
//!
//! Ctrl+C / SIGTERM 触发 CancellationToken，进行中的派发随之中止（HTTP 请求被丢弃、子进程被杀掉）。

use tokio_util::sync::CancellationToken;

/// 关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    UserInitiated,
    /// SIGTERM 信号
    Signal,
}

/// 安装系统信号处理器，收到信号时取消 token；返回同一个 token 便于链式使用
pub fn cancel_on_signal(token: CancellationToken) -> CancellationToken {
    let manager = token.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            trigger(&manager, ShutdownReason::UserInitiated);
        }
    });

    #[cfg(unix)]
    {
        let manager = token.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                trigger(&manager, ShutdownReason::Signal);
            }
        });
    }

    token
}

/// 取消 token 并记录原因
pub fn trigger(token: &CancellationToken, reason: ShutdownReason) {
    if !token.is_cancelled() {
        tracing::info!(?reason, "shutdown requested, cancelling in-flight dispatch");
        token.cancel();
    }
}
