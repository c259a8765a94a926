//! 优雅关闭处理
//!
//! 统一的关闭信号监听：Ctrl+C / SIGTERM 触发取消 token，
//! 对话与备用树任务通过 token 协作退出。

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// 关闭信号管理器
#[derive(Clone)]
pub struct ShutdownManager {
    shutdown_token: CancellationToken,
    reason_tx: broadcast::Sender<ShutdownReason>,
}

/// 关闭原因
#[derive(Debug, Clone)]
pub enum ShutdownReason {
    /// 用户发起的退出 (Ctrl+C)
    UserInitiated,
    /// SIGTERM 信号
    Signal,
    /// 致命错误
    FatalError(String),
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (reason_tx, _) = broadcast::channel(1);
        Self {
            shutdown_token: CancellationToken::new(),
            reason_tx,
        }
    }

    /// 获取关闭 token（用于取消正在进行的任务）
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// 触发关闭
    pub fn shutdown(&self, reason: ShutdownReason) {
        let _ = self.reason_tx.send(reason);
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// 订阅关闭原因
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.reason_tx.subscribe()
    }

    /// 等待关闭信号
    pub async fn wait_for_shutdown(&self) {
        self.shutdown_token.cancelled().await;
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, initiating graceful shutdown...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 运行主应用直到收到关闭信号
pub async fn run_with_graceful_shutdown<F>(shutdown_manager: Arc<ShutdownManager>, app: F)
where
    F: Future<Output = ()>,
{
    shutdown_manager.install_signal_handlers();

    tokio::select! {
        _ = app => {
            tracing::info!("Application finished normally");
        }
        _ = shutdown_manager.wait_for_shutdown() => {
            tracing::info!("Shutdown signal received");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_manager_new() {
        let manager = ShutdownManager::new();
        assert!(!manager.is_shutdown());
    }

    #[test]
    fn test_shutdown_manager_shutdown() {
        let manager = ShutdownManager::new();
        manager.shutdown(ShutdownReason::UserInitiated);
        assert!(manager.is_shutdown());
    }

    #[test]
    fn test_shutdown_manager_token() {
        let manager = ShutdownManager::new();
        let token = manager.token();
        assert!(!token.is_cancelled());
        manager.shutdown(ShutdownReason::FatalError("llm unreachable".to_string()));
        assert!(token.is_cancelled());
    }
}
