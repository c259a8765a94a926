//! 受困者语音通道抽象
//!
//! speak 把机器人话术送到 TTS，listen 带超时等待 STT 识别结果。
//! 控制器只依赖这个 trait，测试用脚本通道驱动。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

#[async_trait]
pub trait VictimChannel: Send + Sync {
    /// 播报一句话。is_final 标记本次交互的结束语。
    async fn speak(&self, text: &str, is_final: bool);

    /// 等待受困者回应；超时或通道关闭返回 None
    async fn listen(&self, timeout: Duration) -> Option<String>;
}

/// 控制台通道：打印到标准输出，从内存通道取回应。
/// 上层把 STT 结果写入 incoming 端即可。
pub struct PipedVictimChannel {
    incoming: tokio::sync::Mutex<mpsc::Receiver<String>>,
}

impl PipedVictimChannel {
    pub fn new() -> (Self, mpsc::Sender<String>) {
        let (tx, rx) = mpsc::channel(16);
        (
            Self {
                incoming: tokio::sync::Mutex::new(rx),
            },
            tx,
        )
    }
}

#[async_trait]
impl VictimChannel for PipedVictimChannel {
    async fn speak(&self, text: &str, is_final: bool) {
        tracing::info!(is_final, "Robot: {}", text);
    }

    async fn listen(&self, timeout: Duration) -> Option<String> {
        let mut rx = self.incoming.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(text)) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
            Ok(None) => None,
            Err(_) => None,
        }
    }
}

/// 测试用脚本通道：按序弹出预置回应，None 表示沉默一次
pub struct ScriptedVictim {
    replies: Mutex<VecDeque<Option<String>>>,
    spoken: Mutex<Vec<String>>,
}

impl ScriptedVictim {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            spoken: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: &str) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Some(reply.to_string()));
        }
    }

    pub fn push_silence(&self) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(None);
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for ScriptedVictim {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VictimChannel for ScriptedVictim {
    async fn speak(&self, text: &str, _is_final: bool) {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_string());
        }
    }

    async fn listen(&self, _timeout: Duration) -> Option<String> {
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_victim_replays_in_order() {
        let victim = ScriptedVictim::new();
        victim.push("yes I'm hurt");
        victim.push_silence();
        victim.push("my leg");

        let timeout = Duration::from_millis(10);
        assert_eq!(victim.listen(timeout).await.as_deref(), Some("yes I'm hurt"));
        assert_eq!(victim.listen(timeout).await, None);
        assert_eq!(victim.listen(timeout).await.as_deref(), Some("my leg"));
        assert_eq!(victim.listen(timeout).await, None);
    }

    #[tokio::test]
    async fn test_piped_channel_times_out_on_silence() {
        let (channel, _tx) = PipedVictimChannel::new();
        let reply = channel.listen(Duration::from_millis(20)).await;
        assert_eq!(reply, None);
    }

    #[tokio::test]
    async fn test_piped_channel_receives() {
        let (channel, tx) = PipedVictimChannel::new();
        tx.send("  I can hear you  ".to_string()).await.unwrap();
        let reply = channel.listen(Duration::from_millis(50)).await;
        assert_eq!(reply.as_deref(), Some("I can hear you"));
    }
}
