//! 消息总线与统一信封格式
//!
//! 所有对外发布（指挥中心告警、状态上报）走同一个信封结构：
//! header 带发送者 / 消息 id / UTC 时间戳 / 类型 / 主题，data 为载荷。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::error::AgentError;

/// 发布主题
pub mod topics {
    pub const COMMAND_CENTER_ALERT: &str = "rescue/robot/command_center/alert";
    pub const STATUS_REPORT: &str = "victim/dialogmanager/report";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub sender: String,
    pub msg_id: String,
    pub utc_timestamp: String,
    pub msg_type: String,
    pub msg_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,
    pub data: Value,
}

impl Envelope {
    pub fn new(sender: &str, msg_type: &str, topic: &str, data: Value) -> Self {
        Self {
            header: Header {
                sender: sender.to_string(),
                msg_id: Uuid::new_v4().to_string(),
                utc_timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                msg_type: msg_type.to_string(),
                msg_content: topic.to_string(),
            },
            data,
        }
    }
}

/// 对外发布通道。告警与状态上报都是尽力而为：
/// 发布失败记日志，不中断对话流程。
#[async_trait]
pub trait Bus: Send + Sync {
    async fn publish(&self, topic: &str, envelope: &Envelope) -> Result<(), AgentError>;
}

/// 只记日志的总线，单机运行和演示用
pub struct LogBus;

#[async_trait]
impl Bus for LogBus {
    async fn publish(&self, topic: &str, envelope: &Envelope) -> Result<(), AgentError> {
        tracing::info!(
            topic,
            msg_type = %envelope.header.msg_type,
            data = %envelope.data,
            "bus publish"
        );
        Ok(())
    }
}

/// 写入内存通道的总线，测试和上层集成用
pub struct ChannelBus {
    tx: mpsc::UnboundedSender<(String, Envelope)>,
}

impl ChannelBus {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, Envelope)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Bus for ChannelBus {
    async fn publish(&self, topic: &str, envelope: &Envelope) -> Result<(), AgentError> {
        self.tx
            .send((topic.to_string(), envelope.clone()))
            .map_err(|e| AgentError::Bus(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_header_shape() {
        let envelope = Envelope::new(
            "ugv-1",
            "alert",
            topics::COMMAND_CENTER_ALERT,
            json!({"urgency_level": "critical"}),
        );
        assert_eq!(envelope.header.sender, "ugv-1");
        assert_eq!(envelope.header.msg_content, topics::COMMAND_CENTER_ALERT);
        assert_eq!(envelope.header.utc_timestamp.len(), 20);
        assert!(envelope.header.utc_timestamp.ends_with('Z'));
        assert_eq!(envelope.header.msg_id.len(), 36);
    }

    #[tokio::test]
    async fn test_channel_bus_delivers() {
        let (bus, mut rx) = ChannelBus::new();
        let envelope = Envelope::new("ugv-1", "report", topics::STATUS_REPORT, json!({}));
        bus.publish(topics::STATUS_REPORT, &envelope).await.unwrap();
        let (topic, received) = rx.recv().await.unwrap();
        assert_eq!(topic, topics::STATUS_REPORT);
        assert_eq!(received.header.msg_type, "report");
    }
}
