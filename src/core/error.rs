//! 领域错误类型
//!
//! LLM 传输错误单独建模（llm::LlmError），此处汇聚到控制器层；
//! 二进制入口用 anyhow 收口。

use thiserror::Error;

use crate::llm::LlmError;

/// 救援对话系统运行期错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Bus publish failed: {0}")]
    Bus(String),

    #[error("Channel closed: {0}")]
    Channel(String),
}
