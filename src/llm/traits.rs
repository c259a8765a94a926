//! LLM 客户端抽象
//!
//! 所有后端（Ollama / Scripted Mock）实现 LlmClient：complete 带采样参数的非流式补全。
//! 传输失败（超时 / 连接 / 状态码）与「正常返回但内容无用」严格区分：
//! 前者是 Err(LlmError)，后者由调用方按 Ok 分支自行处理。

use async_trait::async_trait;
use thiserror::Error;

/// LLM 传输层错误。只有这些变体会触发上层的备用交互接管。
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM connection failed: {0}")]
    Connect(String),

    #[error("LLM returned HTTP status {0}")]
    Status(u16),

    #[error("LLM returned an empty completion")]
    EmptyCompletion,
}

/// 单次补全的采样参数（对应 Ollama options）
#[derive(Debug, Clone)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p: f32,
    /// 最大生成 token 数
    pub num_predict: u32,
    /// 停止序列
    pub stop: Vec<String>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            num_predict: 512,
            stop: Vec::new(),
        }
    }
}

impl SamplingOptions {
    /// 信息提取：低温、长输出
    pub fn extraction() -> Self {
        Self::default()
    }

    /// 对话生成：较高温度、短输出、机器人台词停止序列
    pub fn dialogue() -> Self {
        Self {
            temperature: 0.4,
            top_p: 0.9,
            num_predict: 256,
            stop: vec!["Victim:".into(), "\n\n".into(), "Robot:".into()],
        }
    }

    /// 动作决策：低温、JSON 输出
    pub fn decision() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            num_predict: 200,
            stop: Vec::new(),
        }
    }

    /// 分诊：单个类别词
    pub fn triage() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            num_predict: 64,
            stop: Vec::new(),
        }
    }
}

/// LLM 客户端 trait：文本补全
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, options: &SamplingOptions) -> Result<String, LlmError>;

    /// 启动自检：后端是否可达。默认可达（Mock 等内存实现）。
    async fn probe(&self) -> Result<(), LlmError> {
        Ok(())
    }
}
