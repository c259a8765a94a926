//! Scripted LLM 客户端（用于测试，无需后端）
//!
//! 按脚本顺序弹出回复并计数调用次数；脚本耗尽时返回最后一条或空补全错误。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, SamplingOptions};

/// 脚本化客户端：预置回复队列 + 调用计数
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: AtomicUsize,
    /// 脚本耗尽时重复返回的回复；None 则返回 EmptyCompletion
    fallback: Option<String>,
    /// probe 返回的错误；None 则探测成功
    probe_error: Option<LlmError>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// 队列末尾追加一条成功回复
    pub fn push(&self, reply: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(reply.into()));
    }

    /// 队列末尾追加一条传输错误
    pub fn push_err(&self, err: LlmError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// 让 probe 失败，用于启动校验测试
    pub fn with_probe_error(mut self, err: LlmError) -> Self {
        self.probe_error = Some(err);
        self
    }

    /// 累计 complete 调用次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _prompt: &str, _options: &SamplingOptions) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return reply;
        }
        match &self.fallback {
            Some(text) => Ok(text.clone()),
            None => Err(LlmError::EmptyCompletion),
        }
    }

    async fn probe(&self) -> Result<(), LlmError> {
        match &self.probe_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_order_and_count() {
        let llm = ScriptedLlm::new();
        llm.push("first");
        llm.push_err(LlmError::Timeout);

        let opts = SamplingOptions::default();
        assert_eq!(llm.complete("p", &opts).await.unwrap(), "first");
        assert!(matches!(
            llm.complete("p", &opts).await,
            Err(LlmError::Timeout)
        ));
        assert!(matches!(
            llm.complete("p", &opts).await,
            Err(LlmError::EmptyCompletion)
        ));
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_fallback_reply() {
        let llm = ScriptedLlm::new().with_fallback("again");
        let opts = SamplingOptions::default();
        assert_eq!(llm.complete("p", &opts).await.unwrap(), "again");
        assert_eq!(llm.complete("p", &opts).await.unwrap(), "again");
    }
}
