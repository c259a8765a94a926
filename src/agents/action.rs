//! 动作决策 Agent
//!
//! 输入是控制器拼好的决策提示词。解析成功则归一化；传输层存活但输出
//! 解析失败时返回安全默认决策；超时 / 连接 / 状态码错误返回 Err。

use std::sync::Arc;

use crate::decision::ActionDecision;
use crate::llm::{extract_json_object, LlmClient, LlmError, SamplingOptions};

pub struct ActionAgent {
    llm: Arc<dyn LlmClient>,
}

impl ActionAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn decide(&self, prompt: &str) -> Result<ActionDecision, LlmError> {
        let text = match self.llm.complete(prompt, &SamplingOptions::decision()).await {
            Ok(text) => text,
            Err(LlmError::EmptyCompletion) => {
                tracing::warn!("empty decision output, using safe default");
                return Ok(ActionDecision::safe_default());
            }
            Err(e) => return Err(e),
        };

        match extract_json_object(&text) {
            Some(map) if map.contains_key("primary_action") || map.contains_key("action") => {
                Ok(ActionDecision::from_json(&map))
            }
            _ => {
                tracing::warn!(
                    output = %text.chars().take(200).collect::<String>(),
                    "failed to parse decision JSON, using safe default"
                );
                Ok(ActionDecision::safe_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::PrimaryAction;
    use crate::llm::ScriptedLlm;

    #[tokio::test]
    async fn test_parse_fenced_decision() {
        let llm = ScriptedLlm::new();
        llm.push(
            "```json\n{\"primary_action\": \"transition_to_phase_2\", \"next_phase\": 2}\n```",
        );
        let agent = ActionAgent::new(Arc::new(llm));
        let decision = agent.decide("prompt").await.unwrap();
        assert_eq!(decision.primary_action, PrimaryAction::TransitionToPhase2);
        assert_eq!(decision.next_phase, Some(2));
    }

    #[tokio::test]
    async fn test_garbage_output_yields_safe_default() {
        let llm = ScriptedLlm::new();
        llm.push("I think we should keep talking to the victim.");
        let agent = ActionAgent::new(Arc::new(llm));
        let decision = agent.decide("prompt").await.unwrap();
        assert_eq!(decision.primary_action, PrimaryAction::ContinueConversation);
        assert!(decision.reasoning.contains("decision system error"));
    }

    #[tokio::test]
    async fn test_json_without_action_key_yields_safe_default() {
        let llm = ScriptedLlm::new();
        llm.push(r#"{"urgency_level": "critical"}"#);
        let agent = ActionAgent::new(Arc::new(llm));
        let decision = agent.decide("prompt").await.unwrap();
        assert_eq!(decision.primary_action, PrimaryAction::ContinueConversation);
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let llm = ScriptedLlm::new();
        llm.push_err(LlmError::Timeout);
        let agent = ActionAgent::new(Arc::new(llm));
        assert!(agent.decide("prompt").await.is_err());
    }
}
