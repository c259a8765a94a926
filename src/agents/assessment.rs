//! 一阶段提取 Agent：从每轮问答中提取评估字段
//!
//! 传输失败（超时 / 连接）返回 Err 触发备用接管；LLM 活着但输出无法解析
//! 或返回非 200 时按「无更新」处理，对话继续。

use std::sync::Arc;

use crate::llm::{extract_json_object, LlmClient, LlmError, SamplingOptions};
use crate::record::{assessment::ASSESSMENT_FIELDS, validate_updates, AssessmentRecord, FieldUpdates};

pub struct AssessmentAgent {
    llm: Arc<dyn LlmClient>,
    prompt: String,
    record: AssessmentRecord,
}

impl AssessmentAgent {
    pub fn new(llm: Arc<dyn LlmClient>, prompt: String) -> Self {
        Self {
            llm,
            prompt,
            record: AssessmentRecord::new(),
        }
    }

    pub fn with_record(llm: Arc<dyn LlmClient>, prompt: String, record: AssessmentRecord) -> Self {
        Self { llm, prompt, record }
    }

    pub fn record(&self) -> &AssessmentRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut AssessmentRecord {
        &mut self.record
    }

    /// 分析最近一轮问答，返回校验后的更新
    pub async fn analyze(
        &self,
        robot_question: &str,
        victim_response: &str,
    ) -> Result<FieldUpdates, LlmError> {
        let prompt = self.build_prompt(robot_question, victim_response);
        let text = match self
            .llm
            .complete(&prompt, &SamplingOptions::extraction())
            .await
        {
            Ok(text) => text,
            Err(e @ (LlmError::Timeout | LlmError::Connect(_))) => return Err(e),
            Err(LlmError::Status(code)) => {
                tracing::warn!(status = code, "assessment extraction got non-success status");
                return Ok(FieldUpdates::new());
            }
            Err(LlmError::EmptyCompletion) => return Ok(FieldUpdates::new()),
        };

        let Some(raw) = extract_json_object(&text) else {
            tracing::warn!("no valid JSON in assessment extraction output");
            return Ok(FieldUpdates::new());
        };

        let record = &self.record;
        Ok(validate_updates(&raw, &ASSESSMENT_FIELDS, |field| {
            record.get(field).map(str::to_string)
        }))
    }

    /// 合并更新，返回实际写入的字段
    pub fn merge(&mut self, updates: &FieldUpdates) -> Vec<String> {
        let applied = self.record.apply(updates);
        for field in &applied {
            tracing::info!(field = %field, value = ?self.record.get(field), "assessment update");
        }
        applied
    }

    fn build_prompt(&self, robot_question: &str, victim_response: &str) -> String {
        format!(
            "{}\n\nRobot Question: \"{}\"\nVictim Response: \"{}\"\n\n\
             Extract assessment information from the victim's response above.\n\
             Return ONLY a JSON object with the fields you can extract.\n\
             CRITICAL: Do NOT include any field if the value is empty string (\"\") or \"unknown\".\n\
             If no information can be extracted, return: {{}}\n",
            self.prompt, robot_question, victim_response
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;

    fn agent_with(llm: ScriptedLlm) -> AssessmentAgent {
        AssessmentAgent::new(Arc::new(llm), "extract fields".to_string())
    }

    #[tokio::test]
    async fn test_extraction_filters_and_merges() {
        let llm = ScriptedLlm::new();
        llm.push(r#"```json
{"injuries": "yes - broken arm", "breathing": "unknown", "mood": "scared"}
```"#);
        let mut agent = agent_with(llm);

        let updates = agent
            .analyze("Are you injured?", "My arm is broken")
            .await
            .unwrap();
        assert_eq!(updates.len(), 1);

        agent.merge(&updates);
        assert_eq!(agent.record().get("injuries"), Some("yes - broken arm"));
        assert!(!agent.record().is_assessed("breathing"));
    }

    #[tokio::test]
    async fn test_unparseable_output_is_empty_not_failure() {
        let llm = ScriptedLlm::new();
        llm.push("I could not find any fields to extract.");
        let agent = agent_with(llm);
        let updates = agent.analyze("q", "r").await.unwrap();
        assert!(updates.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let llm = ScriptedLlm::new();
        llm.push_err(LlmError::Timeout);
        let agent = agent_with(llm);
        assert!(matches!(agent.analyze("q", "r").await, Err(LlmError::Timeout)));
    }

    #[tokio::test]
    async fn test_http_error_is_empty_updates() {
        let llm = ScriptedLlm::new();
        llm.push_err(LlmError::Status(500));
        let agent = agent_with(llm);
        assert!(agent.analyze("q", "r").await.unwrap().is_empty());
    }
}
