//! 二阶段提取 Agent：用药、过敏与特殊状况
//!
//! 提示词里嵌入当前记录快照，让 LLM 只报增量。错误语义与一阶段提取一致。

use std::sync::Arc;

use crate::llm::{extract_json_object, LlmClient, LlmError, SamplingOptions};
use crate::record::{comfort::COMFORT_PRIORITY, validate_updates, ComfortRecord, FieldUpdates};

pub struct ComfortAssessmentAgent {
    llm: Arc<dyn LlmClient>,
    prompt: String,
    record: ComfortRecord,
}

impl ComfortAssessmentAgent {
    pub fn new(llm: Arc<dyn LlmClient>, prompt: String) -> Self {
        Self {
            llm,
            prompt,
            record: ComfortRecord::new(),
        }
    }

    pub fn record(&self) -> &ComfortRecord {
        &self.record
    }

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
                tracing::warn!(status = code, "comfort extraction got non-success status");
                return Ok(FieldUpdates::new());
            }
            Err(LlmError::EmptyCompletion) => return Ok(FieldUpdates::new()),
        };

        let Some(raw) = extract_json_object(&text) else {
            return Ok(FieldUpdates::new());
        };

        let record = &self.record;
        Ok(validate_updates(&raw, &COMFORT_PRIORITY, |field| {
            record.get(field).map(str::to_string)
        }))
    }

    pub fn merge(&mut self, updates: &FieldUpdates) -> Vec<String> {
        let applied = self.record.apply(updates);
        for field in &applied {
            tracing::info!(field = %field, value = ?self.record.get(field), "comfort update");
        }
        applied
    }

    fn build_prompt(&self, robot_question: &str, victim_response: &str) -> String {
        let snapshot = serde_json::to_string_pretty(&self.record.snapshot())
            .unwrap_or_else(|_| "{}".to_string());
        format!(
            "{}\n\nCONTEXT:\nRobot asked: \"{}\"\nVictim responded: \"{}\"\n\n\
             TASK:\n\
             Analyze the victim's response and extract any special medical needs or conditions mentioned.\n\
             Look for:\n\
             1. Emergency medications (insulin, EpiPen, inhaler, etc.)\n\
             2. Regular medications they take\n\
             3. Allergies (especially drug allergies like penicillin)\n\
             4. Medical conditions (diabetes, heart condition, asthma, etc.)\n\
             5. Age or elderly status\n\
             6. Pregnancy status\n\
             7. Mobility impairments (wheelchair, cane, walker, etc.)\n\
             8. Mental health conditions\n\n\
             CURRENT ASSESSMENT STATE:\n{}\n\n\
             OUTPUT FORMAT:\n\
             Return ONLY a valid JSON object with the fields that have NEW or UPDATED information.\n\
             Only include fields where you found specific information in the victim's response.\n\
             Use \"yes\" or \"no\" for boolean fields, and detailed descriptions for others.\n\n\
             If NO new information is found, return an empty JSON object: {{}}\n\n\
             JSON OUTPUT:",
            self.prompt, robot_question, victim_response, snapshot
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;

    #[tokio::test]
    async fn test_extract_and_merge() {
        let llm = ScriptedLlm::new();
        llm.push(r#"{"emergency_medication": "insulin for diabetes", "medical_conditions": "diabetes", "age": "67 years old"}"#);
        let mut agent = ComfortAssessmentAgent::new(Arc::new(llm), "needs".to_string());

        let updates = agent
            .analyze("Do you need medication?", "I need my insulin, I'm diabetic, 67")
            .await
            .unwrap();
        assert_eq!(updates.len(), 3);
        agent.merge(&updates);
        assert_eq!(
            agent.record().get("emergency_medication"),
            Some("insulin for diabetes")
        );
        assert!(agent.record().needs_emergency_medication());
    }

    #[tokio::test]
    async fn test_connect_error_is_failure() {
        let llm = ScriptedLlm::new();
        llm.push_err(LlmError::Connect("refused".to_string()));
        let agent = ComfortAssessmentAgent::new(Arc::new(llm), "needs".to_string());
        assert!(agent.analyze("q", "r").await.is_err());
    }
}
