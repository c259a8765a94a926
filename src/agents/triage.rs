//! 分诊 Agent：START 分类（Red / Yellow / Green / Black）
//!
//! 关键字段全部未知时直接返回 Yellow，不调用 LLM；输出无法对上类别或
//! 传输失败时同样落到 Yellow。分诊永不失败。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::{LlmClient, SamplingOptions};
use crate::record::{is_unknown_value, AssessmentRecord, ComfortRecord};

/// START 分诊类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriagePriority {
    Red,
    Yellow,
    Green,
    Black,
}

impl TriagePriority {
    pub const ALL: [TriagePriority; 4] = [Self::Red, Self::Yellow, Self::Green, Self::Black];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::Yellow => "Yellow",
            Self::Green => "Green",
            Self::Black => "Black",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Red => "IMMEDIATE - Life-threatening injuries requiring immediate intervention",
            Self::Yellow => "DELAYED - Serious injuries but stable, can wait for treatment",
            Self::Green => "MINOR - Minor injuries, can walk and wait",
            Self::Black => "DECEASED/EXPECTANT - Deceased or injuries incompatible with life",
        }
    }
}

/// 信息不足或出错时的安全默认
pub const DEFAULT_PRIORITY: TriagePriority = TriagePriority::Yellow;

pub struct TriageAgent {
    llm: Arc<dyn LlmClient>,
    prompt: String,
}

impl TriageAgent {
    pub fn new(llm: Arc<dyn LlmClient>, prompt: String) -> Self {
        Self { llm, prompt }
    }

    pub async fn assign(
        &self,
        assessment: &AssessmentRecord,
        comfort: Option<&ComfortRecord>,
    ) -> TriagePriority {
        if !is_sufficient(assessment) {
            tracing::warn!("insufficient assessment data for triage, using default priority");
            return DEFAULT_PRIORITY;
        }

        let prompt = self.build_prompt(assessment, comfort);
        match self.llm.complete(&prompt, &SamplingOptions::triage()).await {
            Ok(text) => clean_priority(&text).unwrap_or_else(|| {
                tracing::warn!(output = %text.trim(), "invalid triage output, using default");
                DEFAULT_PRIORITY
            }),
            Err(e) => {
                tracing::warn!(error = %e, "triage request failed, using default priority");
                DEFAULT_PRIORITY
            }
        }
    }

    fn build_prompt(
        &self,
        assessment: &AssessmentRecord,
        comfort: Option<&ComfortRecord>,
    ) -> String {
        let mut parts = vec![self.prompt.clone()];

        parts.push("\nPHASE 1 ASSESSMENT (Safety & Injuries):".to_string());
        for (key, value) in assessment.known_entries() {
            parts.push(format!("- {}: {}", key, value));
        }

        if let Some(comfort) = comfort {
            parts.push("\nPHASE 2 ASSESSMENT (Medical & Special Needs):".to_string());
            for (key, value) in comfort.known_entries() {
                parts.push(format!("- {}: {}", key, value));
            }
        }

        parts.join("\n")
    }
}

/// 四个关键字段至少一个被显式评估过才值得调用 LLM。
/// consciousness 的默认值 "Conscious" 只是假设，不算评估结果。
fn is_sufficient(assessment: &AssessmentRecord) -> bool {
    ["injuries", "breathing", "consciousness", "immediate_danger"]
        .iter()
        .any(|f| {
            assessment.is_assessed(f)
                && assessment
                    .get(f)
                    .map(|v| !is_unknown_value(v))
                    .unwrap_or(false)
        })
}

/// 大小写不敏感的类别子串匹配
fn clean_priority(response: &str) -> Option<TriagePriority> {
    let cleaned = response.replace(['\n', '\r'], " ").to_lowercase();
    TriagePriority::ALL
        .iter()
        .find(|p| cleaned.contains(&p.as_str().to_lowercase()))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;
    use crate::record::FieldUpdates;

    fn assessed(pairs: &[(&str, &str)]) -> AssessmentRecord {
        let mut record = AssessmentRecord::new();
        let updates: FieldUpdates = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        record.apply(&updates);
        record
    }

    #[tokio::test]
    async fn test_short_circuit_makes_no_llm_call() {
        let llm = Arc::new(ScriptedLlm::new().with_fallback("Red"));
        let agent = TriageAgent::new(llm.clone(), "triage".to_string());

        let priority = agent.assign(&AssessmentRecord::new(), None).await;
        assert_eq!(priority, TriagePriority::Yellow);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_output_falls_back_to_yellow() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push("Purple alert!");
        let agent = TriageAgent::new(llm, "triage".to_string());
        let record = assessed(&[("injuries", "yes - bleeding")]);
        assert_eq!(agent.assign(&record, None).await, TriagePriority::Yellow);
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_to_yellow() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push_err(crate::llm::LlmError::Timeout);
        let agent = TriageAgent::new(llm, "triage".to_string());
        let record = assessed(&[("breathing", "labored")]);
        assert_eq!(agent.assign(&record, None).await, TriagePriority::Yellow);
    }

    #[tokio::test]
    async fn test_substring_match_with_explanation() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push("The victim should be classified as GREEN because they can walk.");
        let agent = TriageAgent::new(llm, "triage".to_string());
        let record = assessed(&[("injuries", "no")]);
        assert_eq!(agent.assign(&record, None).await, TriagePriority::Green);
    }
}
