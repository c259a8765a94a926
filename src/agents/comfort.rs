//! 二阶段安抚 Agent：定向提问表 + LLM 安抚回复
//!
//! 提问是按字段查表的固定话术；安抚回复走 LLM，任何失败落到按痛苦程度
//! 选的兜底话术。记录完成时 next_utterance 返回 None 表示本阶段问完。

use std::sync::Arc;

use crate::agents::Exchange;
use crate::llm::{LlmClient, SamplingOptions};
use crate::messages::MessageCatalog;
use crate::record::{AssessmentRecord, ComfortRecord};

/// 痛苦程度指标（关键词扫描）
#[derive(Debug, Clone, Copy, Default)]
pub struct DistressIndicators {
    pub panic: bool,
    pub anxiety: bool,
}

impl DistressIndicators {
    pub fn high_distress(&self) -> bool {
        self.panic || self.anxiety
    }
}

const PANIC_WORDS: [&str; 7] = [
    "help", "please", "scared", "terrified", "panic", "can't breathe", "dying",
];
const ANXIETY_WORDS: [&str; 6] = [
    "worried", "anxious", "nervous", "afraid", "concerned", "don't know",
];

pub struct ComfortAgent {
    llm: Arc<dyn LlmClient>,
    prompt: String,
    catalog: MessageCatalog,
    history: Vec<Exchange>,
    distress: DistressIndicators,
}

impl ComfortAgent {
    pub fn new(llm: Arc<dyn LlmClient>, prompt: String, catalog: MessageCatalog) -> Self {
        Self {
            llm,
            prompt,
            catalog,
            history: Vec::new(),
            distress: DistressIndicators::default(),
        }
    }

    pub fn distress(&self) -> DistressIndicators {
        self.distress
    }

    /// 二阶段开场
    pub fn initial_utterance(&mut self) -> String {
        let opener = self.catalog.comfort_opener().to_string();
        self.history.push(Exchange::robot(&opener));
        opener
    }

    pub fn add_victim_utterance(&mut self, content: &str) {
        self.analyze_distress(content);
        self.history.push(Exchange::victim(content));
    }

    /// 下一条定向提问；记录完成时返回 None
    pub fn next_utterance(&mut self, record: &ComfortRecord) -> Option<String> {
        if record.is_complete() {
            return None;
        }
        let question = match record.next_priority_field() {
            Some(field) => self.catalog.comfort_question(field).to_string(),
            None => self.catalog.comfort_question("").to_string(),
        };
        self.history.push(Exchange::robot(&question));
        Some(question)
    }

    /// LLM 安抚回复；失败落到兜底话术
    pub async fn comfort_response(
        &mut self,
        victim_utterance: &str,
        assessment: &AssessmentRecord,
        record: &ComfortRecord,
    ) -> String {
        self.analyze_distress(victim_utterance);
        let prompt = self.build_prompt(victim_utterance, assessment, record);

        let options = SamplingOptions {
            temperature: 0.7,
            top_p: 0.9,
            num_predict: 256,
            stop: vec!["Victim:".into(), "\n\n".into()],
        };
        let reply = match self.llm.complete(&prompt, &options).await {
            Ok(text) => {
                let cleaned = text.trim().trim_start_matches("Robot:").trim().to_string();
                if cleaned.is_empty() {
                    self.fallback()
                } else {
                    cleaned
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "comfort response failed, using fallback");
                self.fallback()
            }
        };

        self.history.push(Exchange::robot(&reply));
        reply
    }

    fn fallback(&self) -> String {
        self.catalog
            .comfort_fallback(self.distress.high_distress())
            .to_string()
    }

    fn analyze_distress(&mut self, text: &str) {
        let lower = text.to_lowercase();
        self.distress.panic = PANIC_WORDS.iter().any(|w| lower.contains(w));
        self.distress.anxiety = ANXIETY_WORDS.iter().any(|w| lower.contains(w));
    }

    fn build_prompt(
        &self,
        victim_utterance: &str,
        assessment: &AssessmentRecord,
        record: &ComfortRecord,
    ) -> String {
        let mut parts = vec![self.prompt.clone()];

        parts.push(format!(
            "\nCURRENT VICTIM DISTRESS LEVEL:\n- High Distress: {}\n- Panic: {}\n- Anxiety: {}",
            self.distress.high_distress(),
            self.distress.panic,
            self.distress.anxiety
        ));

        parts.push("\nCURRENT ASSESSMENT (medical status already gathered):".to_string());
        for (key, value) in assessment.known_entries() {
            parts.push(format!("- {}: {}", key, value));
        }

        parts.push("\nSPECIAL NEEDS ALREADY ASSESSED:".to_string());
        for (key, value) in record.known_entries() {
            parts.push(format!("- {}: {}", key, value));
        }

        parts.push("\nNEXT PRIORITY NEED TO ASSESS:".to_string());
        match record.next_priority_field() {
            Some(field) => parts.push(format!("- {}", field)),
            None => parts.push("- All needs assessed".to_string()),
        }

        parts.push("\nRECENT CONVERSATION HISTORY:".to_string());
        let start = self.history.len().saturating_sub(8);
        for entry in &self.history[start..] {
            parts.push(format!("{}: {}", entry.speaker.label(), entry.content));
        }

        parts.push(format!("\nVictim's Latest Response: \"{}\"\n", victim_utterance));
        parts.push(
            "Generate a comforting response that:\n\
             1. Acknowledges their emotional state if distressed\n\
             2. Provides reassurance that help is coming and their status has been reported\n\
             3. Naturally transitions to asking about the next priority special need (if not all assessed)\n\
             4. Uses empathetic, calming language\n\
             5. Keeps the response concise (2-3 sentences maximum)\n\n\
             Your response:"
                .to_string(),
        );

        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, ScriptedLlm};
    use crate::messages::{Empathy, Language};
    use crate::record::FieldUpdates;

    fn agent_with(llm: ScriptedLlm) -> ComfortAgent {
        ComfortAgent::new(
            Arc::new(llm),
            "comfort prompt".to_string(),
            MessageCatalog::new(Language::En, Empathy::Medium),
        )
    }

    #[test]
    fn test_targeted_question_by_priority() {
        let mut agent = agent_with(ScriptedLlm::new());
        let record = ComfortRecord::new();
        let question = agent.next_utterance(&record).unwrap();
        assert!(question.contains("medications right now"));
    }

    #[test]
    fn test_complete_record_yields_none() {
        let mut agent = agent_with(ScriptedLlm::new());
        let mut record = ComfortRecord::new();
        let updates: FieldUpdates = [
            "emergency_medication",
            "medical_conditions",
            "allergies",
            "regular_medication",
        ]
        .iter()
        .map(|f| (f.to_string(), "no".to_string()))
        .collect();
        record.apply(&updates);
        assert!(agent.next_utterance(&record).is_none());
    }

    #[test]
    fn test_distress_detection() {
        let mut agent = agent_with(ScriptedLlm::new());
        agent.add_victim_utterance("I'm so scared, please hurry");
        assert!(agent.distress().panic);
        assert!(agent.distress().high_distress());

        agent.add_victim_utterance("I feel okay now");
        assert!(!agent.distress().high_distress());
    }

    #[tokio::test]
    async fn test_llm_failure_uses_fallback() {
        let llm = ScriptedLlm::new();
        llm.push_err(LlmError::Timeout);
        let mut agent = agent_with(llm);
        let reply = agent
            .comfort_response("I'm terrified", &AssessmentRecord::new(), &ComfortRecord::new())
            .await;
        assert!(reply.contains("difficult time"));
    }
}
