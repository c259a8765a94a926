//! 一阶段对话 Agent：按下一优先字段生成提问
//!
//! 维护自己的对话历史与已问问题集合；回复经过 "Robot:" 前缀清理与
//! 按共情等级的句数截断。清理后为空视为空补全错误。

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::agents::{Exchange, Speaker};
use crate::llm::{LlmClient, LlmError, SamplingOptions};
use crate::messages::MessageCatalog;
use crate::record::AssessmentRecord;

pub struct DialogueAgent {
    llm: Arc<dyn LlmClient>,
    prompt: String,
    catalog: MessageCatalog,
    situation_context: Option<String>,
    history: Vec<Exchange>,
    last_question: String,
    asked_questions: BTreeSet<String>,
}

impl DialogueAgent {
    pub fn new(llm: Arc<dyn LlmClient>, prompt: String, catalog: MessageCatalog) -> Self {
        Self {
            llm,
            prompt,
            catalog,
            situation_context: None,
            history: Vec::new(),
            last_question: String::new(),
            asked_questions: BTreeSet::new(),
        }
    }

    pub fn set_situation_context(&mut self, context: impl Into<String>) {
        self.situation_context = Some(context.into());
    }

    pub fn history(&self) -> &[Exchange] {
        &self.history
    }

    pub fn last_question(&self) -> &str {
        &self.last_question
    }

    /// 开场问候
    pub fn initial_utterance(&mut self) -> String {
        let greeting = self.catalog.greeting().to_string();
        self.push_robot(&greeting);
        greeting
    }

    pub fn add_victim_utterance(&mut self, content: &str) {
        self.history.push(Exchange::victim(content));
    }

    /// 评估未完成时生成下一个提问；完成时返回按行动能力选的结束语
    pub async fn next_utterance(&mut self, record: &AssessmentRecord) -> Result<String, LlmError> {
        if record.is_complete() {
            let message = self
                .catalog
                .completion_message(record.can_victim_walk(), record.is_victim_stuck())
                .to_string();
            self.push_robot(&message);
            return Ok(message);
        }

        let prompt = self.build_prompt(record);
        let raw = self
            .llm
            .complete(&prompt, &SamplingOptions::dialogue())
            .await?;

        let cleaned = constrain_length(&clean_response(&raw), self.catalog.empathy.max_sentences());
        if cleaned.is_empty() {
            return Err(LlmError::EmptyCompletion);
        }

        self.push_robot(&cleaned);
        Ok(cleaned)
    }

    /// 按动作决策选结束语
    pub fn final_message_for_action(&mut self, action_label: &str) -> String {
        let message = self.catalog.final_message_for_action(action_label).to_string();
        self.push_robot(&message);
        message
    }

    pub fn no_response_message(&self) -> String {
        self.catalog.no_response().to_string()
    }

    fn build_prompt(&self, record: &AssessmentRecord) -> String {
        let mut parts = vec![self.prompt.clone()];

        if let Some(context) = &self.situation_context {
            parts.push(format!("\nSITUATION CONTEXT:\n{}", context));
        }

        parts.push("\nCURRENT ASSESSMENT:".to_string());
        let mut any_known = false;
        for (key, value) in record.known_entries() {
            parts.push(format!("- {}: {}", key, value));
            any_known = true;
        }
        if !any_known {
            parts.push("- No information collected yet".to_string());
        }

        parts.push("\nCONVERSATION HISTORY:".to_string());
        if self.history.is_empty() {
            parts.push("(This is the start of the conversation)".to_string());
        } else {
            for entry in &self.history {
                parts.push(format!("{}: {}", entry.speaker.label(), entry.content));
            }
        }

        parts.push("\nINSTRUCTIONS FOR NEXT RESPONSE:".to_string());
        if let Some(next_field) = record.next_priority_field() {
            parts.push(format!("The next priority field to assess is: {}", next_field));
            parts.push(format!("Ask a clear, direct question about {}.", next_field));
            parts.push("Follow the RESPONSE STRUCTURE defined above.".to_string());
        } else {
            parts.push("All assessment fields have been completed.".to_string());
            parts.push("Provide an appropriate final message or summary.".to_string());
        }

        parts.join("\n")
    }

    fn push_robot(&mut self, content: &str) {
        self.history.push(Exchange::robot(content));
        self.last_question = content.to_string();
        // 记录主句避免重复提问
        if content.contains('?') {
            if let Some(before) = content.split('?').next() {
                let main = before
                    .rsplit('.')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_lowercase();
                if main.len() > 5 {
                    self.asked_questions.insert(main);
                }
            }
        }
    }
}

fn clean_response(text: &str) -> String {
    let mut text = text.trim();
    for prefix in ["Robot:", "ROBOT:", "robot:", "Robot "] {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim();
            break;
        }
    }
    text.to_string()
}

/// 按共情等级截断句数
fn constrain_length(text: &str, limit: usize) -> String {
    let sentences: Vec<&str> = text.split(". ").collect();
    if sentences.len() <= limit {
        return text.to_string();
    }
    let mut out = sentences[..limit].join(". ");
    if !out.ends_with('.') {
        out.push('.');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;
    use crate::messages::{Empathy, Language};
    use crate::record::FieldUpdates;

    fn catalog() -> MessageCatalog {
        MessageCatalog::new(Language::En, Empathy::Medium)
    }

    fn agent_with(llm: ScriptedLlm) -> DialogueAgent {
        DialogueAgent::new(Arc::new(llm), "base prompt".to_string(), catalog())
    }

    #[test]
    fn test_clean_response_strips_robot_prefix() {
        assert_eq!(clean_response("Robot: Are you hurt?"), "Are you hurt?");
        assert_eq!(clean_response("  ROBOT: hi"), "hi");
        assert_eq!(clean_response("Are you hurt?"), "Are you hurt?");
    }

    #[test]
    fn test_constrain_length_truncates() {
        let text = "One. Two. Three. Four.";
        assert_eq!(constrain_length(text, 2), "One. Two.");
        assert_eq!(constrain_length("One. Two.", 4), "One. Two.");
    }

    #[tokio::test]
    async fn test_next_question_records_history() {
        let llm = ScriptedLlm::new();
        llm.push("Robot: Can you breathe normally?");
        let mut agent = agent_with(llm);
        agent.initial_utterance();
        agent.add_victim_utterance("My leg hurts");

        let record = AssessmentRecord::new();
        let question = agent.next_utterance(&record).await.unwrap();
        assert_eq!(question, "Can you breathe normally?");
        assert_eq!(agent.last_question(), "Can you breathe normally?");
        assert_eq!(agent.history().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_after_cleaning_is_error() {
        let llm = ScriptedLlm::new();
        llm.push("Robot:   ");
        let mut agent = agent_with(llm);
        let record = AssessmentRecord::new();
        assert!(matches!(
            agent.next_utterance(&record).await,
            Err(LlmError::EmptyCompletion)
        ));
    }

    #[tokio::test]
    async fn test_complete_record_gets_closing_message() {
        let llm = ScriptedLlm::new();
        let mut agent = agent_with(llm);

        let mut record = AssessmentRecord::new();
        let updates: FieldUpdates = [
            ("injuries", "no"),
            ("breathing", "normal"),
            ("immediate_danger", "no"),
            ("stuck_trapped", "no"),
            ("can_walk", "yes"),
            ("people_in_surroundings", "alone"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        record.apply(&updates);

        let message = agent.next_utterance(&record).await.unwrap();
        assert!(message.contains("follow me to safety"));
    }
}
