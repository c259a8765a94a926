//! 提示词模板库
//!
//! 从模板目录读取各 Agent 的基础提示词（非英语先找 `<dir>/<lang>/` 子目录）；
//! 文件缺失时退回内置默认并 warn，不会让启动失败。

use std::path::PathBuf;

use crate::messages::{Empathy, Language};

const DEFAULT_ASSESSMENT_PROMPT: &str = "\
You are analyzing a disaster victim's response to a rescue robot's question.
Extract assessment information into these fields only:
- injuries: description of injuries, or \"no\"
- breathing: breathing status
- consciousness: level of consciousness
- can_walk: whether the victim can walk
- stuck_trapped: whether the victim is stuck or trapped
- immediate_danger: environmental danger near the victim
- people_in_surroundings: other people nearby";

const DEFAULT_DIALOGUE_PROMPT: &str = "You are a rescue robot assisting victims.";

const DEFAULT_COMFORT_PROMPT: &str = "\
You are a rescue robot comforting a disaster victim while waiting for responders.
Speak calmly, acknowledge their situation, and keep responses short.";

const DEFAULT_COMFORT_ASSESSMENT_PROMPT: &str = "\
You are analyzing a disaster victim's response for special needs and medical details.
Extract information into these fields only:
- emergency_medication: urgent medication needs
- medical_conditions: chronic or acute conditions
- allergies: known allergies
- regular_medication: regular medication
- age: the victim's age
- elderly: whether the victim is elderly
- mobility_impairment: pre-existing mobility limitations
- pregnant: whether the victim is pregnant
- mental_health_conditions: mental health conditions";

const DEFAULT_TRIAGE_PROMPT: &str = "\
Assign triage priority based on assessment.
Use START categories: Red (immediate), Yellow (delayed), Green (minor), Black (expectant).
Respond with exactly one category word.";

const DEFAULT_ACTION_PROMPT: &str = "\
You are the Action Decision Agent for a rescue robot.

Your role is to analyze the current situation and decide the robot's next action.

Consider all available information:
- Phase 1 Assessment (injuries, breathing, mobility, danger)
- Phase 2 Assessment (medical needs, allergies, special conditions)
- Recent conversation context
- Victim's emotional state

Make informed decisions prioritizing:
1. Immediate life safety (danger, breathing, consciousness)
2. Victim mobility (can they walk? are they trapped?)
3. Information completeness (critical unknowns?)
4. Efficiency (evacuate ambulatory victims quickly)

Your decision will determine whether the robot continues conversation, evacuates
the victim, transitions to the next phase, or aborts to alert command center.";

/// 模板库：目录 + 语言
#[derive(Debug, Clone)]
pub struct PromptStore {
    dir: PathBuf,
    language: Language,
}

impl PromptStore {
    pub fn new(dir: impl Into<PathBuf>, language: Language) -> Self {
        Self {
            dir: dir.into(),
            language,
        }
    }

    /// 先找语言子目录，再找根目录
    fn read(&self, name: &str) -> Option<String> {
        let candidates = [
            self.dir.join(self.language.as_str()).join(name),
            self.dir.join(name),
        ];
        candidates
            .iter()
            .find_map(|p| std::fs::read_to_string(p).ok())
    }

    fn read_or(&self, name: &str, default: &str) -> String {
        match self.read(name) {
            Some(text) => text,
            None => {
                tracing::warn!(template = name, "prompt template not found, using built-in default");
                default.to_string()
            }
        }
    }

    pub fn assessment(&self) -> String {
        self.read_or("assessment_prompt.txt", DEFAULT_ASSESSMENT_PROMPT)
    }

    /// 对话基础提示词 + 共情指令
    pub fn dialogue(&self, empathy: Empathy) -> String {
        let base = self.read_or("dialogue_prompt.txt", DEFAULT_DIALOGUE_PROMPT);
        format!("{}\n\n{}", base, self.empathy_instructions(empathy))
    }

    pub fn comfort(&self) -> String {
        self.read_or("comfort_prompt.txt", DEFAULT_COMFORT_PROMPT)
    }

    pub fn comfort_assessment(&self) -> String {
        self.read_or(
            "comfort_assessment_prompt.txt",
            DEFAULT_COMFORT_ASSESSMENT_PROMPT,
        )
    }

    pub fn triage(&self) -> String {
        self.read_or("triage_prompt.txt", DEFAULT_TRIAGE_PROMPT)
    }

    pub fn action(&self) -> String {
        self.read_or("action_prompt.txt", DEFAULT_ACTION_PROMPT)
    }

    fn empathy_instructions(&self, empathy: Empathy) -> String {
        let name = format!("{}_empathy_instructions.txt", empathy.as_str());
        match self.read(&name) {
            Some(text) => text,
            None => match empathy {
                Empathy::Low => "Keep responses short and direct. Focus on facts only.".to_string(),
                Empathy::High => {
                    "Be compassionate and reassuring. Show empathy and concern.".to_string()
                }
                Empathy::Medium => {
                    "Be professional but caring. Balance efficiency with empathy.".to_string()
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptStore::new(dir.path(), Language::En);
        assert_eq!(store.triage(), DEFAULT_TRIAGE_PROMPT);
        assert!(store.dialogue(Empathy::Low).contains("short and direct"));
    }

    #[test]
    fn test_file_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("triage_prompt.txt"), "custom triage").unwrap();
        let store = PromptStore::new(dir.path(), Language::En);
        assert_eq!(store.triage(), "custom triage");
    }

    #[test]
    fn test_language_subdir_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("fr")).unwrap();
        std::fs::write(dir.path().join("dialogue_prompt.txt"), "english base").unwrap();
        std::fs::write(dir.path().join("fr").join("dialogue_prompt.txt"), "base français").unwrap();
        let store = PromptStore::new(dir.path(), Language::Fr);
        assert!(store.dialogue(Empathy::Medium).starts_with("base français"));
    }
}
