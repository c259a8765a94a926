//! 六个对话 Agent：提取、对话、安抚、动作决策与分诊

pub mod action;
pub mod assessment;
pub mod comfort;
pub mod comfort_assessment;
pub mod dialogue;
pub mod triage;

use serde::{Deserialize, Serialize};

pub use action::ActionAgent;
pub use assessment::AssessmentAgent;
pub use comfort::ComfortAgent;
pub use comfort_assessment::ComfortAssessmentAgent;
pub use dialogue::DialogueAgent;
pub use triage::{TriageAgent, TriagePriority};

/// 对话双方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Robot,
    Victim,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Robot => "Robot",
            Self::Victim => "Victim",
        }
    }
}

/// 一条对话记录（Agent 内部上下文用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub speaker: Speaker,
    pub content: String,
}

impl Exchange {
    pub fn robot(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Robot,
            content: content.into(),
        }
    }

    pub fn victim(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Victim,
            content: content.into(),
        }
    }
}
