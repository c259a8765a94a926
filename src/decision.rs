//! 动作决策类型：主动作、紧急度与命令中心告警
//!
//! 每轮对话后由 ActionAgent 产出一条 ActionDecision；缺省字段在归一化时
//! 补齐，未识别的主动作原样透传并按 continue 处理。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 主动作。未识别的值保留在 Other 中透传。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryAction {
    ContinueConversation,
    TransitionToPhase2,
    EvacuateImmediately,
    AbortAndAlert,
    Complete,
    MaintainAndMonitor,
    #[serde(untagged)]
    Other(String),
}

impl PrimaryAction {
    fn from_raw(raw: &str) -> Self {
        match raw {
            "continue_conversation" => Self::ContinueConversation,
            "transition_to_phase_2" => Self::TransitionToPhase2,
            "evacuate_immediately" => Self::EvacuateImmediately,
            "abort_and_alert" => Self::AbortAndAlert,
            "complete" => Self::Complete,
            "maintain_and_monitor" => Self::MaintainAndMonitor,
            other => Self::Other(other.to_string()),
        }
    }

    /// 面向救援人员的动作描述
    pub fn label(&self) -> String {
        match self {
            Self::ContinueConversation => "Continue gathering information".to_string(),
            Self::TransitionToPhase2 => {
                "Transition to Phase 2 (Comfort & Special Needs)".to_string()
            }
            Self::EvacuateImmediately => "Guide victim to evacuation immediately".to_string(),
            Self::AbortAndAlert => {
                "Abort and alert command center for specialized rescue".to_string()
            }
            Self::Complete => "Assessment complete - await further instructions".to_string(),
            Self::MaintainAndMonitor => "Maintain position and monitor victim".to_string(),
            Self::Other(raw) => raw.clone(),
        }
    }
}

/// 紧急程度。未识别的值按 Routine 处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Routine,
    Priority,
    Critical,
    Emergency,
}

impl UrgencyLevel {
    fn from_raw(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "priority" => Self::Priority,
            "critical" => Self::Critical,
            "emergency" => Self::Emergency,
            _ => Self::Routine,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Routine => "routine",
            Self::Priority => "priority",
            Self::Critical => "critical",
            Self::Emergency => "emergency",
        }
    }
}

/// 一条动作决策
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDecision {
    pub primary_action: PrimaryAction,
    pub alert_command_center: bool,
    pub urgency_level: UrgencyLevel,
    pub reasoning: String,
    pub next_phase: Option<u8>,
    pub specialized_equipment: Vec<String>,
    /// 人类可读的动作描述（由 primary_action 派生）
    pub action_label: String,
}

impl ActionDecision {
    /// 从 LLM 返回的 JSON 对象归一化；缺省字段补默认值
    pub fn from_json(map: &Map<String, Value>) -> Self {
        let raw_action = map
            .get("primary_action")
            .or_else(|| map.get("action"))
            .and_then(Value::as_str)
            .unwrap_or("continue_conversation");
        let primary_action = PrimaryAction::from_raw(raw_action);

        let urgency_level = map
            .get("urgency_level")
            .and_then(Value::as_str)
            .map(UrgencyLevel::from_raw)
            .unwrap_or(UrgencyLevel::Routine);

        let specialized_equipment = map
            .get("specialized_equipment_needed")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let action_label = primary_action.label();
        Self {
            primary_action,
            alert_command_center: map
                .get("alert_command_center")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            urgency_level,
            reasoning: map
                .get("reasoning")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            next_phase: map
                .get("next_phase")
                .and_then(Value::as_u64)
                .map(|n| n as u8),
            specialized_equipment,
            action_label,
        }
    }

    /// 决策系统故障但传输层存活时的安全默认
    pub fn safe_default() -> Self {
        Self {
            primary_action: PrimaryAction::ContinueConversation,
            alert_command_center: false,
            urgency_level: UrgencyLevel::Routine,
            reasoning: "Default action due to decision system error - continuing safely"
                .to_string(),
            next_phase: None,
            specialized_equipment: Vec::new(),
            action_label: PrimaryAction::ContinueConversation.label(),
        }
    }

    pub fn is_emergency(&self) -> bool {
        matches!(
            self.urgency_level,
            UrgencyLevel::Critical | UrgencyLevel::Emergency
        )
    }
}
