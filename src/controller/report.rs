//! 救援任务报告（Markdown）
//!
//! 流程结束后生成：任务概况、两阶段评估、分诊结果、决策日志、
//! 各 Agent 延迟统计与完整对话转写。

use crate::agents::triage::TriagePriority;
use crate::agents::Speaker;

use super::PhaseController;

const RULE: &str = "================================================================================";

impl PhaseController {
    pub(crate) fn generate_rescue_report(&self, priority: TriagePriority) -> String {
        let mut lines = Vec::new();
        lines.push("# RESCUE ROBOT MISSION REPORT".to_string());
        lines.push(String::new());
        lines.push(RULE.to_string());
        lines.push(String::new());

        lines.push("## MISSION OVERVIEW".to_string());
        lines.push(String::new());
        lines.push(format!("- **Robot**: {}", self.robot_name));
        lines.push(format!("- **Total Turns**: {}", self.turn_count));
        lines.push(format!("- **Phase 1 Turns**: {}", self.phase_1_turns));
        lines.push(format!("- **Phase 2 Turns**: {}", self.phase_2_turns));
        lines.push(format!(
            "- **Action Decisions Made**: {}",
            self.decisions.len()
        ));
        lines.push(String::new());

        lines.push("## VICTIM ASSESSMENT (Phase 1)".to_string());
        lines.push(String::new());
        for (key, value) in self.assessment_agent.record().snapshot() {
            lines.push(format!("- **{}**: {}", title_case(&key), value));
        }
        if let Some(location) = self.assessment_agent.record().location() {
            lines.push(format!("- **Gps Location**: {}", location));
        }
        lines.push(String::new());

        if self.phase_2_turns > 0 {
            lines.push("## COMFORT & SPECIAL NEEDS (Phase 2)".to_string());
            lines.push(String::new());
            for (key, value) in self.comfort_assessment_agent.record().snapshot() {
                lines.push(format!("- **{}**: {}", title_case(&key), value));
            }
            lines.push(String::new());
        }

        lines.push("## TRIAGE PRIORITY".to_string());
        lines.push(String::new());
        lines.push(format!(
            "**{}** - {}",
            priority.as_str(),
            priority.description()
        ));
        lines.push(String::new());

        lines.push("## ACTION DECISIONS LOG".to_string());
        lines.push(String::new());
        for (i, entry) in self.decisions.iter().enumerate() {
            let decision = &entry.decision;
            lines.push(format!(
                "### Decision {} (Turn {}, Phase {})",
                i + 1,
                entry.turn,
                entry.phase
            ));
            lines.push(format!("- **Action**: {}", decision.action_label));
            lines.push(format!(
                "- **Alert Command Center**: {}",
                decision.alert_command_center
            ));
            lines.push(format!(
                "- **Urgency Level**: {}",
                decision.urgency_level.as_str()
            ));
            lines.push(format!("- **Reasoning**: {}", decision.reasoning));
            if !decision.specialized_equipment.is_empty() {
                lines.push(format!(
                    "- **Equipment Needed**: {}",
                    decision.specialized_equipment.join(", ")
                ));
            }
            lines.push(String::new());
        }

        lines.push("## PERFORMANCE METRICS".to_string());
        lines.push(String::new());
        for (agent, timings) in &self.timing {
            if timings.is_empty() {
                continue;
            }
            let total: f64 = timings.iter().map(|t| t.duration_secs).sum();
            let avg = total / timings.len() as f64;
            lines.push(format!("### {}", agent));
            lines.push(format!("- Total calls: {}", timings.len()));
            lines.push(format!("- Total time: {:.2}s", total));
            lines.push(format!("- Average time: {:.2}s", avg));
            lines.push(String::new());
        }

        lines.push("## CONVERSATION TRANSCRIPT".to_string());
        lines.push(String::new());
        for (i, entry) in self.conversation.iter().enumerate() {
            let role = match entry.speaker {
                Speaker::Robot => "Robot",
                Speaker::Victim => "Victim",
            };
            lines.push(format!(
                "**{}. {}** (Phase {}, Turn {}, {:.2}s):",
                i + 1,
                role,
                entry.phase,
                entry.turn,
                entry.duration_secs
            ));
            lines.push(format!("> {}", entry.content));
            lines.push(String::new());
        }

        lines.push(RULE.to_string());
        lines.push("END OF REPORT".to_string());

        lines.join("\n")
    }
}

/// snake_case 字段名转标题格式
fn title_case(field: &str) -> String {
    field
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("immediate_danger"), "Immediate Danger");
        assert_eq!(title_case("age"), "Age");
        assert_eq!(title_case("people_in_surroundings"), "People In Surroundings");
    }
}
