//! 动作决策提示词拼装
//!
//! 把当前阶段、两份评估记录、最近对话与阶段判据拼成动作 Agent 的完整
//! 提示词。判据段是确定性的规则文本，模型只负责最终 JSON 决策。

use crate::agents::Speaker;
use crate::controller::ConversationEntry;
use crate::record::{is_unknown_value, AssessmentRecord, ComfortRecord};

const SEPARATOR: &str = "================================================================================";

/// 六个决定一阶段完成度的关键字段
const CRITICAL_FIELDS: [&str; 6] = [
    "injuries",
    "breathing",
    "immediate_danger",
    "can_walk",
    "stuck_trapped",
    "consciousness",
];

pub struct DecisionContext<'a> {
    pub phase: u8,
    pub assessment: &'a AssessmentRecord,
    pub comfort: Option<&'a ComfortRecord>,
    /// 最近的对话记录（调用方负责截取最后 6 条）
    pub history: &'a [ConversationEntry],
    pub turn_number: usize,
    pub phase_turn_number: usize,
    pub situation_context: Option<&'a str>,
}

pub fn build_action_decision_prompt(base_prompt: &str, ctx: &DecisionContext) -> String {
    let mut parts = vec![base_prompt.to_string()];

    if let Some(context) = ctx.situation_context {
        if !context.is_empty() {
            parts.push(format!("\n{}", SEPARATOR));
            parts.push("DISASTER SITUATION CONTEXT:".to_string());
            parts.push(SEPARATOR.to_string());
            parts.push(context.to_string());
        }
    }

    parts.push(format!("\n{}", SEPARATOR));
    parts.push("CURRENT STATE:".to_string());
    parts.push(SEPARATOR.to_string());
    parts.push(format!(
        "Phase: {} ({})",
        ctx.phase,
        if ctx.phase == 1 { "Assessment" } else { "Comfort & Special Needs" }
    ));
    parts.push(format!("Total Turn Number: {}", ctx.turn_number));
    parts.push(format!("Phase Turn Number: {}", ctx.phase_turn_number));

    parts.push(format!("\n{}", SEPARATOR));
    parts.push("PHASE 1 ASSESSMENT (Safety & Injuries):".to_string());
    parts.push(SEPARATOR.to_string());
    for (key, value) in ctx.assessment.snapshot() {
        let indicator = if is_unknown_value(&value) { "?" } else { "✓" };
        parts.push(format!("{} {}: {}", indicator, key, value));
    }

    let assessed = assessed_critical_fields(ctx.assessment);
    parts.push(format!(
        "\nPhase 1 Completion: {:.0}% ({}/{} critical fields)",
        completion_pct(assessed.len()),
        assessed.len(),
        CRITICAL_FIELDS.len()
    ));

    if ctx.phase == 2 {
        if let Some(comfort) = ctx.comfort {
            parts.push(format!("\n{}", SEPARATOR));
            parts.push("PHASE 2 ASSESSMENT (Medical & Special Needs):".to_string());
            parts.push(SEPARATOR.to_string());
            for (key, value) in comfort.snapshot() {
                let indicator = if is_unknown_value(&value) { "?" } else { "✓" };
                parts.push(format!("{} {}: {}", indicator, key, value));
            }
        }
    }

    if !ctx.history.is_empty() {
        parts.push(format!("\n{}", SEPARATOR));
        parts.push("RECENT CONVERSATION (Last 3 exchanges):".to_string());
        parts.push(SEPARATOR.to_string());
        for entry in ctx.history {
            parts.push(format!(
                "{}: {}",
                entry.speaker.label(),
                clip(&entry.content, 150)
            ));
        }
    }

    if ctx.phase == 1 {
        parts.push(phase_1_criteria(ctx.assessment, assessed.len()));
    } else {
        parts.push(phase_2_criteria(ctx.assessment, ctx.comfort));
    }

    parts.push(format!("\n{}", SEPARATOR));
    parts.push("YOUR DECISION (JSON FORMAT):".to_string());
    parts.push(SEPARATOR.to_string());
    parts.push(
        r#"
You MUST respond with ONLY a valid JSON object (no markdown fences, no explanation):

{
  "primary_action": "continue_conversation" | "transition_to_phase_2" | "evacuate_immediately" | "abort_and_alert" | "complete",
  "alert_command_center": true | false,
  "urgency_level": "routine" | "priority" | "critical" | "emergency",
  "reasoning": "Brief justification for your decision (1-2 sentences)",
  "next_phase": 2 | null,
  "specialized_equipment_needed": [] | ["stretcher", "cutting_tools", "medical_supplies", etc.]
}

Respond with ONLY the JSON object. Do not include any other text.
"#
        .to_string(),
    );

    parts.join("\n")
}

fn assessed_critical_fields(assessment: &AssessmentRecord) -> Vec<&'static str> {
    CRITICAL_FIELDS
        .iter()
        .filter(|f| {
            assessment
                .get(f)
                .map(|v| !is_unknown_value(v))
                .unwrap_or(false)
        })
        .copied()
        .collect()
}

fn completion_pct(assessed: usize) -> f64 {
    assessed as f64 / CRITICAL_FIELDS.len() as f64 * 100.0
}

fn field_lower(assessment: &AssessmentRecord, field: &str) -> String {
    assessment.get(field).unwrap_or("unknown").to_lowercase()
}

fn phase_1_criteria(assessment: &AssessmentRecord, assessed_count: usize) -> String {
    let mut lines = vec![format!("\n{}", SEPARATOR)];
    lines.push("PHASE 1 DECISION CRITERIA:".to_string());
    lines.push(SEPARATOR.to_string());

    let immediate_danger = field_lower(assessment, "immediate_danger");
    let can_walk = field_lower(assessment, "can_walk");

    if immediate_danger.contains("yes") {
        lines.push("\nIMMEDIATE DANGER DETECTED:".to_string());
        if can_walk.contains("yes") {
            lines.push("   ✓ Victim CAN walk".to_string());
            lines.push("   → RECOMMENDATION: evacuate_immediately".to_string());
            lines.push("   → Alert command center with urgency: critical".to_string());
        } else {
            lines.push("   ✗ Victim CANNOT walk or mobility unknown".to_string());
            lines.push("   → RECOMMENDATION: abort_and_alert".to_string());
            lines.push(
                "   → Leave area, alert command center for specialized rescue".to_string(),
            );
            lines.push("   → Equipment needed: stretcher, rescue team".to_string());
        }
    } else {
        lines.push("\nNo immediate danger detected".to_string());

        let injuries = field_lower(assessment, "injuries");
        let breathing = field_lower(assessment, "breathing");
        let consciousness = field_lower(assessment, "consciousness");
        let stuck = field_lower(assessment, "stuck_trapped");

        let can_evacuate_early = can_walk.contains("yes")
            && (injuries == "no" || (injuries != "unknown" && injuries.contains("minor")))
            && breathing.contains("yes")
            && consciousness.contains("conscious")
            && stuck.contains("no");

        if can_evacuate_early {
            lines.push("\nMID-ASSESSMENT EVACUATION CANDIDATE:".to_string());
            lines.push("   ✓ Victim can walk".to_string());
            lines.push("   ✓ No severe injuries".to_string());
            lines.push("   ✓ Breathing normally".to_string());
            lines.push("   ✓ Conscious".to_string());
            lines.push("   ✓ Not trapped".to_string());
            lines.push("   → OPTION: evacuate_immediately (skip Phase 2)".to_string());
            lines.push(
                "   → RATIONALE: Ambulatory, low-severity victim - efficient evacuation"
                    .to_string(),
            );
        }

        let mut transition_factors = Vec::new();
        if can_walk.contains("no") {
            transition_factors.push("Victim cannot walk (needs specialized rescue)");
        }
        if stuck.contains("yes") {
            transition_factors.push("Victim is trapped");
        }
        if injuries != "unknown"
            && injuries != "no"
            && (injuries.contains("severe")
                || injuries.contains("broken")
                || injuries.contains("bleeding"))
        {
            transition_factors.push("Severe injuries present");
        }

        if !transition_factors.is_empty() {
            lines.push("\nPHASE 2 TRANSITION FACTORS:".to_string());
            for factor in &transition_factors {
                lines.push(format!("   • {}", factor));
            }
            lines.push("   → RECOMMENDATION: transition_to_phase_2".to_string());
            lines.push(
                "   → Victim needs emotional support and detailed medical info gathering"
                    .to_string(),
            );
        }
    }

    lines.push("\nASSESSMENT STATUS:".to_string());
    lines.push(format!(
        "   Progress: {:.0}% complete",
        completion_pct(assessed_count)
    ));
    if assessed_count < CRITICAL_FIELDS.len() {
        let unknown: Vec<&str> = CRITICAL_FIELDS
            .iter()
            .filter(|f| {
                assessment
                    .get(f)
                    .map(is_unknown_value)
                    .unwrap_or(true)
            })
            .copied()
            .collect();
        lines.push(format!("   Unknown fields: {}", unknown.join(", ")));
        lines.push(
            "   → If no emergency: continue_conversation to gather remaining data".to_string(),
        );
    } else {
        lines.push(
            "   ✓ Assessment complete - make final decision (evacuate or transition)".to_string(),
        );
    }

    lines.join("\n")
}

fn phase_2_criteria(assessment: &AssessmentRecord, comfort: Option<&ComfortRecord>) -> String {
    let mut lines = vec![format!("\n{}", SEPARATOR)];
    lines.push("PHASE 2 DECISION CRITERIA:".to_string());
    lines.push(SEPARATOR.to_string());

    if let Some(comfort) = comfort {
        let emergency_med = comfort.get("emergency_medication").unwrap_or("unknown");
        let allergies = comfort.get("allergies").unwrap_or("unknown");
        let pregnant = comfort
            .get("pregnant")
            .unwrap_or("unknown")
            .to_lowercase();

        let mut critical_discoveries = Vec::new();
        if emergency_med != "unknown" && emergency_med != "no" {
            critical_discoveries.push(format!("Emergency medication needed: {}", emergency_med));
        }
        if allergies != "unknown" && allergies != "no" {
            critical_discoveries.push(format!("Allergies identified: {}", allergies));
        }
        if pregnant.contains("yes") {
            critical_discoveries.push("Victim is pregnant".to_string());
        }

        if !critical_discoveries.is_empty() {
            lines.push("\nCRITICAL MEDICAL NEEDS DISCOVERED:".to_string());
            for discovery in &critical_discoveries {
                lines.push(format!("   • {}", discovery));
            }
            lines.push("   → RECOMMENDATION: alert_command_center = true".to_string());
            lines.push("   → Urgency level: priority or critical".to_string());
            lines.push("   → Action: continue_conversation (but escalate priority)".to_string());
        }
    }

    let can_walk = field_lower(assessment, "can_walk");
    if can_walk.contains("yes") {
        lines.push("\nAMBULATORY VICTIM:".to_string());
        lines.push("   • Victim can walk independently".to_string());
        if let Some(comfort) = comfort {
            let assessed = ["emergency_medication", "allergies", "age"]
                .iter()
                .filter(|f| {
                    comfort
                        .get(f)
                        .map(|v| !is_unknown_value(v))
                        .unwrap_or(false)
                })
                .count();
            if assessed >= 2 {
                lines.push("   • Sufficient medical information gathered".to_string());
                lines.push("   → OPTION: evacuate_immediately".to_string());
                lines.push(
                    "   → RATIONALE: Remove ambulatory victim from danger zone".to_string(),
                );
            } else {
                lines.push("   • Still gathering critical medical information".to_string());
                lines.push("   → RECOMMENDATION: continue_conversation".to_string());
            }
        } else {
            lines.push(
                "   → RECOMMENDATION: continue_conversation (gather medical needs)".to_string(),
            );
        }
    } else {
        lines.push("\nNON-AMBULATORY VICTIM:".to_string());
        lines.push("   • Victim cannot walk or is trapped".to_string());
        lines.push("   • Must wait for specialized rescue".to_string());
        lines.push("   → Continue gathering complete medical information".to_string());
        lines.push("   → Provide emotional support during wait".to_string());
    }

    lines.push("\nMONITOR FOR DETERIORATION:".to_string());
    lines.push("   Watch recent victim responses for:".to_string());
    lines.push("   • New difficulty breathing".to_string());
    lines.push("   • Increasing pain".to_string());
    lines.push("   • Growing panic/confusion".to_string());
    lines.push("   • Reduced responsiveness".to_string());
    lines.push("   → If detected: urgency_level = emergency".to_string());

    if let Some(comfort) = comfort {
        let priority_fields = ["emergency_medication", "allergies", "age", "regular_medication"];
        let assessed = priority_fields
            .iter()
            .filter(|f| {
                comfort
                    .get(f)
                    .map(|v| !is_unknown_value(v))
                    .unwrap_or(false)
            })
            .count();
        let pct = assessed as f64 / priority_fields.len() as f64 * 100.0;
        lines.push("\nCOMFORT ASSESSMENT STATUS:".to_string());
        lines.push(format!("   Progress: {:.0}% complete", pct));
        if assessed >= priority_fields.len() {
            lines.push("   ✓ Phase 2 complete".to_string());
            lines.push("   → RECOMMENDATION: primary_action = complete".to_string());
        }
    }

    lines.join("\n")
}

fn clip(content: &str, limit: usize) -> String {
    if content.chars().count() > limit {
        let clipped: String = content.chars().take(limit).collect();
        format!("{}...", clipped)
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn context<'a>(
        phase: u8,
        assessment: &'a AssessmentRecord,
        comfort: Option<&'a ComfortRecord>,
    ) -> DecisionContext<'a> {
        DecisionContext {
            phase,
            assessment,
            comfort,
            history: &[],
            turn_number: 3,
            phase_turn_number: 3,
            situation_context: None,
        }
    }

    #[test]
    fn test_active_danger_recommends_abort_when_immobile() {
        let record = assessed(&[("immediate_danger", "yes - fire spreading")]);
        let prompt = build_action_decision_prompt("base", &context(1, &record, None));
        assert!(prompt.contains("IMMEDIATE DANGER DETECTED"));
        assert!(prompt.contains("RECOMMENDATION: abort_and_alert"));
    }

    #[test]
    fn test_active_danger_recommends_evacuation_when_ambulatory() {
        let record = assessed(&[
            ("immediate_danger", "yes - smoke"),
            ("can_walk", "yes"),
        ]);
        let prompt = build_action_decision_prompt("base", &context(1, &record, None));
        assert!(prompt.contains("RECOMMENDATION: evacuate_immediately"));
    }

    #[test]
    fn test_completion_percentage_and_unknown_fields() {
        let record = assessed(&[("injuries", "no"), ("breathing", "yes normal")]);
        let prompt = build_action_decision_prompt("base", &context(1, &record, None));
        // consciousness 默认有值，共 3/6
        assert!(prompt.contains("Phase 1 Completion: 50% (3/6 critical fields)"));
        assert!(prompt.contains("Unknown fields: immediate_danger, can_walk, stuck_trapped"));
    }

    #[test]
    fn test_phase_2_critical_discoveries() {
        let assessment = assessed(&[("can_walk", "no")]);
        let mut comfort = ComfortRecord::new();
        let updates: FieldUpdates = [
            ("emergency_medication", "yes - insulin"),
            ("pregnant", "yes"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        comfort.apply(&updates);

        let prompt =
            build_action_decision_prompt("base", &context(2, &assessment, Some(&comfort)));
        assert!(prompt.contains("Emergency medication needed: yes - insulin"));
        assert!(prompt.contains("Victim is pregnant"));
        assert!(prompt.contains("NON-AMBULATORY VICTIM"));
    }

    #[test]
    fn test_history_clipped_to_150_chars() {
        let record = AssessmentRecord::new();
        let long = "a".repeat(200);
        let history = vec![ConversationEntry {
            phase: 1,
            turn: 1,
            speaker: Speaker::Victim,
            content: long,
            duration_secs: 0.0,
        }];
        let ctx = DecisionContext {
            phase: 1,
            assessment: &record,
            comfort: None,
            history: &history,
            turn_number: 1,
            phase_turn_number: 1,
            situation_context: None,
        };
        let prompt = build_action_decision_prompt("base", &ctx);
        assert!(prompt.contains(&format!("{}...", "a".repeat(150))));
        assert!(!prompt.contains(&"a".repeat(151)));
    }
}
