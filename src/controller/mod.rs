//! 阶段控制器：多阶段救援对话的中央协调
//!
//! 一阶段做安全与伤情评估，二阶段做安抚与特殊需求采集；每轮受困者回应后
//! 都过一次动作决策。对话 LLM 传输失败时向备用交互树移交最后一句话。

pub mod decision_prompt;
pub mod report;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::mpsc;

use crate::agents::action::ActionAgent;
use crate::agents::assessment::AssessmentAgent;
use crate::agents::comfort::ComfortAgent;
use crate::agents::comfort_assessment::ComfortAssessmentAgent;
use crate::agents::dialogue::DialogueAgent;
use crate::agents::triage::{TriageAgent, TriagePriority};
use crate::agents::Speaker;
use crate::bus::{topics, Bus, Envelope};
use crate::config::DialogueSection;
use crate::decision::{ActionDecision, PrimaryAction, UrgencyLevel};
use crate::llm::LlmError;
use crate::record::AssessmentRecord;
use crate::victim::VictimChannel;

use decision_prompt::{build_action_decision_prompt, DecisionContext};

/// 主链路到备用交互树的移交消息
#[derive(Debug, Clone)]
pub enum Handoff {
    /// 每次评估合并后推送的记录镜像，备用树断点续问用
    Snapshot(BTreeMap<String, String>),
    /// 激活备用树。last_utterance 是主链路收到但没处理完的回应；
    /// None 表示主链路在开场前就失败了。
    Activate { last_utterance: Option<String> },
}

/// 仅作用于环境危险描述的放弃判据关键词
const ACTIVE_DANGER_KEYWORDS: [&str; 10] = [
    "fire",
    "burning",
    "collapsing",
    "collapse now",
    "smoke filling",
    "gas leak",
    "flooding",
    "rising water",
    "electrical",
    "sparks",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initial,
    Comfort,
}

impl Phase {
    pub fn number(self) -> u8 {
        match self {
            Self::Initial => 1,
            Self::Comfort => 2,
        }
    }
}

/// 对话记录条目，报告与决策提示词共用
#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub phase: u8,
    pub turn: usize,
    pub speaker: Speaker,
    pub content: String,
    pub duration_secs: f64,
}

/// 决策审计日志
#[derive(Debug, Clone)]
pub struct DecisionLogEntry {
    pub turn: usize,
    pub phase: u8,
    pub decision: ActionDecision,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct AgentTiming {
    pub turn: usize,
    pub phase: u8,
    pub duration_secs: f64,
}

/// 整个流程的最终结果
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub entry_phase: u8,
    pub phase_1_executed: bool,
    pub phase_2_executed: bool,
    pub final_assessment: BTreeMap<String, String>,
    pub comfort_assessment: BTreeMap<String, String>,
    pub triage_priority: TriagePriority,
    pub exit_reason: String,
    pub phase_1_turns: usize,
    pub phase_2_turns: usize,
    pub total_turns: usize,
    pub rescue_report: String,
}

/// run 的两种收尾：正常完成，或已向备用树移交
pub enum WorkflowOutcome {
    Completed(Box<WorkflowResult>),
    Failover,
}

enum PhaseFlow {
    Exit {
        reason: &'static str,
        next_phase: Option<u8>,
    },
    Failover {
        last_utterance: Option<String>,
    },
}

enum StepResult {
    Continue,
    Exit {
        reason: &'static str,
        next_phase: Option<u8>,
        speak_final: bool,
    },
}

pub struct PhaseController {
    assessment_agent: AssessmentAgent,
    dialogue_agent: DialogueAgent,
    comfort_agent: ComfortAgent,
    comfort_assessment_agent: ComfortAssessmentAgent,
    triage_agent: TriageAgent,
    action_agent: ActionAgent,
    victim: Arc<dyn VictimChannel>,
    bus: Arc<dyn Bus>,
    handoff: mpsc::Sender<Handoff>,
    action_prompt: String,
    robot_name: String,
    situation_context: Option<String>,

    max_turns: usize,
    max_retries: usize,
    listen_timeout: Duration,

    current_phase: Phase,
    conversation: Vec<ConversationEntry>,
    decisions: Vec<DecisionLogEntry>,
    timing: BTreeMap<&'static str, Vec<AgentTiming>>,
    turn_count: usize,
    phase_1_turns: usize,
    phase_2_turns: usize,
}

impl PhaseController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        assessment_agent: AssessmentAgent,
        dialogue_agent: DialogueAgent,
        comfort_agent: ComfortAgent,
        comfort_assessment_agent: ComfortAssessmentAgent,
        triage_agent: TriageAgent,
        action_agent: ActionAgent,
        victim: Arc<dyn VictimChannel>,
        bus: Arc<dyn Bus>,
        handoff: mpsc::Sender<Handoff>,
        action_prompt: String,
        robot_name: String,
        dialogue: &DialogueSection,
    ) -> Self {
        Self {
            assessment_agent,
            dialogue_agent,
            comfort_agent,
            comfort_assessment_agent,
            triage_agent,
            action_agent,
            victim,
            bus,
            handoff,
            action_prompt,
            robot_name,
            situation_context: None,
            max_turns: dialogue.max_turns as usize,
            max_retries: dialogue.max_retries as usize,
            listen_timeout: Duration::from_secs(dialogue.listen_timeout_secs),
            current_phase: Phase::Initial,
            conversation: Vec::new(),
            decisions: Vec::new(),
            timing: BTreeMap::new(),
            turn_count: 0,
            phase_1_turns: 0,
            phase_2_turns: 0,
        }
    }

    pub fn set_situation_context(&mut self, context: impl Into<String>) {
        let context = context.into();
        self.dialogue_agent.set_situation_context(context.clone());
        self.situation_context = Some(context);
    }

    /// 有足够的先验评估时直接从二阶段开始
    pub fn determine_entry_point(prior: Option<&AssessmentRecord>) -> Phase {
        match prior {
            Some(record) if record.is_sufficient_for_phase_2() => Phase::Comfort,
            _ => Phase::Initial,
        }
    }

    /// 执行完整流程。先验评估足够时跳过一阶段。
    pub async fn run(&mut self, prior: Option<AssessmentRecord>) -> WorkflowOutcome {
        let entry_phase = Self::determine_entry_point(prior.as_ref());
        tracing::info!(entry_phase = entry_phase.number(), "starting rescue workflow");

        if entry_phase == Phase::Comfort {
            if let Some(record) = prior {
                *self.assessment_agent.record_mut() = record;
            }
        }

        let mut phase_1_executed = false;
        let mut phase_2_executed = false;
        let mut exit_reason;

        if entry_phase == Phase::Initial {
            phase_1_executed = true;
            match self.execute_phase_1().await {
                PhaseFlow::Exit { reason, next_phase } => {
                    exit_reason = reason;
                    if next_phase == Some(2) {
                        phase_2_executed = true;
                        match self.execute_phase_2().await {
                            PhaseFlow::Exit { reason, .. } => exit_reason = reason,
                            PhaseFlow::Failover { last_utterance } => {
                                return self.activate_backup(last_utterance).await;
                            }
                        }
                    }
                }
                PhaseFlow::Failover { last_utterance } => {
                    return self.activate_backup(last_utterance).await;
                }
            }
        } else {
            phase_2_executed = true;
            match self.execute_phase_2().await {
                PhaseFlow::Exit { reason, .. } => exit_reason = reason,
                PhaseFlow::Failover { last_utterance } => {
                    return self.activate_backup(last_utterance).await;
                }
            }
        }

        let priority = self.perform_final_triage().await;

        let result = WorkflowResult {
            entry_phase: entry_phase.number(),
            phase_1_executed,
            phase_2_executed,
            final_assessment: self.assessment_agent.record().snapshot(),
            comfort_assessment: self.comfort_assessment_agent.record().snapshot(),
            triage_priority: priority,
            exit_reason: exit_reason.to_string(),
            phase_1_turns: self.phase_1_turns,
            phase_2_turns: self.phase_2_turns,
            total_turns: self.turn_count,
            rescue_report: self.generate_rescue_report(priority),
        };

        tracing::info!(
            exit_reason = %result.exit_reason,
            priority = result.triage_priority.as_str(),
            total_turns = result.total_turns,
            "rescue workflow finished"
        );
        WorkflowOutcome::Completed(Box::new(result))
    }

    async fn activate_backup(&mut self, last_utterance: Option<String>) -> WorkflowOutcome {
        tracing::error!("primary dialogue pipeline failed, handing over to backup interaction");
        if self
            .handoff
            .send(Handoff::Activate { last_utterance })
            .await
            .is_err()
        {
            tracing::error!("backup handoff channel closed, no standby available");
        }
        WorkflowOutcome::Failover
    }

    // ===== 一阶段 =====

    async fn execute_phase_1(&mut self) -> PhaseFlow {
        self.current_phase = Phase::Initial;
        tracing::info!("phase 1: initial assessment");

        let started = Instant::now();
        let mut robot_question = self.dialogue_agent.initial_utterance();
        self.record_timing("dialogue_agent", started.elapsed());
        self.log_exchange(Speaker::Robot, &robot_question, started.elapsed());

        while self.phase_1_turns < self.max_turns {
            self.phase_1_turns += 1;
            self.turn_count += 1;
            tracing::debug!(turn = self.phase_1_turns, "phase 1 turn");

            self.victim.speak(&robot_question, false).await;

            let Some(victim_response) = self.listen_with_retries().await else {
                tracing::warn!("no response from victim, ending phase 1");
                return PhaseFlow::Exit {
                    reason: "no_victim_response",
                    next_phase: Some(2),
                };
            };
            self.log_exchange(Speaker::Victim, &victim_response, Duration::ZERO);
            self.dialogue_agent.add_victim_utterance(&victim_response);

            // 提取并合并评估字段
            let started = Instant::now();
            let updates = match self
                .assessment_agent
                .analyze(&robot_question, &victim_response)
                .await
            {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::error!(error = %e, "assessment extraction transport failure");
                    return PhaseFlow::Failover {
                        last_utterance: Some(victim_response),
                    };
                }
            };
            self.record_timing("assessment_agent", started.elapsed());
            if !updates.is_empty() {
                self.assessment_agent.merge(&updates);
            }
            self.push_snapshot();

            // 每轮必过的动作决策
            let decision = match self.evaluate_action_decision().await {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::error!(error = %e, "action decision transport failure");
                    return PhaseFlow::Failover {
                        last_utterance: Some(victim_response),
                    };
                }
            };

            if decision.alert_command_center {
                self.alert_command_center(&decision).await;
            }

            match self.handle_phase_1_decision(&decision) {
                StepResult::Exit {
                    reason,
                    next_phase,
                    speak_final,
                } => {
                    if speak_final {
                        self.speak_final_message(&decision).await;
                    }
                    return PhaseFlow::Exit { reason, next_phase };
                }
                StepResult::Continue => {}
            }

            // 评估已完成：最后过一次决策再收尾
            if self.assessment_agent.record().is_complete() {
                tracing::info!("phase 1 assessment complete");
                let final_decision = match self.evaluate_action_decision().await {
                    Ok(decision) => decision,
                    Err(e) => {
                        tracing::error!(error = %e, "final action decision transport failure");
                        return PhaseFlow::Failover {
                            last_utterance: Some(victim_response),
                        };
                    }
                };
                if final_decision.alert_command_center {
                    self.alert_command_center(&final_decision).await;
                }
                return match self.handle_phase_1_decision(&final_decision) {
                    StepResult::Exit {
                        reason,
                        next_phase,
                        speak_final,
                    } => {
                        if speak_final {
                            self.speak_final_message(&final_decision).await;
                        }
                        PhaseFlow::Exit { reason, next_phase }
                    }
                    StepResult::Continue => PhaseFlow::Exit {
                        reason: "phase_1_complete",
                        next_phase: Some(2),
                    },
                };
            }

            let started = Instant::now();
            robot_question = match self
                .dialogue_agent
                .next_utterance(self.assessment_agent.record())
                .await
            {
                Ok(question) => question,
                Err(e) => {
                    tracing::error!(error = %e, "dialogue generation transport failure");
                    return PhaseFlow::Failover {
                        last_utterance: Some(victim_response),
                    };
                }
            };
            self.record_timing("dialogue_agent", started.elapsed());
            self.log_exchange(Speaker::Robot, &robot_question, started.elapsed());
        }

        tracing::warn!(max_turns = self.max_turns, "phase 1 max turns reached");
        PhaseFlow::Exit {
            reason: "max_turns_reached",
            next_phase: Some(2),
        }
    }

    fn handle_phase_1_decision(&self, decision: &ActionDecision) -> StepResult {
        match &decision.primary_action {
            PrimaryAction::AbortAndAlert => {
                // 放弃判据只认正在发生的环境危险；静止的不稳定结构降级为二阶段
                let danger = self
                    .assessment_agent
                    .record()
                    .get("immediate_danger")
                    .unwrap_or("unknown")
                    .to_lowercase();
                let is_active = ACTIVE_DANGER_KEYWORDS.iter().any(|k| danger.contains(k));

                if !is_active && danger.contains("unstable") {
                    tracing::warn!(
                        danger = %danger,
                        "abort overridden: danger not active, transitioning to phase 2"
                    );
                    return StepResult::Exit {
                        reason: "transition_to_phase_2",
                        next_phase: Some(2),
                        speak_final: false,
                    };
                }

                tracing::warn!(reasoning = %decision.reasoning, "aborting phase 1");
                StepResult::Exit {
                    reason: "abort_and_alert",
                    next_phase: None,
                    speak_final: true,
                }
            }
            PrimaryAction::EvacuateImmediately => {
                tracing::info!(reasoning = %decision.reasoning, "evacuating immediately");
                StepResult::Exit {
                    reason: "immediate_evacuation",
                    next_phase: None,
                    speak_final: true,
                }
            }
            PrimaryAction::TransitionToPhase2 => {
                // 安全闸门：行动能力未知或轮数不足时拦下过早转阶段
                let record = self.assessment_agent.record();
                let mobility_known = record
                    .get("can_walk")
                    .map(|v| v != "unknown")
                    .unwrap_or(false)
                    || record
                        .get("stuck_trapped")
                        .map(|v| v != "unknown")
                        .unwrap_or(false);
                let min_turns_met = self.phase_1_turns >= 3;

                if !mobility_known || !min_turns_met {
                    tracing::warn!(
                        mobility_known,
                        phase_1_turns = self.phase_1_turns,
                        "phase 2 transition blocked: insufficient safety data"
                    );
                    return StepResult::Continue;
                }

                tracing::info!(reasoning = %decision.reasoning, "transitioning to phase 2");
                StepResult::Exit {
                    reason: "transition_to_phase_2",
                    next_phase: Some(2),
                    speak_final: false,
                }
            }
            PrimaryAction::ContinueConversation => StepResult::Continue,
            other => {
                tracing::warn!(action = %other.label(), "unknown action, defaulting to continue");
                StepResult::Continue
            }
        }
    }

    // ===== 二阶段 =====

    async fn execute_phase_2(&mut self) -> PhaseFlow {
        self.current_phase = Phase::Comfort;
        tracing::info!("phase 2: comfort and special needs");

        let started = Instant::now();
        let mut robot_message = self.comfort_agent.initial_utterance();
        self.record_timing("comfort_agent", started.elapsed());
        self.log_exchange(Speaker::Robot, &robot_message, started.elapsed());

        while self.phase_2_turns < self.max_turns {
            self.phase_2_turns += 1;
            self.turn_count += 1;
            tracing::debug!(turn = self.phase_2_turns, "phase 2 turn");

            self.victim.speak(&robot_message, false).await;

            let Some(victim_response) = self.listen_with_retries().await else {
                tracing::warn!("no response from victim, ending phase 2");
                return PhaseFlow::Exit {
                    reason: "no_victim_response",
                    next_phase: None,
                };
            };
            self.log_exchange(Speaker::Victim, &victim_response, Duration::ZERO);
            self.comfort_agent.add_victim_utterance(&victim_response);

            // 二阶段的提取失败不触发移交，本轮跳过合并即可
            let started = Instant::now();
            match self
                .comfort_assessment_agent
                .analyze(&robot_message, &victim_response)
                .await
            {
                Ok(updates) if !updates.is_empty() => {
                    self.comfort_assessment_agent.merge(&updates);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "comfort extraction failed, skipping merge");
                }
            }
            self.record_timing("comfort_assessment_agent", started.elapsed());

            let decision = match self.evaluate_action_decision().await {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::warn!(error = %e, "action decision failed, continuing safely");
                    ActionDecision::safe_default()
                }
            };

            if decision.alert_command_center {
                self.alert_command_center(&decision).await;
            }

            match self.handle_phase_2_decision(&decision) {
                StepResult::Exit {
                    reason,
                    speak_final,
                    ..
                } => {
                    if speak_final {
                        self.speak_final_message(&decision).await;
                    }
                    return PhaseFlow::Exit {
                        reason,
                        next_phase: None,
                    };
                }
                StepResult::Continue => {}
            }

            // 安抚回复走 LLM（带兜底），平静时直接查表提问
            let started = Instant::now();
            let next_message = if self.comfort_assessment_agent.record().is_complete() {
                None
            } else if self.comfort_agent.distress().high_distress() {
                let record = self.comfort_assessment_agent.record().clone();
                Some(
                    self.comfort_agent
                        .comfort_response(
                            &victim_response,
                            self.assessment_agent.record(),
                            &record,
                        )
                        .await,
                )
            } else {
                let record = self.comfort_assessment_agent.record().clone();
                self.comfort_agent.next_utterance(&record)
            };
            self.record_timing("comfort_agent", started.elapsed());

            match next_message {
                Some(message) => {
                    self.log_exchange(Speaker::Robot, &message, started.elapsed());
                    robot_message = message;
                }
                None => {
                    tracing::info!("phase 2 comfort assessment complete");
                    let farewell = self.dialogue_agent.final_message_for_action("");
                    self.victim.speak(&farewell, true).await;
                    self.log_exchange(Speaker::Robot, &farewell, Duration::ZERO);
                    return PhaseFlow::Exit {
                        reason: "phase_2_complete",
                        next_phase: None,
                    };
                }
            }
        }

        tracing::warn!(max_turns = self.max_turns, "phase 2 max turns reached");
        PhaseFlow::Exit {
            reason: "max_turns_reached",
            next_phase: None,
        }
    }

    fn handle_phase_2_decision(&self, decision: &ActionDecision) -> StepResult {
        if decision.primary_action == PrimaryAction::AbortAndAlert || decision.is_emergency() {
            tracing::warn!(
                urgency = decision.urgency_level.as_str(),
                reasoning = %decision.reasoning,
                "emergency detected in phase 2"
            );
            return StepResult::Exit {
                reason: "emergency_detected",
                next_phase: None,
                speak_final: true,
            };
        }

        match &decision.primary_action {
            PrimaryAction::EvacuateImmediately => {
                tracing::info!(reasoning = %decision.reasoning, "evacuation ready");
                StepResult::Exit {
                    reason: "evacuation_ready",
                    next_phase: None,
                    speak_final: true,
                }
            }
            PrimaryAction::Complete => {
                tracing::info!(reasoning = %decision.reasoning, "phase 2 complete");
                StepResult::Exit {
                    reason: "phase_2_complete",
                    next_phase: None,
                    speak_final: true,
                }
            }
            PrimaryAction::ContinueConversation => {
                if decision.alert_command_center
                    && matches!(
                        decision.urgency_level,
                        UrgencyLevel::Priority | UrgencyLevel::Critical
                    )
                {
                    tracing::warn!(
                        urgency = decision.urgency_level.as_str(),
                        reasoning = %decision.reasoning,
                        "priority escalation while continuing phase 2"
                    );
                }
                StepResult::Continue
            }
            other => {
                tracing::warn!(action = %other.label(), "unknown action, defaulting to continue");
                StepResult::Continue
            }
        }
    }

    // ===== 公共环节 =====

    /// 带重试的监听：每次超时后播一条提醒话术
    async fn listen_with_retries(&mut self) -> Option<String> {
        for attempt in 0..self.max_retries {
            tracing::debug!(attempt = attempt + 1, max = self.max_retries, "listening");
            if let Some(reply) = self.victim.listen(self.listen_timeout).await {
                return Some(reply);
            }
            if attempt + 1 < self.max_retries {
                let retry_message = self.dialogue_agent.no_response_message();
                self.victim.speak(&retry_message, false).await;
            }
        }
        None
    }

    async fn evaluate_action_decision(&mut self) -> Result<ActionDecision, LlmError> {
        let started = Instant::now();

        let history_start = self.conversation.len().saturating_sub(6);
        let ctx = DecisionContext {
            phase: self.current_phase.number(),
            assessment: self.assessment_agent.record(),
            comfort: (self.current_phase == Phase::Comfort)
                .then(|| self.comfort_assessment_agent.record()),
            history: &self.conversation[history_start..],
            turn_number: self.turn_count,
            phase_turn_number: match self.current_phase {
                Phase::Initial => self.phase_1_turns,
                Phase::Comfort => self.phase_2_turns,
            },
            situation_context: self.situation_context.as_deref(),
        };
        let prompt = build_action_decision_prompt(&self.action_prompt, &ctx);

        let decision = self.action_agent.decide(&prompt).await?;
        let elapsed = started.elapsed();
        self.record_timing("action_agent", elapsed);

        tracing::info!(
            action = %decision.action_label,
            alert = decision.alert_command_center,
            urgency = decision.urgency_level.as_str(),
            reasoning = %decision.reasoning,
            "action decision"
        );
        self.decisions.push(DecisionLogEntry {
            turn: self.turn_count,
            phase: self.current_phase.number(),
            decision: decision.clone(),
            duration_secs: elapsed.as_secs_f64(),
        });

        Ok(decision)
    }

    /// 指挥中心告警，尽力而为
    async fn alert_command_center(&self, decision: &ActionDecision) {
        let data = json!({
            "timestamp": chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
            "urgency_level": decision.urgency_level.as_str(),
            "reason": decision.reasoning,
            "specialized_equipment_needed": decision.specialized_equipment,
            "phase": self.current_phase.number(),
            "turn": self.turn_count,
            "assessment": if self.current_phase == Phase::Initial {
                json!(self.assessment_agent.record().snapshot())
            } else {
                json!({})
            },
            "comfort_assessment": if self.current_phase == Phase::Comfort {
                json!(self.comfort_assessment_agent.record().snapshot())
            } else {
                json!({})
            },
        });

        let envelope = Envelope::new(
            &self.robot_name,
            "alert",
            topics::COMMAND_CENTER_ALERT,
            data,
        );
        if let Err(e) = self.bus.publish(topics::COMMAND_CENTER_ALERT, &envelope).await {
            tracing::warn!(error = %e, "command center alert publish failed");
        }
    }

    async fn speak_final_message(&mut self, decision: &ActionDecision) {
        let label = decision.action_label.clone();
        let message = self.dialogue_agent.final_message_for_action(&label);
        self.victim.speak(&message, true).await;
        self.log_exchange(Speaker::Robot, &message, Duration::ZERO);
    }

    fn push_snapshot(&self) {
        let snapshot = self.assessment_agent.record().snapshot();
        if self.handoff.try_send(Handoff::Snapshot(snapshot)).is_err() {
            tracing::debug!("snapshot handoff not delivered");
        }
    }

    async fn perform_final_triage(&mut self) -> TriagePriority {
        let started = Instant::now();
        let comfort = (self.phase_2_turns > 0).then(|| self.comfort_assessment_agent.record());
        let priority = self
            .triage_agent
            .assign(self.assessment_agent.record(), comfort)
            .await;
        self.record_timing("triage_agent", started.elapsed());
        tracing::info!(priority = priority.as_str(), "final triage assigned");
        priority
    }

    fn log_exchange(&mut self, speaker: Speaker, content: &str, elapsed: Duration) {
        self.conversation.push(ConversationEntry {
            phase: self.current_phase.number(),
            turn: match self.current_phase {
                Phase::Initial => self.phase_1_turns,
                Phase::Comfort => self.phase_2_turns,
            },
            speaker,
            content: content.to_string(),
            duration_secs: elapsed.as_secs_f64(),
        });
    }

    fn record_timing(&mut self, agent: &'static str, elapsed: Duration) {
        self.timing.entry(agent).or_default().push(AgentTiming {
            turn: self.turn_count,
            phase: self.current_phase.number(),
            duration_secs: elapsed.as_secs_f64(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::triage::TriageAgent;
    use crate::bus::ChannelBus;
    use crate::llm::ScriptedLlm;
    use crate::messages::{Empathy, Language, MessageCatalog};
    use crate::victim::ScriptedVictim;

    fn controller_with(
        llm: Arc<ScriptedLlm>,
        victim: Arc<ScriptedVictim>,
    ) -> (PhaseController, mpsc::Receiver<Handoff>) {
        let catalog = MessageCatalog::new(Language::En, Empathy::Medium);
        let (handoff_tx, handoff_rx) = mpsc::channel(32);
        let (bus, _bus_rx) = ChannelBus::new();
        let dialogue = DialogueSection {
            empathy_level: "medium".to_string(),
            language: "en".to_string(),
            max_turns: 10,
            max_retries: 3,
            listen_timeout_secs: 1,
            backup_listen_timeout_secs: 1,
        };

        let controller = PhaseController::new(
            AssessmentAgent::new(llm.clone(), "assess".to_string()),
            DialogueAgent::new(llm.clone(), "dialogue".to_string(), catalog.clone()),
            ComfortAgent::new(llm.clone(), "comfort".to_string(), catalog.clone()),
            ComfortAssessmentAgent::new(llm.clone(), "comfort assess".to_string()),
            TriageAgent::new(llm.clone(), "triage".to_string()),
            ActionAgent::new(llm),
            victim,
            Arc::new(bus),
            handoff_tx,
            "action base".to_string(),
            "ugv-test".to_string(),
            &dialogue,
        );
        (controller, handoff_rx)
    }

    fn entry(content: &str, speaker: Speaker) -> ConversationEntry {
        ConversationEntry {
            phase: 1,
            turn: 1,
            speaker,
            content: content.to_string(),
            duration_secs: 0.0,
        }
    }

    #[test]
    fn test_entry_point_needs_sufficient_prior() {
        assert_eq!(PhaseController::determine_entry_point(None), Phase::Initial);

        let mut record = AssessmentRecord::new();
        for field in ["injuries", "breathing", "can_walk", "immediate_danger"] {
            record.set_field(field, "no");
        }
        assert_eq!(
            PhaseController::determine_entry_point(Some(&record)),
            Phase::Comfort
        );

        let sparse = AssessmentRecord::new();
        assert_eq!(
            PhaseController::determine_entry_point(Some(&sparse)),
            Phase::Initial
        );
    }

    #[tokio::test]
    async fn test_abort_override_for_static_danger() {
        let llm = Arc::new(ScriptedLlm::new().with_fallback("{}"));
        let (mut controller, _rx) = controller_with(llm, Arc::new(ScriptedVictim::new()));
        controller
            .assessment_agent
            .record_mut()
            .set_field("immediate_danger", "yes - unstable shelf above");

        let mut decision = ActionDecision::safe_default();
        decision.primary_action = PrimaryAction::AbortAndAlert;

        match controller.handle_phase_1_decision(&decision) {
            StepResult::Exit { reason, next_phase, .. } => {
                assert_eq!(reason, "transition_to_phase_2");
                assert_eq!(next_phase, Some(2));
            }
            StepResult::Continue => panic!("expected exit"),
        }
    }

    #[tokio::test]
    async fn test_abort_honored_for_active_danger() {
        let llm = Arc::new(ScriptedLlm::new().with_fallback("{}"));
        let (mut controller, _rx) = controller_with(llm, Arc::new(ScriptedVictim::new()));
        controller
            .assessment_agent
            .record_mut()
            .set_field("immediate_danger", "yes - fire spreading fast");

        let mut decision = ActionDecision::safe_default();
        decision.primary_action = PrimaryAction::AbortAndAlert;

        match controller.handle_phase_1_decision(&decision) {
            StepResult::Exit { reason, .. } => assert_eq!(reason, "abort_and_alert"),
            StepResult::Continue => panic!("expected exit"),
        }
    }

    #[tokio::test]
    async fn test_transition_blocked_without_mobility() {
        let llm = Arc::new(ScriptedLlm::new().with_fallback("{}"));
        let (mut controller, _rx) = controller_with(llm, Arc::new(ScriptedVictim::new()));
        controller.phase_1_turns = 5;

        let mut decision = ActionDecision::safe_default();
        decision.primary_action = PrimaryAction::TransitionToPhase2;

        assert!(matches!(
            controller.handle_phase_1_decision(&decision),
            StepResult::Continue
        ));

        controller
            .assessment_agent
            .record_mut()
            .set_field("can_walk", "yes");
        assert!(matches!(
            controller.handle_phase_1_decision(&decision),
            StepResult::Exit { reason: "transition_to_phase_2", .. }
        ));
    }

    #[tokio::test]
    async fn test_transition_blocked_before_three_turns() {
        let llm = Arc::new(ScriptedLlm::new().with_fallback("{}"));
        let (mut controller, _rx) = controller_with(llm, Arc::new(ScriptedVictim::new()));
        controller
            .assessment_agent
            .record_mut()
            .set_field("can_walk", "yes");
        controller.phase_1_turns = 2;

        let mut decision = ActionDecision::safe_default();
        decision.primary_action = PrimaryAction::TransitionToPhase2;
        assert!(matches!(
            controller.handle_phase_1_decision(&decision),
            StepResult::Continue
        ));
    }

    #[tokio::test]
    async fn test_phase_2_emergency_urgency_exits() {
        let llm = Arc::new(ScriptedLlm::new().with_fallback("{}"));
        let (controller, _rx) = controller_with(llm, Arc::new(ScriptedVictim::new()));

        let mut decision = ActionDecision::safe_default();
        decision.urgency_level = UrgencyLevel::Critical;
        assert!(matches!(
            controller.handle_phase_2_decision(&decision),
            StepResult::Exit { reason: "emergency_detected", .. }
        ));
    }

    #[tokio::test]
    async fn test_listen_retries_speak_reminder() {
        let llm = Arc::new(ScriptedLlm::new().with_fallback("{}"));
        let victim = Arc::new(ScriptedVictim::new());
        victim.push_silence();
        victim.push("I can hear you");
        let (mut controller, _rx) = controller_with(llm, victim.clone());

        let reply = controller.listen_with_retries().await;
        assert_eq!(reply.as_deref(), Some("I can hear you"));
        // 第一次静默后播了一条提醒
        assert_eq!(victim.spoken().len(), 1);
    }

    #[tokio::test]
    async fn test_listen_gives_up_after_retries() {
        let llm = Arc::new(ScriptedLlm::new().with_fallback("{}"));
        let victim = Arc::new(ScriptedVictim::new());
        let (mut controller, _rx) = controller_with(llm, victim.clone());

        let reply = controller.listen_with_retries().await;
        assert_eq!(reply, None);
        // 三次尝试，两条提醒
        assert_eq!(victim.spoken().len(), 2);
    }

    #[tokio::test]
    async fn test_decision_history_window() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push(r#"{"primary_action": "continue_conversation"}"#);
        let (mut controller, _rx) = controller_with(llm, Arc::new(ScriptedVictim::new()));

        for i in 0..10 {
            controller
                .conversation
                .push(entry(&format!("utterance {}", i), Speaker::Victim));
        }
        let decision = controller.evaluate_action_decision().await.unwrap();
        assert_eq!(decision.primary_action, PrimaryAction::ContinueConversation);
        assert_eq!(controller.decisions.len(), 1);
    }
}
