//! 备用交互树：主链路 LLM 不可用时的固定问答
//!
//! 待机期间持续镜像主链路的评估快照；被激活后按决策树逐节点提问，
//! 跳过已有答案的节点，每个节点问完都向指挥中心上报一次状态。
//! 节点顺序：0 意识、1 伤情、2 呼吸、3 受困、4 行走、5 环境危险、
//! 6 周围人员，7/8 为机器人动作终点（等待救援 / 引导撤离）。

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bus::{topics, Bus, Envelope};
use crate::controller::Handoff;
use crate::messages::Language;
use crate::record::UNKNOWN;
use crate::victim::VictimChannel;

const TERMINAL_WAIT: u8 = 7;
const TERMINAL_GUIDE: u8 = 8;

/// 节点与字段的对应关系（终点节点不落字段）
const NODE_FIELDS: [(u8, &str); 7] = [
    (0, "consciousness"),
    (1, "injuries"),
    (2, "breathing"),
    (3, "stuck_trapped"),
    (4, "can_walk"),
    (5, "immediate_danger"),
    (6, "people_in_surroundings"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseStatus {
    Positive,
    Negative,
    Unknown,
}

#[derive(Debug, Deserialize)]
struct QuestionFile {
    questions: BTreeMap<String, serde_json::Value>,
}

pub struct BackupInteraction {
    victim: Arc<dyn VictimChannel>,
    bus: Arc<dyn Bus>,
    robot_name: String,
    language: Language,
    listen_timeout: Duration,
    max_retries: usize,
    questions_dir: PathBuf,

    questions: BTreeMap<u8, String>,
    situation: BTreeMap<String, String>,
    occupied: BTreeSet<u8>,
    mobility: Option<bool>,
}

impl BackupInteraction {
    pub fn new(
        victim: Arc<dyn VictimChannel>,
        bus: Arc<dyn Bus>,
        robot_name: impl Into<String>,
        language: Language,
        listen_timeout: Duration,
        max_retries: usize,
        questions_dir: impl Into<PathBuf>,
    ) -> Self {
        let mut situation = BTreeMap::new();
        situation.insert("priority".to_string(), "Yellow".to_string());
        Self {
            victim,
            bus,
            robot_name: robot_name.into(),
            language,
            listen_timeout,
            max_retries,
            questions_dir: questions_dir.into(),
            questions: BTreeMap::new(),
            situation,
            occupied: BTreeSet::new(),
            mobility: None,
        }
    }

    /// 待机直到被激活，然后跑完交互树。返回最终状态；被取消时返回 None。
    pub async fn run(
        &mut self,
        mut handoff_rx: mpsc::Receiver<Handoff>,
        cancel: CancellationToken,
    ) -> Option<BTreeMap<String, String>> {
        self.load_questions();
        tracing::info!("backup interaction on standby");

        let last_utterance = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("backup interaction cancelled");
                    return None;
                }
                message = handoff_rx.recv() => match message {
                    Some(Handoff::Snapshot(snapshot)) => self.mirror_snapshot(&snapshot),
                    Some(Handoff::Activate { last_utterance }) => break last_utterance,
                    None => {
                        tracing::info!("handoff channel closed, backup never activated");
                        return None;
                    }
                }
            }
        };

        let last_answer = match last_utterance {
            Some(utterance) => {
                tracing::warn!(last_utterance = %utterance, "backup activated mid-conversation");
                // 主链路能收到回应说明受困者有意识
                self.situation
                    .insert("consciousness".to_string(), "Conscious".to_string());
                self.identify_occupied_nodes();
                self.analyze_response(&utterance)
            }
            None => {
                tracing::warn!("backup activated before first response");
                ResponseStatus::Positive
            }
        };

        Some(self.interaction_tree(last_answer).await)
    }

    async fn interaction_tree(&mut self, mut last_answer: ResponseStatus) -> BTreeMap<String, String> {
        let mut node: i32 = -1;
        loop {
            node = self.select_node(node, last_answer);
            last_answer = self.interact(node as u8).await;
            if node as u8 == TERMINAL_WAIT || node as u8 == TERMINAL_GUIDE {
                break;
            }
        }
        self.situation.clone()
    }

    /// 跳过已占用节点并应用分支规则
    fn select_node(&mut self, last_node: i32, last_answer: ResponseStatus) -> i32 {
        // 无意识则跳过伤情描述，直接确认呼吸
        if last_node == 0 && last_answer == ResponseStatus::Negative {
            return self.skip_occupied(2);
        }
        // 受困意味着无法行走，跳过行走节点
        if last_node == 3 && last_answer == ResponseStatus::Positive {
            self.mobility = Some(false);
            self.situation
                .insert("can_walk".to_string(), "Cannot walk".to_string());
            self.situation
                .insert("robot_action".to_string(), "Wait for responder".to_string());
            return self.skip_occupied(5);
        }
        if last_node == 4 && last_answer == ResponseStatus::Positive {
            self.mobility = Some(true);
        }
        if last_node == 6 {
            return if self.mobility == Some(true) {
                TERMINAL_GUIDE as i32
            } else {
                TERMINAL_WAIT as i32
            };
        }
        self.skip_occupied(last_node + 1)
    }

    fn skip_occupied(&self, candidate: i32) -> i32 {
        let mut node = candidate;
        while self.occupied.contains(&(node as u8)) {
            node += 1;
        }
        node
    }

    /// 单节点问答；终点节点只播报不提问
    async fn interact(&mut self, node: u8) -> ResponseStatus {
        let question = self
            .questions
            .get(&node)
            .cloned()
            .unwrap_or_else(|| "Can you hear me?".to_string());

        let status = if node >= TERMINAL_WAIT {
            self.victim.speak(&question, true).await;
            ResponseStatus::Positive
        } else {
            self.victim.speak(&question, false).await;
            let mut status = ResponseStatus::Unknown;
            let mut response = None;
            for attempt in 0..self.max_retries {
                match self.victim.listen(self.listen_timeout).await {
                    Some(text) => {
                        response = Some(text);
                        break;
                    }
                    None if attempt + 1 < self.max_retries => {
                        self.victim.speak(self.repeat_prompt(), false).await;
                    }
                    None => {}
                }
            }
            if let Some(text) = response.as_deref() {
                status = self.analyze_response(text);
            } else {
                tracing::warn!(node, "no response at backup node, moving on");
            }
            self.apply_answer(node, response.as_deref().unwrap_or(""), status);
            status
        };

        self.publish_status().await;
        status
    }

    fn apply_answer(&mut self, node: u8, response: &str, status: ResponseStatus) {
        let positive = status == ResponseStatus::Positive;
        match node {
            1 => {
                if !response.is_empty() {
                    self.situation
                        .insert("injuries".to_string(), response.to_string());
                }
                self.situation
                    .insert("consciousness".to_string(), "Conscious".to_string());
            }
            2 => {
                self.situation.insert(
                    "breathing".to_string(),
                    if positive { "Trouble Breathing" } else { "No trouble" }.to_string(),
                );
            }
            3 => {
                if positive {
                    self.situation
                        .insert("stuck_trapped".to_string(), "Possibly stuck".to_string());
                } else {
                    self.situation.insert(
                        "stuck_trapped".to_string(),
                        "Possibly not stuck".to_string(),
                    );
                }
            }
            4 => {
                if positive {
                    self.situation
                        .insert("can_walk".to_string(), "Can walk".to_string());
                    self.situation
                        .insert("robot_action".to_string(), "Guide victim".to_string());
                } else {
                    self.situation
                        .insert("can_walk".to_string(), "Cannot walk".to_string());
                    self.situation
                        .insert("robot_action".to_string(), "Wait for responder".to_string());
                }
            }
            5 => {
                self.situation.insert(
                    "immediate_danger".to_string(),
                    if positive { "Danger nearby" } else { "Not clear" }.to_string(),
                );
            }
            6 => {
                self.situation.insert(
                    "people_in_surroundings".to_string(),
                    if positive { "Others present" } else { "None nearby" }.to_string(),
                );
            }
            _ => {}
        }
    }

    /// 把主链路快照镜像到本地状态（unknown 视为未评估）
    fn mirror_snapshot(&mut self, snapshot: &BTreeMap<String, String>) {
        for (field, value) in snapshot {
            if value != UNKNOWN {
                self.situation.insert(field.clone(), value.clone());
            }
        }
        tracing::debug!(fields = self.situation.len(), "snapshot mirrored");
    }

    /// 激活时标记已有答案的节点，断点续问。
    /// 中途接手时 consciousness 已确认，问候节点一并跳过。
    fn identify_occupied_nodes(&mut self) {
        for (node, field) in NODE_FIELDS {
            if self.situation.contains_key(field) {
                self.occupied.insert(node);
            }
        }
        if let Some(can_walk) = self.situation.get("can_walk") {
            let value = can_walk.to_lowercase();
            self.mobility = Some(value.contains("yes") || value.contains("can walk"));
        }
        tracing::info!(occupied = ?self.occupied, "resuming with occupied nodes");
    }

    fn analyze_response(&self, response: &str) -> ResponseStatus {
        let response = response.to_lowercase();
        let (negative, positives): (&str, &[&str]) = match self.language {
            Language::En => ("no", &["yes", "i can"]),
            Language::Fr => ("non", &["oui", "je peux"]),
            Language::Es => ("no", &["sí", "si", "puedo"]),
        };
        if response.contains(negative) {
            return ResponseStatus::Negative;
        }
        if positives.iter().any(|p| response.contains(p)) {
            return ResponseStatus::Positive;
        }
        ResponseStatus::Unknown
    }

    fn repeat_prompt(&self) -> &'static str {
        match self.language {
            Language::En => "I didn't catch that. Could you please repeat?",
            Language::Es => "No le he entendido. ¿Podría repetirlo, por favor?",
            Language::Fr => "Je n'ai pas compris. Pourriez-vous répéter, s'il vous plaît ?",
        }
    }

    async fn publish_status(&self) {
        let data: serde_json::Map<String, serde_json::Value> = self
            .situation
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        let envelope = Envelope::new(
            &self.robot_name,
            "Creation",
            topics::STATUS_REPORT,
            serde_json::Value::Object(data),
        );
        if let Err(e) = self.bus.publish(topics::STATUS_REPORT, &envelope).await {
            tracing::warn!(error = %e, "status report publish failed");
        }
    }

    /// 读取 backup_<lang>.json，缺失或损坏时退回内置问题表
    fn load_questions(&mut self) {
        let path = self
            .questions_dir
            .join(format!("backup_{}.json", self.language.as_str()));
        match Self::read_question_file(&path) {
            Ok(questions) => {
                self.questions = questions;
                tracing::info!(path = %path.display(), "backup questions loaded");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "using built-in backup questions");
                self.questions = builtin_questions(self.language);
            }
        }
    }

    fn read_question_file(path: &Path) -> Result<BTreeMap<u8, String>, String> {
        let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let file: QuestionFile = serde_json::from_str(&raw).map_err(|e| e.to_string())?;

        let mut questions = BTreeMap::new();
        for (node, field) in NODE_FIELDS {
            let value = file
                .questions
                .get(field)
                .and_then(|v| v.as_str())
                .ok_or_else(|| format!("missing question for '{}'", field))?;
            questions.insert(node, value.to_string());
        }
        let actions = file
            .questions
            .get("robot_action")
            .and_then(|v| v.as_array())
            .ok_or_else(|| "missing 'robot_action' question pair".to_string())?;
        if actions.len() < 2 {
            return Err("'robot_action' must hold two messages".to_string());
        }
        for (i, node) in [TERMINAL_WAIT, TERMINAL_GUIDE].iter().enumerate() {
            let text = actions[i]
                .as_str()
                .ok_or_else(|| "'robot_action' entries must be strings".to_string())?;
            questions.insert(*node, text.to_string());
        }
        Ok(questions)
    }
}

fn builtin_questions(language: Language) -> BTreeMap<u8, String> {
    let entries: [(u8, &str); 9] = match language {
        Language::En => [
            (0, "Hello, this is a rescue robot. Can you hear me? Please answer yes or no."),
            (1, "Are you injured? Please describe any injuries."),
            (2, "Are you having trouble breathing?"),
            (3, "Are you stuck or trapped by anything?"),
            (4, "Can you walk on your own?"),
            (5, "Is there any danger near you, like fire, smoke or water?"),
            (6, "Is there anyone else near you?"),
            (7, "Please stay where you are. Rescuers are on their way to you."),
            (8, "Please follow me. I will guide you to the safe zone."),
        ],
        Language::Es => [
            (0, "Hola, soy un robot de rescate. ¿Puede oírme? Responda sí o no."),
            (1, "¿Está herido? Describa sus heridas, por favor."),
            (2, "¿Tiene dificultad para respirar?"),
            (3, "¿Está atrapado o atascado por algo?"),
            (4, "¿Puede caminar por sí mismo?"),
            (5, "¿Hay algún peligro cerca, como fuego, humo o agua?"),
            (6, "¿Hay alguien más cerca de usted?"),
            (7, "Quédese donde está. Los rescatistas van en camino."),
            (8, "Sígame, por favor. Le guiaré hasta la zona segura."),
        ],
        Language::Fr => [
            (0, "Bonjour, je suis un robot de secours. M'entendez-vous ? Répondez oui ou non."),
            (1, "Êtes-vous blessé ? Décrivez vos blessures, s'il vous plaît."),
            (2, "Avez-vous du mal à respirer ?"),
            (3, "Êtes-vous coincé ou bloqué par quelque chose ?"),
            (4, "Pouvez-vous marcher seul ?"),
            (5, "Y a-t-il un danger près de vous, comme du feu, de la fumée ou de l'eau ?"),
            (6, "Y a-t-il quelqu'un d'autre près de vous ?"),
            (7, "Restez où vous êtes. Les secours arrivent."),
            (8, "Suivez-moi, s'il vous plaît. Je vais vous guider vers la zone sûre."),
        ],
    };
    entries
        .iter()
        .map(|(node, text)| (*node, text.to_string()))
        .collect()
}
