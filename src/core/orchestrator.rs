//! 救援对话编排器
//!
//! 负责：启动校验（配置 + LLM 端点探测）、按配置装配全部 Agent 与
//! 阶段控制器，并发运行主链路与备用交互树。主链路正常结束时取消备用
//! 任务；移交发生时由备用树收尾。

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agents::action::ActionAgent;
use crate::agents::assessment::AssessmentAgent;
use crate::agents::comfort::ComfortAgent;
use crate::agents::comfort_assessment::ComfortAssessmentAgent;
use crate::agents::dialogue::DialogueAgent;
use crate::agents::triage::TriageAgent;
use crate::backup::BackupInteraction;
use crate::bus::Bus;
use crate::config::AppConfig;
use crate::controller::{Handoff, PhaseController, WorkflowOutcome, WorkflowResult};
use crate::llm::{LlmClient, LlmError};
use crate::messages::MessageCatalog;
use crate::prompts::PromptStore;
use crate::record::AssessmentRecord;
use crate::victim::VictimChannel;

/// 系统级收尾
pub enum SystemOutcome {
    /// 主链路正常跑完
    Primary(Box<WorkflowResult>),
    /// 主链路失败，备用树完成交互，附最终状态
    Backup(std::collections::BTreeMap<String, String>),
    /// 外部取消，未完成交互
    Cancelled,
}

/// 按错误类型给出排障提示
pub fn troubleshooting_hints(error: &LlmError, cfg: &AppConfig) -> Vec<String> {
    match error {
        LlmError::Connect(_) => vec![
            format!("Cannot reach the LLM endpoint at {}", cfg.llm.base_url),
            "Check that Ollama is running: ollama serve".to_string(),
            "Check llm.base_url in config/default.toml or RESCUE__LLM__BASE_URL".to_string(),
        ],
        LlmError::Timeout => vec![
            "The LLM endpoint did not answer in time".to_string(),
            format!(
                "A cold model can be slow to load; try: ollama run {}",
                cfg.llm.model
            ),
            "Consider raising llm.request_timeout_secs".to_string(),
        ],
        LlmError::Status(code) => vec![
            format!("The LLM endpoint answered with HTTP {}", code),
            format!("Check that the model is pulled: ollama pull {}", cfg.llm.model),
        ],
        LlmError::EmptyCompletion => vec![
            "The LLM endpoint answered but produced no output".to_string(),
        ],
    }
}

/// 装配并并发运行主链路与备用交互树。LLM 端点在首次接触受困者之前
/// 探测一次；不可达时直接以备用树完成整个交互（fail-at-start）。
pub async fn run_rescue_system(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    victim: Arc<dyn VictimChannel>,
    bus: Arc<dyn Bus>,
    cancel: CancellationToken,
    prior: Option<AssessmentRecord>,
) -> anyhow::Result<SystemOutcome> {
    let (language, empathy) = cfg.validate().map_err(|e| anyhow::anyhow!(e))?;
    let catalog = MessageCatalog::new(language, empathy);
    let prompts = PromptStore::new(cfg.prompts.dir.clone(), language);

    let (handoff_tx, handoff_rx) = mpsc::channel(32);

    if let Err(e) = llm.probe().await {
        for hint in troubleshooting_hints(&e, cfg) {
            tracing::error!("{}", hint);
        }
        tracing::error!(error = %e, "LLM endpoint unreachable at startup, activating backup tree");
        let _ = handoff_tx
            .send(Handoff::Activate {
                last_utterance: None,
            })
            .await;
        drop(handoff_tx);

        let mut backup = BackupInteraction::new(
            victim,
            bus,
            cfg.robot.name.clone(),
            language,
            std::time::Duration::from_secs(cfg.dialogue.backup_listen_timeout_secs),
            cfg.dialogue.max_retries as usize,
            backup_questions_dir(&cfg.prompts.dir),
        );
        return Ok(match backup.run(handoff_rx, cancel).await {
            Some(situation) => SystemOutcome::Backup(situation),
            None => SystemOutcome::Cancelled,
        });
    }
    tracing::info!(model = %cfg.llm.model, base_url = %cfg.llm.base_url, "LLM endpoint reachable");

    let mut assessment_agent = AssessmentAgent::new(llm.clone(), prompts.assessment());
    if let (Some(lat), Some(lon)) = (cfg.location.latitude, cfg.location.longitude) {
        assessment_agent
            .record_mut()
            .set_location(lat, lon, &cfg.location.description);
    }

    let mut controller = PhaseController::new(
        assessment_agent,
        DialogueAgent::new(llm.clone(), prompts.dialogue(empathy), catalog),
        ComfortAgent::new(llm.clone(), prompts.comfort(), catalog),
        ComfortAssessmentAgent::new(llm.clone(), prompts.comfort_assessment()),
        TriageAgent::new(llm.clone(), prompts.triage()),
        ActionAgent::new(llm),
        victim.clone(),
        bus.clone(),
        handoff_tx,
        prompts.action(),
        cfg.robot.name.clone(),
        &cfg.dialogue,
    );
    if !cfg.location.description.is_empty() {
        controller.set_situation_context(cfg.location.description.clone());
    }

    let mut backup = BackupInteraction::new(
        victim,
        bus,
        cfg.robot.name.clone(),
        language,
        std::time::Duration::from_secs(cfg.dialogue.backup_listen_timeout_secs),
        cfg.dialogue.max_retries as usize,
        backup_questions_dir(&cfg.prompts.dir),
    );

    let backup_cancel = cancel.child_token();
    let primary = {
        let backup_cancel = backup_cancel.clone();
        async move {
            let outcome = controller.run(prior).await;
            if matches!(outcome, WorkflowOutcome::Completed(_)) {
                // 主链路跑完，待机的备用树可以退出了
                backup_cancel.cancel();
            }
            outcome
        }
    };
    let standby = backup.run(handoff_rx, backup_cancel);

    let (primary_outcome, backup_result) = tokio::join!(primary, standby);

    match (primary_outcome, backup_result) {
        (WorkflowOutcome::Completed(result), _) => Ok(SystemOutcome::Primary(result)),
        (WorkflowOutcome::Failover, Some(situation)) => Ok(SystemOutcome::Backup(situation)),
        (WorkflowOutcome::Failover, None) => Ok(SystemOutcome::Cancelled),
    }
}

/// 备用问题表目录：提示词目录下的 backup_questions/
fn backup_questions_dir(prompts_dir: &std::path::Path) -> PathBuf {
    prompts_dir.join("backup_questions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;
    use crate::victim::ScriptedVictim;

    #[tokio::test]
    async fn test_unreachable_endpoint_starts_backup_directly() {
        let cfg = AppConfig::default();
        let llm = Arc::new(ScriptedLlm::new().with_probe_error(LlmError::Connect("refused".into())));
        let victim = Arc::new(ScriptedVictim::new());
        victim.push("yes I hear you");
        victim.push("no injuries");
        victim.push("no");
        victim.push("no");
        victim.push("yes");
        victim.push("no");
        victim.push("no");

        let (bus, _bus_rx) = crate::bus::ChannelBus::new();
        let outcome = run_rescue_system(
            &cfg,
            llm.clone(),
            victim,
            Arc::new(bus),
            CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

        let SystemOutcome::Backup(situation) = outcome else {
            panic!("expected backup takeover at startup");
        };
        // 从问候节点问起，没有任何 LLM 补全调用
        assert_eq!(
            situation.get("consciousness").map(String::as_str),
            Some("Conscious")
        );
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.dialogue.language = "de".to_string();
        let llm = Arc::new(ScriptedLlm::new());
        let victim = Arc::new(ScriptedVictim::new());
        let (bus, _bus_rx) = crate::bus::ChannelBus::new();
        assert!(run_rescue_system(
            &cfg,
            llm,
            victim,
            Arc::new(bus),
            CancellationToken::new(),
            None,
        )
        .await
        .is_err());
    }

    #[test]
    fn test_hints_name_the_model() {
        let cfg = AppConfig::default();
        let hints = troubleshooting_hints(&LlmError::Status(404), &cfg);
        assert!(hints.iter().any(|h| h.contains("gemma3:12b")));
    }
}
