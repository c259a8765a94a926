//! Rescue Dialog - 灾后救援机器人对话系统
//!
//! 入口：加载配置、初始化日志、校验 LLM 端点，然后并发运行
//! 阶段控制器与备用交互树。受困者回应从标准输入读取（一行一条）。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncBufReadExt;

use rescue_dialog::bus::LogBus;
use rescue_dialog::config::load_config;
use rescue_dialog::core::{
    run_rescue_system, run_with_graceful_shutdown, ShutdownManager, SystemOutcome,
};
use rescue_dialog::llm::OllamaClient;
use rescue_dialog::victim::PipedVictimChannel;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rescue_dialog::observability::init();

    // 可选的第一个参数：配置文件路径
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load configuration")?;

    let llm = Arc::new(OllamaClient::new(
        cfg.llm.base_url.clone(),
        cfg.llm.model.clone(),
        cfg.llm.request_timeout_secs,
    ));

    // 受困者通道：机器人话术走日志，回应从 stdin 一行行喂入
    let (victim, reply_tx) = PipedVictimChannel::new();
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if reply_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let shutdown = Arc::new(ShutdownManager::new());
    let cancel = shutdown.token();

    let app = async move {
        let outcome = run_rescue_system(
            &cfg,
            llm,
            Arc::new(victim),
            Arc::new(LogBus),
            cancel,
            None,
        )
        .await;

        match outcome {
            Ok(SystemOutcome::Primary(result)) => {
                tracing::info!(
                    exit_reason = %result.exit_reason,
                    total_turns = result.total_turns,
                    triage = result.triage_priority.as_str(),
                    "Dialogue workflow completed"
                );
                println!("{}", result.rescue_report);
            }
            Ok(SystemOutcome::Backup(situation)) => {
                tracing::warn!("Primary workflow failed, backup interaction completed");
                println!("Backup interaction result:");
                for (field, value) in &situation {
                    println!("  {}: {}", field, value);
                }
            }
            Ok(SystemOutcome::Cancelled) => {
                tracing::info!("Rescue system cancelled before completion");
            }
            Err(e) => {
                tracing::error!("Rescue system failed: {:#}", e);
            }
        }
    };

    run_with_graceful_shutdown(shutdown, app).await;
    Ok(())
}
