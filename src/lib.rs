//! Rescue Dialog - 灾后救援机器人多阶段对话系统
//!
//! 模块划分：
//! - **agents**: 六个对话 Agent（评估 / 对话 / 安抚 / 安抚评估 / 检伤 / 行动决策）
//! - **backup**: 备用交互树（主链路失败后的确定性问答）
//! - **bus**: 消息总线抽象与信封格式（指挥中心告警、状态上报）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **controller**: 阶段控制器（Phase 1 评估 / Phase 2 安抚的回合状态机）
//! - **core**: 编排、启动校验与优雅关闭
//! - **decision**: 行动决策的结构化表示与安全默认
//! - **llm**: LLM 客户端抽象与实现（Ollama / Scripted）
//! - **messages**: 多语言固定话术目录
//! - **prompts**: 提示词模板库（文件覆盖 + 内置默认）
//! - **record**: 评估与安抚记录（字段合并、完整度判定）
//! - **victim**: 受困者语音通道抽象

pub mod agents;
pub mod backup;
pub mod bus;
pub mod config;
pub mod controller;
pub mod core;
pub mod decision;
pub mod llm;
pub mod messages;
pub mod observability;
pub mod prompts;
pub mod record;
pub mod victim;
