//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `RESCUE__*` 覆盖（双下划线表示嵌套，
//! 如 `RESCUE__LLM__MODEL=gemma3:12b`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::messages::{Empathy, Language};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub dialogue: DialogueSection,
    #[serde(default)]
    pub robot: RobotSection,
    #[serde(default)]
    pub location: LocationSection,
    #[serde(default)]
    pub prompts: PromptsSection,
}

/// [llm] 段：模型与端点
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 单次补全请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    "gemma3:12b".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_request_timeout() -> u64 {
    180
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// [dialogue] 段：共情、语言与轮次限制
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DialogueSection {
    #[serde(default = "default_empathy")]
    pub empathy_level: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// 单阶段最大轮数
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// 同一问题的最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 等待受困者回复的超时（秒）
    #[serde(default = "default_listen_timeout")]
    pub listen_timeout_secs: u64,
    /// 备用交互树等待回复的超时（秒）
    #[serde(default = "default_backup_listen_timeout")]
    pub backup_listen_timeout_secs: u64,
}

fn default_empathy() -> String {
    "medium".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_max_turns() -> u32 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_listen_timeout() -> u64 {
    20
}

fn default_backup_listen_timeout() -> u64 {
    40
}

impl Default for DialogueSection {
    fn default() -> Self {
        Self {
            empathy_level: default_empathy(),
            language: default_language(),
            max_turns: default_max_turns(),
            max_retries: default_max_retries(),
            listen_timeout_secs: default_listen_timeout(),
            backup_listen_timeout_secs: default_backup_listen_timeout(),
        }
    }
}

/// [robot] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RobotSection {
    #[serde(default = "default_robot_name")]
    pub name: String,
}

fn default_robot_name() -> String {
    "ugv-1".to_string()
}

impl Default for RobotSection {
    fn default() -> Self {
        Self {
            name: default_robot_name(),
        }
    }
}

/// [location] 段：机器人 GPS 与位置描述
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LocationSection {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub description: String,
}

/// [prompts] 段：提示词模板目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsSection {
    #[serde(default = "default_prompts_dir")]
    pub dir: PathBuf,
}

fn default_prompts_dir() -> PathBuf {
    PathBuf::from("prompts")
}

impl Default for PromptsSection {
    fn default() -> Self {
        Self {
            dir: default_prompts_dir(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmSection::default(),
            dialogue: DialogueSection::default(),
            robot: RobotSection::default(),
            location: LocationSection::default(),
            prompts: PromptsSection::default(),
        }
    }
}

impl AppConfig {
    /// 校验枚举字段；返回解析好的语言与共情等级
    pub fn validate(&self) -> Result<(Language, Empathy), String> {
        let language = Language::parse(&self.dialogue.language)
            .ok_or_else(|| format!("invalid language '{}' (expected en/es/fr)", self.dialogue.language))?;
        let empathy = Empathy::parse(&self.dialogue.empathy_level).ok_or_else(|| {
            format!(
                "invalid empathy level '{}' (expected low/medium/high)",
                self.dialogue.empathy_level
            )
        })?;
        if self.dialogue.max_turns == 0 {
            return Err("max_turns must be at least 1".to_string());
        }
        Ok((language, empathy))
    }
}

/// 从 config 目录加载配置，环境变量 RESCUE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 RESCUE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("RESCUE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.model, "gemma3:12b");
        assert_eq!(cfg.llm.base_url, "http://localhost:11434");
        assert_eq!(cfg.dialogue.max_turns, 10);
        assert_eq!(cfg.dialogue.max_retries, 3);
        let (language, empathy) = cfg.validate().unwrap();
        assert_eq!(language, Language::En);
        assert_eq!(empathy, Empathy::Medium);
    }

    #[test]
    fn test_validate_rejects_bad_enums() {
        let mut cfg = AppConfig::default();
        cfg.dialogue.language = "de".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.dialogue.empathy_level = "extreme".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.dialogue.max_turns = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rescue.toml");
        std::fs::write(
            &path,
            "[dialogue]\nlanguage = \"fr\"\nempathy_level = \"high\"\nmax_turns = 5\n",
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.dialogue.language, "fr");
        assert_eq!(cfg.dialogue.max_turns, 5);
        // 未覆盖的键保持默认
        assert_eq!(cfg.llm.model, "gemma3:12b");
    }
}
