//! LLM 层：客户端抽象与实现（Ollama / Scripted Mock）与 JSON 提取

pub mod jsonx;
pub mod mock;
pub mod ollama;
pub mod traits;

pub use jsonx::extract_json_object;
pub use mock::ScriptedLlm;
pub use ollama::OllamaClient;
pub use traits::{LlmClient, LlmError, SamplingOptions};
