//! Ollama 后端
//!
//! POST /api/generate（非流式），按配置的超时与模型名；probe 走 /api/tags。

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::llm::{LlmClient, LlmError, SamplingOptions};

/// Ollama 文本补全客户端
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn map_transport_error(e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Connect(e.to_string())
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str, options: &SamplingOptions) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": GenerateOptions {
                temperature: options.temperature,
                top_p: options.top_p,
                num_predict: options.num_predict,
            },
            "stop": options.stop,
        });

        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !resp.status().is_success() {
            return Err(LlmError::Status(resp.status().as_u16()));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Connect(e.to_string()))?;

        if parsed.response.trim().is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        Ok(parsed.response)
    }

    async fn probe(&self) -> Result<(), LlmError> {
        let resp = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(Self::map_transport_error)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::Status(resp.status().as_u16()))
        }
    }
}
