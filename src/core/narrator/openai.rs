use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{NarrationRequest, Narrator};
use crate::core::config::NarratorConfig;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageOwned,
}

#[derive(Deserialize)]
struct ChatMessageOwned {
    #[serde(default)]
    content: Option<String>,
}

/// Narrator backed by any OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAiNarrator {
    base_url: String,
    api_key: String,
    model: String,
    long_text_model: String,
    client: Client,
}

impl OpenAiNarrator {
    pub fn new(config: &NarratorConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            long_text_model: config.long_text_model.clone(),
            client: Client::new(),
        }
    }

    fn model_for(&self, long_text: bool) -> &str {
        if long_text {
            &self.long_text_model
        } else {
            &self.model
        }
    }
}

#[async_trait]
impl Narrator for OpenAiNarrator {
    async fn summarize(&self, request: &NarrationRequest) -> Result<String> {
        let model = self.model_for(request.long_text);
        let body = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
        };

        debug!("Narrator request to {} ({})", self.base_url, model);
        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            return Err(anyhow!(
                "Narrator API error ({}): {}",
                status,
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: ChatResponse = res.json().await?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}
