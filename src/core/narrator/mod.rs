pub mod openai;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use openai::OpenAiNarrator;

/// One summarization request. `long_text` selects the long-context model.
#[derive(Debug, Clone)]
pub struct NarrationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub long_text: bool,
}

#[async_trait]
pub trait Narrator: Send + Sync {
    async fn summarize(&self, request: &NarrationRequest) -> Result<String>;
}

/// Bounds every call of the inner narrator; expiry is reported as an error
/// so callers retry it like any other transient failure.
pub struct TimeoutNarrator {
    inner: Arc<dyn Narrator>,
    timeout: Duration,
}

impl TimeoutNarrator {
    pub fn new(inner: Arc<dyn Narrator>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Narrator for TimeoutNarrator {
    async fn summarize(&self, request: &NarrationRequest) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.inner.summarize(request)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "narrator timed out after {}s",
                self.timeout.as_secs_f64()
            )),
        }
    }
}

#[cfg(test)]
pub use scripted::ScriptedNarrator;
