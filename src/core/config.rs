use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_FILE: &str = "triage.toml";

/// Upper bound for any poll interval, in seconds.
pub const MAX_POLL_SECS: f64 = 3600.0;

/// Resolves the data directory: `TRIAGE_DATA_DIR`, else `~/.triage`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TRIAGE_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".triage")
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriageConfig {
    /// Ceiling on investigation rounds per event.
    #[serde(default = "default_max_round")]
    pub max_round: u32,

    #[serde(default)]
    pub narrator: NarratorConfig,

    #[serde(default)]
    pub polls: WorkerPolls,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NarratorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for long-text requests (execution and round digests).
    #[serde(default = "default_long_text_model")]
    pub long_text_model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PollConfig {
    pub base_secs: f64,
    pub max_secs: f64,
    pub error_secs: f64,
}

impl PollConfig {
    pub const fn new(base_secs: f64, max_secs: f64, error_secs: f64) -> Self {
        Self {
            base_secs,
            max_secs,
            error_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerPolls {
    #[serde(default = "default_execution_summarizer_poll")]
    pub execution_summarizer: PollConfig,
    #[serde(default = "default_command_status_poll")]
    pub command_status: PollConfig,
    #[serde(default = "default_task_status_poll")]
    pub task_status: PollConfig,
    #[serde(default = "default_round_detector_poll")]
    pub round_detector: PollConfig,
    #[serde(default = "default_summary_scheduler_poll")]
    pub summary_scheduler: PollConfig,
    #[serde(default = "default_event_summarizer_poll")]
    pub event_summarizer: PollConfig,
    #[serde(default = "default_round_advancer_poll")]
    pub round_advancer: PollConfig,
}

fn default_max_round() -> u32 {
    3
}
fn default_base_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string()
}
fn default_model() -> String {
    "qwen-plus".to_string()
}
fn default_long_text_model() -> String {
    "qwen-long".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_execution_summarizer_poll() -> PollConfig {
    PollConfig::new(5.0, 10.0, 5.0)
}
fn default_command_status_poll() -> PollConfig {
    PollConfig::new(10.0, 15.0, 10.0)
}
fn default_task_status_poll() -> PollConfig {
    PollConfig::new(15.0, 20.0, 15.0)
}
fn default_round_detector_poll() -> PollConfig {
    PollConfig::new(5.0, 10.0, 5.0)
}
fn default_summary_scheduler_poll() -> PollConfig {
    PollConfig::new(5.0, 10.0, 5.0)
}
fn default_event_summarizer_poll() -> PollConfig {
    PollConfig::new(5.0, 10.0, 60.0)
}
fn default_round_advancer_poll() -> PollConfig {
    PollConfig::new(5.0, 10.0, 5.0)
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            long_text_model: default_long_text_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for WorkerPolls {
    fn default() -> Self {
        Self {
            execution_summarizer: default_execution_summarizer_poll(),
            command_status: default_command_status_poll(),
            task_status: default_task_status_poll(),
            round_detector: default_round_detector_poll(),
            summary_scheduler: default_summary_scheduler_poll(),
            event_summarizer: default_event_summarizer_poll(),
            round_advancer: default_round_advancer_poll(),
        }
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            max_round: default_max_round(),
            narrator: NarratorConfig::default(),
            polls: WorkerPolls::default(),
        }
    }
}

impl TriageConfig {
    /// Reads `<data_dir>/triage.toml` (defaults when absent), then applies
    /// environment overrides and validates.
    pub async fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let config_path = data_dir.as_ref().join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| format!("reading {}", config_path.display()))?;
            toml::from_str::<TriageConfig>(&content)
                .with_context(|| format!("parsing {}", config_path.display()))?
        } else {
            info!("No {} found, using defaults.", CONFIG_FILE);
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        info!(
            "Loaded config: max_round={}, model={}, long_text_model={}",
            config.max_round, config.narrator.model, config.narrator.long_text_model
        );
        Ok(config)
    }

    /// Environment names follow the deployment convention (`EVENT_MAX_ROUND`,
    /// `LLM_*`). Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("EVENT_MAX_ROUND") {
            self.max_round = v
                .trim()
                .parse()
                .with_context(|| format!("EVENT_MAX_ROUND is not an integer: {}", v))?;
        }
        if let Some(v) = get("LLM_BASE_URL") {
            self.narrator.base_url = v;
        }
        if let Some(v) = get("LLM_API_KEY") {
            self.narrator.api_key = v;
        }
        if let Some(v) = get("LLM_MODEL") {
            self.narrator.model = v;
        }
        if let Some(v) = get("LLM_MODEL_LONG_TEXT") {
            self.narrator.long_text_model = v;
        }
        if let Some(v) = get("LLM_TIMEOUT_SECS") {
            self.narrator.timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("LLM_TIMEOUT_SECS is not an integer: {}", v))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_round < 1 {
            bail!("max_round must be at least 1");
        }
        if self.narrator.timeout_secs == 0 {
            bail!("narrator timeout_secs must be positive");
        }
        let polls = [
            ("execution_summarizer", &self.polls.execution_summarizer),
            ("command_status", &self.polls.command_status),
            ("task_status", &self.polls.task_status),
            ("round_detector", &self.polls.round_detector),
            ("summary_scheduler", &self.polls.summary_scheduler),
            ("event_summarizer", &self.polls.event_summarizer),
            ("round_advancer", &self.polls.round_advancer),
        ];
        for (name, poll) in polls {
            for (field, secs) in [
                ("base_secs", poll.base_secs),
                ("max_secs", poll.max_secs),
                ("error_secs", poll.error_secs),
            ] {
                if !secs.is_finite() || secs <= 0.0 || secs > MAX_POLL_SECS {
                    bail!(
                        "polls.{}: {} must be in (0, {}], got {}",
                        name,
                        field,
                        MAX_POLL_SECS,
                        secs
                    );
                }
            }
            if poll.max_secs < poll.base_secs {
                bail!("polls.{}: max_secs must be >= base_secs", name);
            }
        }
        Ok(())
    }
}
