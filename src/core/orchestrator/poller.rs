use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::config::PollConfig;

const BACKOFF_FACTOR: f64 = 1.5;
const MAX_SLEEP: Duration = Duration::from_secs(3600);
const FALLBACK_SLEEP: Duration = Duration::from_secs(60);

/// Seconds to a sleep `Duration`, never panicking on out-of-range values.
fn sleep_for(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).map_or(FALLBACK_SLEEP, |d| d.min(MAX_SLEEP))
}

/// Sleep interval of one poll loop: reset on work, stretched on idle polls.
#[derive(Debug, Clone)]
pub struct Backoff {
    poll: PollConfig,
    current: f64,
}

impl Backoff {
    pub fn new(poll: PollConfig) -> Self {
        Self {
            poll,
            current: poll.base_secs,
        }
    }

    pub fn on_work(&mut self) -> Duration {
        self.current = self.poll.base_secs;
        sleep_for(self.current)
    }

    /// Stretches the interval first, so the first idle sleep is already
    /// 1.5x the base.
    pub fn on_idle(&mut self) -> Duration {
        self.current = (self.current * BACKOFF_FACTOR).min(self.poll.max_secs);
        sleep_for(self.current)
    }

    pub fn on_error(&self) -> Duration {
        sleep_for(self.poll.error_secs)
    }

    #[cfg(test)]
    pub fn current_secs(&self) -> f64 {
        self.current
    }
}

/// One independent worker of the orchestrator. `poll_once` handles every
/// item currently eligible and reports how much work it saw; any non-zero
/// count resets the backoff.
#[async_trait]
pub trait PollWorker: Send + Sync {
    fn name(&self) -> &'static str;
    async fn poll_once(&self) -> Result<usize>;
}

/// Runs `worker` until `cancel` fires. Errors never end the loop.
pub async fn run_poll_loop(
    worker: Arc<dyn PollWorker>,
    poll: PollConfig,
    cancel: CancellationToken,
) {
    let mut backoff = Backoff::new(poll);
    info!("Worker {} started", worker.name());

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = worker.poll_once() => outcome,
        };

        let sleep = match outcome {
            Ok(0) => {
                let sleep = backoff.on_idle();
                debug!("Worker {} idle, sleeping {:.1}s", worker.name(), sleep.as_secs_f64());
                sleep
            }
            Ok(n) => {
                debug!("Worker {} found {} item(s)", worker.name(), n);
                backoff.on_work()
            }
            Err(e) => {
                error!("Worker {} poll failed: {:#}", worker.name(), e);
                backoff.on_error()
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(sleep) => {}
        }
    }

    info!("Worker {} stopped", worker.name());
}
