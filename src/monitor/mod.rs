//! Background watcher for the Instagram thread.
//!
//! - `login`: logged-in heuristic and the open-and-wait sequence
//! - `extract`: newest visible message and its synthetic id
//! - `poll`: the jittered loop and a single poll step

mod extract;
mod login;
mod poll;


pub use login::is_logged_in;

#[cfg(test)]
pub(crate) use extract::{latest_message, synthetic_id};
#[cfg(test)]
pub(crate) use login::{open_thread_and_wait_ready, MAIN_SELECTOR};
#[cfg(test)]
pub(crate) use poll::{next_delay, poll_once, PollOutcome};

use igsms_core::{config::Config, error::IgsmsError, traits::Browser};
use igsms_memory::Store;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::notifier::Notifier;

/// Monitor tuning, resolved from config.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub thread_url: String,
    pub poll_seconds: u64,
    pub login_wait_attempts: u32,
    pub login_wait_interval: Duration,
    /// Pause after navigation so the client-side app can render.
    pub render_grace: Duration,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            thread_url: config.instagram.thread_url.trim().to_string(),
            poll_seconds: config.instagram.poll_seconds,
            login_wait_attempts: config.instagram.login_wait_attempts,
            login_wait_interval: Duration::from_secs(config.instagram.login_wait_secs),
            render_grace: Duration::from_millis(1500),
        }
    }
}

/// Result of a start/stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    Started,
    AlreadyRunning,
    Stopped,
}

impl MonitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::AlreadyRunning => "already_running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the loop task needs, cloned into it on start.
#[derive(Clone)]
pub(crate) struct MonitorContext {
    pub browser: Arc<dyn Browser>,
    pub store: Store,
    pub notifier: Notifier,
    pub settings: MonitorSettings,
}

/// Owns the loop task. At most one loop runs at a time.
pub struct Monitor {
    ctx: MonitorContext,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    pub fn new(
        browser: Arc<dyn Browser>,
        store: Store,
        notifier: Notifier,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            ctx: MonitorContext {
                browser,
                store,
                notifier,
                settings,
            },
            task: Mutex::new(None),
        }
    }

    pub fn browser(&self) -> &Arc<dyn Browser> {
        &self.ctx.browser
    }

    /// Spawn the loop unless one is already alive.
    pub async fn start(&self) -> Result<MonitorStatus, IgsmsError> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(MonitorStatus::AlreadyRunning);
        }

        self.ctx.store.set_running(true).await?;
        let ctx = self.ctx.clone();
        *task = Some(tokio::spawn(poll::run(ctx)));
        info!("monitor started");
        Ok(MonitorStatus::Started)
    }

    /// Clear the running flag and cancel the loop.
    pub async fn stop(&self) -> Result<MonitorStatus, IgsmsError> {
        let mut task = self.task.lock().await;
        self.ctx.store.set_running(false).await?;
        if let Some(handle) = task.take() {
            if !handle.is_finished() {
                handle.abort();
            }
            // Cancellation surfaces as a JoinError; nothing to report.
            let _ = handle.await;
            info!("monitor stopped");
        }
        Ok(MonitorStatus::Stopped)
    }

    /// Cancel the loop for process exit. The persisted flag is left alone so
    /// the next boot can resume.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Whether a loop task exists and has not finished.
    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Restart the loop if the persisted flag says it was running.
    pub async fn resume_if_flagged(&self) -> Result<Option<MonitorStatus>, IgsmsError> {
        if !self.ctx.store.is_running().await? {
            return Ok(None);
        }
        info!("resuming monitor from persisted state");
        self.start().await.map(Some)
    }
}
