//! Lazily launched, shared browser session.

use async_trait::async_trait;
use igsms_core::{
    error::IgsmsError,
    traits::{Browser, PageDriver},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::launcher::{LaunchOptions, LaunchedBrowser};
use crate::page::CdpPage;

struct Running {
    process: LaunchedBrowser,
    page: Arc<CdpPage>,
}

/// One Chromium process and one page, started on first use.
///
/// If the process or its DevTools socket dies, the next [`Browser::page`]
/// call relaunches it against the same profile directory.
pub struct BrowserSession {
    options: LaunchOptions,
    inner: Mutex<Option<Running>>,
}

impl BrowserSession {
    pub fn new(options: LaunchOptions) -> Self {
        Self {
            options,
            inner: Mutex::new(None),
        }
    }

    async fn launch(&self) -> Result<Running, IgsmsError> {
        let mut process = LaunchedBrowser::launch(&self.options).await?;
        let attached = async {
            let ws_url = process.page_ws_url().await?;
            CdpPage::attach(
                &ws_url,
                (self.options.viewport_width, self.options.viewport_height),
                &self.options.user_agent,
            )
            .await
        }
        .await;

        match attached {
            Ok(page) => Ok(Running {
                process,
                page: Arc::new(page),
            }),
            Err(e) => {
                if let Err(kill_err) = process.shutdown().await {
                    warn!("failed to stop browser after attach error: {kill_err}");
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Browser for BrowserSession {
    async fn page(&self) -> Result<Arc<dyn PageDriver>, IgsmsError> {
        let mut guard = self.inner.lock().await;

        if let Some(running) = guard.as_mut() {
            if running.process.is_running() && !running.page.is_closed() {
                let page: Arc<dyn PageDriver> = running.page.clone();
                return Ok(page);
            }
            warn!("browser session lost, relaunching");
            if let Err(e) = running.process.shutdown().await {
                warn!("failed to stop stale browser: {e}");
            }
            *guard = None;
        }

        let running = self.launch().await?;
        info!("browser session ready");
        let page: Arc<dyn PageDriver> = running.page.clone();
        *guard = Some(running);
        Ok(page)
    }

    async fn is_open(&self) -> bool {
        match self.inner.lock().await.as_mut() {
            Some(running) => running.process.is_running() && !running.page.is_closed(),
            None => false,
        }
    }

    async fn close(&self) -> Result<(), IgsmsError> {
        if let Some(mut running) = self.inner.lock().await.take() {
            running.process.shutdown().await?;
            info!("browser session closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use igsms_core::config::BrowserConfig;

    fn session_with_missing_binary() -> BrowserSession {
        let cfg = BrowserConfig {
            executable: "/nonexistent/chromium-igsms".to_string(),
            ..Default::default()
        };
        let tmp = std::env::temp_dir().join("igsms-session-test");
        BrowserSession::new(LaunchOptions::from_config(&cfg, tmp))
    }

    #[tokio::test]
    async fn test_new_session_is_not_open() {
        let session = session_with_missing_binary();
        assert!(!session.is_open().await);
    }

    #[tokio::test]
    async fn test_page_fails_without_browser_binary() {
        let session = session_with_missing_binary();
        let err = session.page().await.err().unwrap();
        assert!(matches!(err, IgsmsError::Browser(_)));
        assert!(!session.is_open().await);
    }

    #[tokio::test]
    async fn test_close_without_launch_is_noop() {
        let session = session_with_missing_binary();
        assert!(session.close().await.is_ok());
    }
}
