//! In-process fakes for the channel, browser and page.

use async_trait::async_trait;
use igsms_core::{
    config::Config,
    error::IgsmsError,
    message::OutgoingMessage,
    traits::{Browser, Channel, PageDriver},
};
use igsms_memory::{AuditLogger, Store};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crate::monitor::{MonitorSettings, MAIN_SELECTOR};
use crate::notifier::Notifier;

pub const OWNER: &str = "+15551234567";
pub const THREAD_URL: &str = "https://www.instagram.com/direct/t/1234567890/";
pub const LOGIN_URL: &str = "https://www.instagram.com/accounts/login/";

/// Records every message instead of sending it.
#[derive(Default)]
pub struct MockChannel {
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub fail: bool,
}

impl MockChannel {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), IgsmsError> {
        if self.fail {
            return Err(IgsmsError::Sms("gateway down".to_string()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Scriptable page state.
#[derive(Default)]
pub struct PageState {
    pub url: String,
    pub main_present: bool,
    /// Every navigation lands on the login page.
    pub redirect_to_login: bool,
    /// On this many-th URL read the user is considered logged in.
    pub login_after_url_reads: Option<usize>,
    pub url_reads: usize,
    pub main_checks: usize,
    pub texts: Vec<String>,
    pub texts_error: Option<String>,
    pub visited: Vec<String>,
    pub clicks: Vec<(f64, f64)>,
    pub typed: Vec<String>,
    pub keys: Vec<String>,
}

#[derive(Default)]
pub struct MockPage {
    pub state: Mutex<PageState>,
}

impl MockPage {
    /// A page that is logged in and shows `texts` in the thread.
    pub fn logged_in(texts: &[&str]) -> Self {
        let page = Self::default();
        {
            let mut s = page.state.lock().unwrap();
            s.main_present = true;
            s.texts = texts.iter().map(|t| t.to_string()).collect();
        }
        page
    }

    pub fn set_texts(&self, texts: &[&str]) {
        self.state.lock().unwrap().texts = texts.iter().map(|t| t.to_string()).collect();
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn goto(&self, url: &str) -> Result<(), IgsmsError> {
        let mut s = self.state.lock().unwrap();
        s.visited.push(url.to_string());
        s.url = if s.redirect_to_login {
            LOGIN_URL.to_string()
        } else {
            url.to_string()
        };
        Ok(())
    }

    async fn url(&self) -> Result<String, IgsmsError> {
        let mut s = self.state.lock().unwrap();
        s.url_reads += 1;
        if s.login_after_url_reads.is_some_and(|n| s.url_reads >= n) {
            s.main_present = true;
            s.redirect_to_login = false;
            s.url = THREAD_URL.to_string();
        }
        Ok(s.url.clone())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<bool, IgsmsError> {
        let mut s = self.state.lock().unwrap();
        if selector != MAIN_SELECTOR {
            return Ok(false);
        }
        s.main_checks += 1;
        Ok(s.main_present)
    }

    async fn multiline_texts(
        &self,
        _root: &str,
        limit: usize,
    ) -> Result<Vec<String>, IgsmsError> {
        let s = self.state.lock().unwrap();
        if let Some(err) = &s.texts_error {
            return Err(IgsmsError::Browser(err.clone()));
        }
        let start = s.texts.len().saturating_sub(limit);
        Ok(s.texts[start..].to_vec())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, IgsmsError> {
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }

    async fn click(&self, x: f64, y: f64) -> Result<(), IgsmsError> {
        self.state.lock().unwrap().clicks.push((x, y));
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), IgsmsError> {
        self.state.lock().unwrap().typed.push(text.to_string());
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), IgsmsError> {
        self.state.lock().unwrap().keys.push(key.to_string());
        Ok(())
    }
}

/// Hands out one shared [`MockPage`].
pub struct MockBrowser {
    pub page: Arc<MockPage>,
    pub open: Mutex<bool>,
    pub fail: bool,
}

impl MockBrowser {
    pub fn new(page: Arc<MockPage>) -> Self {
        Self {
            page,
            open: Mutex::new(false),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            page: Arc::new(MockPage::default()),
            open: Mutex::new(false),
            fail: true,
        }
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn page(&self) -> Result<Arc<dyn PageDriver>, IgsmsError> {
        if self.fail {
            return Err(IgsmsError::Browser("no chromium".to_string()));
        }
        *self.open.lock().unwrap() = true;
        let page: Arc<dyn PageDriver> = self.page.clone();
        Ok(page)
    }

    async fn is_open(&self) -> bool {
        *self.open.lock().unwrap()
    }

    async fn close(&self) -> Result<(), IgsmsError> {
        *self.open.lock().unwrap() = false;
        Ok(())
    }
}

/// A store in a fresh temp directory. Keep the `TempDir` alive for the test.
pub async fn temp_store() -> (Store, TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let store = Store::new(&tmp.path().join("state.db")).await.unwrap();
    (store, tmp)
}

pub fn notifier(store: &Store, channel: Arc<MockChannel>) -> Notifier {
    Notifier::new(channel, OWNER, AuditLogger::new(store.pool().clone()))
}

/// Settings with every wait shortened to zero.
pub fn fast_settings() -> MonitorSettings {
    let mut cfg = Config::default();
    cfg.instagram.thread_url = THREAD_URL.to_string();
    cfg.instagram.poll_seconds = 10;
    cfg.instagram.login_wait_attempts = 3;
    cfg.instagram.login_wait_secs = 0;
    MonitorSettings {
        render_grace: Duration::ZERO,
        ..MonitorSettings::from_config(&cfg)
    }
}
