use crate::{error::IgsmsError, message::OutgoingMessage};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Messaging Channel trait: how notifications leave the process.
///
/// The SMS gateway implements this; tests substitute a recorder.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Deliver a message to its `reply_target`.
    async fn send(&self, message: OutgoingMessage) -> Result<(), IgsmsError>;
}

/// A single automated browser tab.
///
/// Every operation the monitor and the admin API need from the page goes
/// through this trait, so the polling logic never touches the wire protocol.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait until the document is interactive.
    async fn goto(&self, url: &str) -> Result<(), IgsmsError>;

    /// Current location of the page.
    async fn url(&self) -> Result<String, IgsmsError>;

    /// Wait until `selector` matches at least one node.
    /// Returns `Ok(false)` on timeout.
    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, IgsmsError>;

    /// Visible text of the last `limit` `div`s under `root` whose text spans
    /// several lines, in document order.
    async fn multiline_texts(&self, root: &str, limit: usize)
        -> Result<Vec<String>, IgsmsError>;

    /// PNG screenshot of the viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, IgsmsError>;

    /// Left-click at viewport coordinates.
    async fn click(&self, x: f64, y: f64) -> Result<(), IgsmsError>;

    /// Insert text at the current focus.
    async fn type_text(&self, text: &str) -> Result<(), IgsmsError>;

    /// Press and release a named key (e.g. "Enter").
    async fn press_key(&self, key: &str) -> Result<(), IgsmsError>;
}

/// Lazily started browser holding a persistent profile.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Return the shared page, launching the browser on first use.
    async fn page(&self) -> Result<Arc<dyn PageDriver>, IgsmsError>;

    /// Whether a browser process is currently attached.
    async fn is_open(&self) -> bool;

    /// Shut the browser down. The profile directory is kept.
    async fn close(&self) -> Result<(), IgsmsError>;
}
