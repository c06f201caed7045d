use chrono::Utc;
use igsms_core::{error::IgsmsError, traits::PageDriver};
use igsms_memory::Store;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::MonitorSettings;
use crate::notifier::Notifier;

/// Container Instagram renders only for a signed-in session.
pub const MAIN_SELECTOR: &str = "[role='main']";

pub const LOGIN_REQUIRED_TEXT: &str =
    "IG Monitor: login required. Please log in via the hosted session.";

const LOGGED_IN_PROBE: Duration = Duration::from_millis(1500);
const THREAD_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Heuristic: not on a login URL, and the main app container shows up quickly.
/// Probe failures count as logged out.
pub async fn is_logged_in(page: &dyn PageDriver) -> bool {
    match page.url().await {
        Ok(url) if url.to_lowercase().contains("login") => return false,
        Ok(_) => {}
        Err(e) => {
            debug!("could not read page url: {e}");
            return false;
        }
    }
    match page.wait_for_selector(MAIN_SELECTOR, LOGGED_IN_PROBE).await {
        Ok(found) => found,
        Err(e) => {
            debug!("login probe failed: {e}");
            false
        }
    }
}

/// Open the watched thread. If the session is logged out, text the owner and
/// give them time to sign in through the hosted browser.
pub async fn open_thread_and_wait_ready(
    page: &dyn PageDriver,
    settings: &MonitorSettings,
    store: &Store,
    notifier: &Notifier,
) -> Result<(), IgsmsError> {
    page.goto(&settings.thread_url).await?;
    tokio::time::sleep(settings.render_grace).await;

    if !is_logged_in(page).await {
        warn!("Instagram session is logged out, waiting for manual login");
        if let Err(e) = notifier.notify(LOGIN_REQUIRED_TEXT).await {
            warn!("could not send login-required notice: {e}");
        }
        for _ in 0..settings.login_wait_attempts {
            if is_logged_in(page).await {
                store.set_last_login_ts(Utc::now()).await?;
                info!("Instagram login detected");
                break;
            }
            tokio::time::sleep(settings.login_wait_interval).await;
        }
    }

    if !page
        .wait_for_selector(MAIN_SELECTOR, THREAD_READY_TIMEOUT)
        .await?
    {
        return Err(IgsmsError::Browser(format!(
            "thread not ready: {MAIN_SELECTOR} missing after {}s",
            THREAD_READY_TIMEOUT.as_secs()
        )));
    }
    Ok(())
}
