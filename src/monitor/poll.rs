use igsms_channels::utils::preview;
use igsms_core::{error::IgsmsError, traits::PageDriver};
use igsms_memory::Store;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{extract, login, MonitorContext};
use crate::notifier::Notifier;

/// Floor for the polling interval.
const MIN_POLL_SECS: u64 = 10;
/// Jitter amplitude as a fraction of the base interval.
const JITTER: f64 = 0.2;
/// How many trailing candidate nodes to scan.
const SCAN_LIMIT: usize = 10;
/// SMS preview length.
const PREVIEW_CHARS: usize = 300;

/// What one poll step found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No message-like text on the page.
    Empty,
    /// Newest message was already relayed.
    Unchanged,
    /// A new message was relayed.
    Relayed { id: String },
}

/// Sleep before the next step: `floor(base + factor * base)` seconds with
/// `base = max(10, poll_seconds)`. `factor` is expected in `[-0.2, 0.2]`.
pub fn next_delay(poll_seconds: u64, factor: f64) -> Duration {
    let base = poll_seconds.max(MIN_POLL_SECS) as f64;
    let secs = (base + factor * base).floor().max(0.0);
    Duration::from_secs(secs as u64)
}

fn jitter_factor() -> f64 {
    rand::thread_rng().gen_range(-JITTER..=JITTER)
}

/// Read the thread once and relay the newest message if it is new.
pub async fn poll_once(
    page: &dyn PageDriver,
    store: &Store,
    notifier: &Notifier,
) -> Result<PollOutcome, IgsmsError> {
    let texts = page
        .multiline_texts(login::MAIN_SELECTOR, SCAN_LIMIT)
        .await?;
    let Some(latest) = extract::latest_message(&texts) else {
        return Ok(PollOutcome::Empty);
    };

    if store.get_last_seen_id().await?.as_deref() == Some(latest.id.as_str()) {
        return Ok(PollOutcome::Unchanged);
    }

    store.set_last_seen_id(&latest.id).await?;
    info!("new message {}", &latest.id[..8]);
    notifier
        .notify(&format!("IG: {}", preview(&latest.text, PREVIEW_CHARS)))
        .await?;
    Ok(PollOutcome::Relayed { id: latest.id })
}

/// The loop body spawned by [`super::Monitor::start`].
pub(super) async fn run(ctx: MonitorContext) {
    info!("monitor loop starting");

    let page = match ctx.browser.page().await {
        Ok(page) => page,
        Err(e) => {
            error!("monitor could not open browser: {e}");
            report(&ctx.notifier, &e).await;
            return;
        }
    };

    if let Err(e) =
        login::open_thread_and_wait_ready(page.as_ref(), &ctx.settings, &ctx.store, &ctx.notifier)
            .await
    {
        error!("monitor could not open thread: {e}");
        report(&ctx.notifier, &e).await;
        return;
    }

    loop {
        match ctx.store.is_running().await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                error!("monitor could not read running flag: {e}");
                break;
            }
        }

        let delay = next_delay(ctx.settings.poll_seconds, jitter_factor());

        match poll_once(page.as_ref(), &ctx.store, &ctx.notifier).await {
            Ok(outcome) => debug!("poll: {outcome:?}"),
            Err(e) => {
                warn!("poll failed: {e}");
                report(&ctx.notifier, &e).await;
            }
        }

        tokio::time::sleep(delay).await;
    }

    info!("monitor loop stopped");
}

async fn report(notifier: &Notifier, err: &IgsmsError) {
    // Delivery failures are already logged and audited by the notifier.
    let _ = notifier.notify(&format!("IG Monitor error: {err}")).await;
}
