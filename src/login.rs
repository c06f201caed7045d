//! `igsms login`: a visible browser on the persistent profile so the owner
//! can sign in once by hand.

use igsms_browser::{BrowserSession, LaunchOptions};
use igsms_core::{config::Config, traits::Browser, traits::PageDriver};
use igsms_memory::Store;
use std::time::Duration;
use tracing::info;

use crate::monitor;

const LOGIN_PAGE: &str = "https://www.instagram.com/accounts/login/";

/// Polling plan while the owner types credentials.
#[derive(Debug, Clone, Copy)]
pub struct LoginWait {
    pub checks: u32,
    pub interval: Duration,
    /// Print a progress line every this many checks.
    pub progress_every: u32,
}

impl Default for LoginWait {
    /// Ten minutes, checked every two seconds, progress every thirty.
    fn default() -> Self {
        Self {
            checks: 300,
            interval: Duration::from_secs(2),
            progress_every: 15,
        }
    }
}

/// Poll until the page looks logged in. Returns whether it did.
pub async fn wait_for_login(page: &dyn PageDriver, plan: LoginWait) -> bool {
    for check in 0..plan.checks {
        if monitor::is_logged_in(page).await {
            return true;
        }
        if plan.progress_every > 0 && check % plan.progress_every == 0 {
            let elapsed = plan.interval * check;
            println!(
                "  still waiting... ({}m {}s elapsed)",
                elapsed.as_secs() / 60,
                elapsed.as_secs() % 60
            );
        }
        tokio::time::sleep(plan.interval).await;
    }
    false
}

/// Open the login page in a visible window and wait for the owner.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let profile = config.user_data_dir();
    let mut options = LaunchOptions::from_config(&config.browser, profile.clone())
        .with_headless(false);
    options.viewport_width = 1280;
    options.viewport_height = 900;
    let session = BrowserSession::new(options);

    println!("igsms login\n");
    println!("Opening Instagram in a browser window...");
    let page = session.page().await?;
    page.goto(LOGIN_PAGE).await?;
    println!("Log in to Instagram in the window that opened.");
    println!("Waiting up to 10 minutes...\n");

    if wait_for_login(page.as_ref(), LoginWait::default()).await {
        let url = page.url().await.unwrap_or_default();
        println!("\nLogin successful. Current page: {url}");
        let store = Store::new(&config.db_path()).await?;
        store.set_last_login_ts(chrono::Utc::now()).await?;
        info!("manual login recorded");
    } else {
        println!("\nTimed out waiting for login.");
    }

    println!("Session profile: {}", profile.display());
    println!("Copy this directory to the server's data volume to reuse the session.");
    println!("To log out, delete it and run `igsms login` again.\n");
    println!("Closing the browser in 10 seconds...");
    tokio::time::sleep(Duration::from_secs(10)).await;
    session.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockPage, LOGIN_URL, THREAD_URL};

    fn quick(checks: u32) -> LoginWait {
        LoginWait {
            checks,
            interval: Duration::ZERO,
            progress_every: 0,
        }
    }

    #[tokio::test]
    async fn test_wait_for_login_detects_login() {
        let page = MockPage::default();
        {
            let mut s = page.state.lock().unwrap();
            s.url = LOGIN_URL.to_string();
            s.login_after_url_reads = Some(3);
        }
        assert!(wait_for_login(&page, quick(5)).await);
        assert_eq!(page.state.lock().unwrap().url, THREAD_URL);
    }

    #[tokio::test]
    async fn test_wait_for_login_times_out() {
        let page = MockPage::default();
        page.state.lock().unwrap().url = LOGIN_URL.to_string();
        assert!(!wait_for_login(&page, quick(4)).await);
        assert_eq!(page.state.lock().unwrap().url_reads, 4);
    }

    #[test]
    fn test_default_plan_is_ten_minutes() {
        let plan = LoginWait::default();
        assert_eq!(plan.interval * plan.checks, Duration::from_secs(600));
        assert_eq!(plan.interval * plan.progress_every, Duration::from_secs(30));
    }
}
