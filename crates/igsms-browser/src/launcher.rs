//! Chromium process management.

use igsms_core::{config::BrowserConfig, error::IgsmsError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Binaries tried in order when no executable is configured.
const CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

/// Profile locks Chromium leaves behind after an unclean exit.
const SINGLETON_FILES: &[&str] = &["SingletonLock", "SingletonSocket", "SingletonCookie"];

/// How long to wait for the DevTools endpoint after spawning.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(20);

/// Flags that keep a long-lived headless Chromium small.
const LOW_MEMORY_FLAGS: &[&str] = &[
    "--disable-dev-shm-usage",
    "--no-sandbox",
    "--disable-gpu",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-component-extensions-with-background-pages",
    "--disable-default-apps",
    "--disable-extensions",
    "--disable-features=TranslateUI",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-notifications",
    "--disable-offer-store-unmasked-wallet-cards",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-setuid-sandbox",
    "--disable-sync",
    "--disable-web-resources",
    "--enable-features=NetworkService,NetworkServiceLogging",
    "--force-color-profile=srgb",
    "--hide-scrollbars",
    "--ignore-gpu-blacklist",
    "--metrics-recording-only",
    "--mute-audio",
    "--no-first-run",
    "--no-default-browser-check",
    "--no-pings",
    "--no-zygote",
    "--use-mock-keychain",
    "--js-flags=--max-old-space-size=256",
];

/// Everything needed to start one Chromium instance.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Explicit binary; `None` searches `PATH`.
    pub executable: Option<PathBuf>,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub debug_port: u16,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,
}

impl LaunchOptions {
    pub fn from_config(config: &BrowserConfig, user_data_dir: PathBuf) -> Self {
        let executable = Some(config.executable.trim())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        Self {
            executable,
            user_data_dir,
            headless: config.headless,
            debug_port: config.debug_port,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            user_agent: config.user_agent.clone(),
        }
    }

    /// Same options with headless mode forced on or off.
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Command-line arguments, excluding the binary itself.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = LOW_MEMORY_FLAGS.iter().map(|s| s.to_string()).collect();
        args.push(format!("--user-data-dir={}", self.user_data_dir.display()));
        args.push(format!("--remote-debugging-port={}", self.debug_port));
        args.push("--remote-allow-origins=*".to_string());
        args.push(format!(
            "--window-size={},{}",
            self.viewport_width, self.viewport_height
        ));
        if !self.user_agent.is_empty() {
            args.push(format!("--user-agent={}", self.user_agent));
        }
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args.push("about:blank".to_string());
        args
    }

    fn http_base(&self) -> String {
        format!("http://127.0.0.1:{}", self.debug_port)
    }
}

/// Locate the Chromium binary.
pub fn find_executable(configured: Option<&Path>) -> Result<PathBuf, IgsmsError> {
    if let Some(path) = configured {
        return which::which(path).map_err(|e| {
            IgsmsError::Browser(format!("browser executable {}: {e}", path.display()))
        });
    }
    CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| {
            IgsmsError::Browser(format!(
                "no Chromium found on PATH (tried {})",
                CANDIDATES.join(", ")
            ))
        })
}

/// Owner recorded in a `SingletonLock` symlink, which points at `{host}-{pid}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOwner {
    pub host: String,
    pub pid: i32,
}

impl LockOwner {
    fn parse(target: &str) -> Option<Self> {
        let (host, pid) = target.rsplit_once('-')?;
        let pid = pid.parse().ok().filter(|p: &i32| *p > 0)?;
        Some(Self {
            host: host.to_string(),
            pid,
        })
    }

    /// A lock is held only by a live process on this machine. Profiles copied
    /// from another host carry that host's lock, which never applies here.
    pub fn is_live(&self) -> bool {
        local_hostname().is_some_and(|h| h == self.host) && pid_alive(self.pid)
    }
}

/// Read the owner of the profile lock, if the lock is a readable symlink.
pub fn lock_owner(user_data_dir: &Path) -> Option<LockOwner> {
    let target = std::fs::read_link(user_data_dir.join("SingletonLock")).ok()?;
    LockOwner::parse(&target.to_string_lossy())
}

#[cfg(unix)]
fn pid_alive(pid: i32) -> bool {
    // Signal 0 only checks existence; EPERM still means the process exists.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn pid_alive(_pid: i32) -> bool {
    true
}

#[cfg(unix)]
fn local_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    Some(String::from_utf8_lossy(&buf[..end]).into_owned())
}

#[cfg(not(unix))]
fn local_hostname() -> Option<String> {
    None
}

/// Remove profile lock files left by a previous, crashed process.
/// Returns how many were removed, or an error when a live Chromium still
/// holds the profile.
pub fn remove_stale_locks(user_data_dir: &Path) -> Result<usize, IgsmsError> {
    if let Some(owner) = lock_owner(user_data_dir).filter(LockOwner::is_live) {
        return Err(IgsmsError::Browser(format!(
            "profile {} is in use by a running browser (pid {})",
            user_data_dir.display(),
            owner.pid
        )));
    }

    let mut removed = 0;
    for name in SINGLETON_FILES {
        let path = user_data_dir.join(name);
        // Locks are usually dangling symlinks, so `exists()` would say no.
        if std::fs::symlink_metadata(&path).is_err() {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("could not remove {}: {e}", path.display()),
        }
    }
    Ok(removed)
}

/// Fail when something already answers DevTools requests on our port;
/// attaching to it would drive a browser we did not start.
async fn ensure_port_free(client: &reqwest::Client, http_base: &str) -> Result<(), IgsmsError> {
    match client.get(format!("{http_base}/json/version")).send().await {
        Ok(_) => Err(IgsmsError::Browser(format!(
            "debug endpoint {http_base} is already served by another process"
        ))),
        Err(_) => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
struct TargetInfo {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: Option<String>,
}

/// Pick the first page target with a debugger URL.
fn first_page_ws_url(targets: &[TargetInfo]) -> Option<String> {
    targets
        .iter()
        .filter(|t| t.kind == "page")
        .find_map(|t| t.ws_url.clone())
}

/// A running Chromium process with its DevTools HTTP endpoint.
pub struct LaunchedBrowser {
    child: Child,
    http_base: String,
    client: reqwest::Client,
}

impl LaunchedBrowser {
    /// Spawn Chromium and wait for its DevTools endpoint.
    pub async fn launch(options: &LaunchOptions) -> Result<Self, IgsmsError> {
        let executable = find_executable(options.executable.as_deref())?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| IgsmsError::Browser(format!("http client: {e}")))?;
        let http_base = options.http_base();
        ensure_port_free(&client, &http_base).await?;

        std::fs::create_dir_all(&options.user_data_dir)?;
        let removed = remove_stale_locks(&options.user_data_dir)?;
        if removed > 0 {
            info!("removed {removed} stale profile lock(s)");
        }

        info!(
            "launching {} (headless={}, port={})",
            executable.display(),
            options.headless,
            options.debug_port
        );
        let child = Command::new(&executable)
            .args(options.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                IgsmsError::Browser(format!("failed to start {}: {e}", executable.display()))
            })?;

        let mut browser = Self {
            child,
            http_base,
            client,
        };
        browser.wait_until_ready().await?;
        Ok(browser)
    }

    async fn wait_until_ready(&mut self) -> Result<(), IgsmsError> {
        let url = format!("{}/json/version", self.http_base);
        let deadline = tokio::time::Instant::now() + STARTUP_TIMEOUT;
        loop {
            if let Ok(Some(status)) = self.child.try_wait() {
                return Err(IgsmsError::Browser(format!(
                    "browser exited during startup: {status}"
                )));
            }
            match self.client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!("devtools endpoint ready at {}", self.http_base);
                    return Ok(());
                }
                _ => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(IgsmsError::Browser(format!(
                    "devtools endpoint not ready after {}s",
                    STARTUP_TIMEOUT.as_secs()
                )));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// WebSocket URL of an open page, creating one if none exists.
    pub async fn page_ws_url(&self) -> Result<String, IgsmsError> {
        let targets: Vec<TargetInfo> = self
            .client
            .get(format!("{}/json/list", self.http_base))
            .send()
            .await
            .map_err(|e| IgsmsError::Browser(format!("list targets: {e}")))?
            .json()
            .await
            .map_err(|e| IgsmsError::Browser(format!("list targets: {e}")))?;
        if let Some(url) = first_page_ws_url(&targets) {
            return Ok(url);
        }

        let created: TargetInfo = self
            .client
            .put(format!(
                "{}/json/new?{}",
                self.http_base,
                urlencoding::encode("about:blank")
            ))
            .send()
            .await
            .map_err(|e| IgsmsError::Browser(format!("open page: {e}")))?
            .json()
            .await
            .map_err(|e| IgsmsError::Browser(format!("open page: {e}")))?;
        created
            .ws_url
            .ok_or_else(|| IgsmsError::Browser("new page has no debugger url".to_string()))
    }

    /// Whether the process is still alive.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Kill the process and reap it.
    pub async fn shutdown(&mut self) -> Result<(), IgsmsError> {
        if self.is_running() {
            self.child.kill().await?;
        }
        Ok(())
    }
}
