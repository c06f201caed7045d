mod api;
mod commands;
mod login;
mod monitor;
mod notifier;

#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use igsms_browser::{BrowserSession, LaunchOptions};
use igsms_channels::twilio::TwilioChannel;
use igsms_core::{config, traits::Browser};
use igsms_memory::{AuditLogger, Store};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use monitor::{Monitor, MonitorSettings};
use notifier::Notifier;

#[derive(Parser)]
#[command(
    name = "igsms",
    version,
    about = "Relay a watched Instagram DM thread to your phone over SMS"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml", env = "IGSMS_CONFIG")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service and (optionally) resume the monitor.
    Start,
    /// Print configuration and persisted monitor state.
    Status,
    /// Open a visible browser to log in to Instagram once.
    Login,
    /// Send a one-off SMS to the owner.
    Notify {
        /// Text to send.
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Plain subscriber for the window before the config, and so the log
/// directory, is known.
fn bootstrap_subscriber<W>(
    filter: EnvFilter,
    writer: W,
) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish()
}

/// Load config with a stderr subscriber in scope so override warnings are
/// not lost.
fn load_config(path: &str) -> anyhow::Result<config::Config> {
    let subscriber = bootstrap_subscriber(env_filter("info"), std::io::stderr);
    let cfg = tracing::subscriber::with_default(subscriber, || config::load(path))?;
    Ok(cfg)
}

/// Install stderr logging, plus a daily rolling file under `log_dir` when
/// given. The returned guard must live as long as the process.
fn init_logging(
    level: &str,
    log_dir: Option<&std::path::Path>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = env_filter(level);
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "igsms.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal; real env vars still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Start => {
            let _guard = init_logging(&cfg.igsms.log_level, Some(&cfg.log_dir()))?;
            cfg.validate_for_service()?;
            run_service(cfg).await?;
        }
        Commands::Status => {
            let _guard = init_logging(&cfg.igsms.log_level, None)?;
            print_status(&cli.config, &cfg).await?;
        }
        Commands::Login => {
            let _guard = init_logging(&cfg.igsms.log_level, None)?;
            login::run(&cfg).await?;
        }
        Commands::Notify { text } => {
            let _guard = init_logging(&cfg.igsms.log_level, None)?;
            if text.is_empty() {
                anyhow::bail!("no text provided. Usage: igsms notify <text>");
            }
            if cfg.owner.phone.trim().is_empty() {
                anyhow::bail!("owner.phone is not set (OWNER_PHONE)");
            }
            let store = Store::new(&cfg.db_path()).await?;
            let notifier = Notifier::new(
                Arc::new(TwilioChannel::new(cfg.twilio.clone())),
                &cfg.owner.phone,
                AuditLogger::new(store.pool().clone()),
            );
            notifier.notify(&text.join(" ")).await?;
            println!("Sent to {}", notifier.owner_phone());
        }
    }

    Ok(())
}

/// Wire everything together and serve until shutdown.
async fn run_service(cfg: config::Config) -> anyhow::Result<()> {
    info!("igsms starting (data dir {})", cfg.data_dir().display());

    let store = Store::new(&cfg.db_path()).await?;
    let audit = AuditLogger::new(store.pool().clone());

    let twilio = TwilioChannel::new(cfg.twilio.clone());
    let validator = if cfg.twilio.validate_signature {
        Some(twilio.validator())
    } else {
        warn!("Twilio signature validation is disabled");
        None
    };
    let notifier = Notifier::new(Arc::new(twilio), &cfg.owner.phone, audit);

    let browser: Arc<dyn Browser> = Arc::new(BrowserSession::new(LaunchOptions::from_config(
        &cfg.browser,
        cfg.user_data_dir(),
    )));
    let monitor = Arc::new(Monitor::new(
        browser.clone(),
        store.clone(),
        notifier.clone(),
        MonitorSettings::from_config(&cfg),
    ));

    if cfg.instagram.resume_on_start {
        if let Err(e) = monitor.resume_if_flagged().await {
            warn!("could not resume monitor: {e}");
        }
    }

    let state = api::ApiState::new(&cfg, monitor.clone(), notifier, store, validator);
    let served = api::serve(&cfg.api.host, cfg.api.port, state).await;

    monitor.shutdown().await;
    if let Err(e) = browser.close().await {
        warn!("browser did not close cleanly: {e}");
    }
    info!("igsms stopped");
    served?;
    Ok(())
}

async fn print_status(config_path: &str, cfg: &config::Config) -> anyhow::Result<()> {
    println!("igsms status\n");
    println!("Config:      {config_path}");
    println!("Data dir:    {}", cfg.data_dir().display());
    println!(
        "Owner phone: {}",
        if cfg.owner.phone.is_empty() {
            "not set"
        } else {
            cfg.owner.phone.as_str()
        }
    );
    println!(
        "Thread:      {}",
        if cfg.instagram.thread_url.is_empty() {
            "not set"
        } else {
            cfg.instagram.thread_url.as_str()
        }
    );
    println!("Poll:        {}s", cfg.instagram.poll_seconds);
    println!(
        "Twilio:      {}",
        if cfg.twilio.account_sid.is_empty() || cfg.twilio.auth_token.is_empty() {
            "missing credentials"
        } else {
            "configured"
        }
    );
    println!(
        "Admin API:   {}",
        if cfg.api.secret_token.is_empty() {
            "disabled"
        } else {
            "enabled"
        }
    );
    match cfg.validate_for_service() {
        Ok(()) => println!("Ready:       yes"),
        Err(e) => println!("Ready:       no ({e})"),
    }
    println!();

    let db_path = cfg.db_path();
    if !db_path.exists() {
        println!("State:       no database yet at {}", db_path.display());
        return Ok(());
    }
    let snapshot = Store::new(&db_path).await?.snapshot().await?;
    println!("Running:     {}", snapshot.running);
    println!(
        "Last seen:   {}",
        snapshot.last_seen_id.as_deref().unwrap_or("none")
    );
    println!(
        "Last login:  {}",
        snapshot.last_login_ts.as_deref().unwrap_or("never")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_config_load_events_reach_bootstrap_subscriber() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("absent.toml");
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = bootstrap_subscriber(EnvFilter::new("info"), move || writer.clone());

        let cfg = tracing::subscriber::with_default(subscriber, || {
            config::load(missing.to_str().unwrap())
        })
        .unwrap();

        assert_eq!(cfg.api.port, config::Config::default().api.port);
        let logs = captured.text();
        assert!(logs.contains("Config file not found"), "logs: {logs}");
    }

    #[test]
    fn test_bootstrap_subscriber_reports_rejected_override() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = bootstrap_subscriber(EnvFilter::new("warn"), move || writer.clone());

        let mut cfg = config::Config::default();
        tracing::subscriber::with_default(subscriber, || {
            cfg.apply_overrides_from(|k| (k == "POLL_SECONDS").then(|| "abc".to_string()));
        });

        assert_eq!(
            cfg.instagram.poll_seconds,
            config::Config::default().instagram.poll_seconds
        );
        let logs = captured.text();
        assert!(logs.contains("POLL_SECONDS"), "logs: {logs}");
    }
}
