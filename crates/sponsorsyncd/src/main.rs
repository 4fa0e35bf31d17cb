// # sponsorsyncd - Sponsor Sync Daemon
//
// This is a thin integration layer. All sync logic lives in
// sponsorsync-core; the upstream client lives in sponsorsync-afdian.
//
// The sponsorsyncd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the store, upstream client and reconciler
// 4. Running the periodic trigger until SIGTERM/SIGINT
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Upstream
// - `AFDIAN_USER_ID`: Account id requests are signed for (required)
// - `AFDIAN_API_TOKEN`: Signing secret (required)
// - `AFDIAN_API_BASE_URL`: API base URL (default: https://afdian.com/api/open)
// - `SPONSORSYNC_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 30)
//
// ### Store
// - `SPONSORSYNC_STORE_TYPE`: Type of store (sqlite, memory; default: sqlite)
// - `SPONSORSYNC_DB_PATH`: SQLite database file (default: data/sponsors.db)
//
// ### Engine
// - `SPONSORSYNC_INTERVAL_SECS`: Seconds between runs (default: 300)
// - `SPONSORSYNC_PAGE_DELAY_MS`: Pause between page fetches (default: 500)
// - `SPONSORSYNC_PAGE_SIZE`: Records per page, 1-100 (default: 100)
//
// ### Logging
// - `SPONSORSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export AFDIAN_USER_ID=your_user_id
// export AFDIAN_API_TOKEN=your_token
// export SPONSORSYNC_DB_PATH=/var/lib/sponsorsync/sponsors.db
//
// sponsorsyncd
// ```

use anyhow::{Context, Result};
use sponsorsync_afdian::AfdianClient;
use sponsorsync_core::config::{EngineConfig, StoreConfig, SyncConfig, UpstreamConfig};
use sponsorsync_core::traits::SponsorStore;
use sponsorsync_core::{MemorySponsorStore, Reconciler, SqliteSponsorStore, SyncTrigger};
use std::env;
use std::future::Future;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Default SQLite database location
const DEFAULT_DB_PATH: &str = "data/sponsors.db";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    sync: SyncConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `get`, which returns a variable's value if set
    fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user_id = get("AFDIAN_USER_ID").unwrap_or_default();
        let api_token = get("AFDIAN_API_TOKEN").unwrap_or_default();

        let mut upstream = UpstreamConfig::new(user_id, api_token);
        if let Some(base_url) = get("AFDIAN_API_BASE_URL") {
            upstream = upstream.with_base_url(base_url);
        }
        if let Some(timeout) = parse_var(&get, "SPONSORSYNC_REQUEST_TIMEOUT_SECS")? {
            upstream.request_timeout_secs = timeout;
        }

        let store_type = get("SPONSORSYNC_STORE_TYPE").unwrap_or_else(|| "sqlite".to_string());
        let store = match store_type.to_lowercase().as_str() {
            "sqlite" => StoreConfig::Sqlite {
                path: get("SPONSORSYNC_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            },
            "memory" => StoreConfig::Memory,
            other => anyhow::bail!(
                "SPONSORSYNC_STORE_TYPE '{}' is not supported. \
                Supported types: sqlite, memory",
                other
            ),
        };

        let mut engine = EngineConfig::default();
        if let Some(interval) = parse_var(&get, "SPONSORSYNC_INTERVAL_SECS")? {
            engine.sync_interval_secs = interval;
        }
        if let Some(delay) = parse_var(&get, "SPONSORSYNC_PAGE_DELAY_MS")? {
            engine.page_delay_ms = delay;
        }
        if let Some(page_size) = parse_var(&get, "SPONSORSYNC_PAGE_SIZE")? {
            engine.page_size = page_size;
        }

        Ok(Self {
            sync: SyncConfig {
                upstream,
                store,
                engine,
            },
            log_level: get("SPONSORSYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.sync.upstream.user_id.is_empty() {
            anyhow::bail!(
                "AFDIAN_USER_ID is required. \
                Set it via: export AFDIAN_USER_ID=your_user_id"
            );
        }
        if self.sync.upstream.api_token.is_empty() {
            anyhow::bail!(
                "AFDIAN_API_TOKEN is required. \
                Set it via: export AFDIAN_API_TOKEN=your_token"
            );
        }

        // Check for obvious placeholder tokens (common mistake)
        let token_lower = self.sync.upstream.api_token.to_lowercase();
        if token_lower.contains("your_token") || token_lower.contains("replace_me") {
            anyhow::bail!(
                "AFDIAN_API_TOKEN appears to be a placeholder. \
                Use the actual token from the developer page."
            );
        }

        self.sync.validate()?;

        if self.sync.upstream.base_url.starts_with("http://") {
            warn!(
                "AFDIAN_API_BASE_URL uses HTTP (not HTTPS). \
                Signed requests will travel in clear text."
            );
        }

        parse_log_level(&self.log_level)?;
        Ok(())
    }
}

/// Parse an optional numeric variable; a set but unparseable value is an error
fn parse_var<T, F>(get: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", name, raw, e)),
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "SPONSORSYNC_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    // Initialize tracing before validation so warnings are visible
    let log_level = parse_log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncExitCode::ConfigError.into();
    }

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SyncExitCode::ConfigError.into();
    }

    info!("Starting sponsorsyncd daemon");
    debug!("Upstream configuration: {:?}", config.sync.upstream);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let daemon = match Daemon::build(config.sync) {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return SyncExitCode::ConfigError;
            }
        };

        if let Err(e) = daemon.run().await {
            error!("Daemon error: {:#}", e);
            SyncExitCode::RuntimeError
        } else {
            SyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Wired components, ready to run
struct Daemon {
    trigger: SyncTrigger,
    events: tokio::sync::mpsc::Receiver<sponsorsync_core::SyncEvent>,
}

impl Daemon {
    fn build(config: SyncConfig) -> Result<Self> {
        let store = open_store(&config.store)?;
        let client = AfdianClient::new(&config.upstream).context("Failed to create upstream client")?;

        info!("Store type: {}", config.store.type_name());
        info!("Upstream: {}", client.base_url());

        let interval = Duration::from_secs(config.engine.sync_interval_secs);
        let (reconciler, events) = Reconciler::new(Box::new(client), store, config.engine)
            .context("Failed to create reconciler")?;
        let trigger = SyncTrigger::new(Arc::new(reconciler), interval)?;

        Ok(Self { trigger, events })
    }

    async fn run(self) -> Result<()> {
        let Self { trigger, mut events } = self;

        let shutdown = shutdown_signal()?;

        // Runs log their own progress; events are only traced here
        let event_logger = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                debug!("Sync event: {:?}", event);
            }
        });

        trigger
            .run_until(async {
                let signal = shutdown.await;
                info!("Received shutdown signal: {}", signal);
            })
            .await;

        // Dropping the trigger drops the last reconciler handle and closes the channel
        drop(trigger);
        event_logger.await.context("Event logger task failed")?;

        info!("Shutting down daemon");
        Ok(())
    }
}

fn open_store(config: &StoreConfig) -> Result<Box<dyn SponsorStore>> {
    match config {
        StoreConfig::Sqlite { path } => {
            let store = SqliteSponsorStore::open(path)
                .with_context(|| format!("Failed to open SQLite store at {}", path))?;
            Ok(Box::new(store))
        }
        StoreConfig::Memory => {
            warn!("Using in-memory store; sponsors are lost on restart");
            Ok(Box::new(MemorySponsorStore::new()))
        }
    }
}

/// Install SIGTERM/SIGINT handlers and return a future resolving on either
///
/// Handlers are installed eagerly so a failure surfaces before the first run.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Fallback implementation for non-Unix platforms (CTRL-C only)
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
        }
        "SIGINT"
    })
}
