//! Recover CLI - interactive password reset.
//!
//! # Architecture
//!
//! The CLI wires [`recover_engine`] (flow state) to [`recover_providers`]
//! (HTTP backend) and renders each step as a line-based screen.
//!
//! ```text
//! main() -> FlowController <── NavigationBridge::run() (spawned)
//!              ^                      │
//!              │ triggers             │ ChannelNavigator
//!              │                      v
//!           screens::run() <──── Screen requests (mpsc)
//! ```
//!
//! Screens never pick the next screen themselves after a successful call;
//! they wait for the bridge, which owns navigation.

mod screens;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use recover_engine::{
    FlowController, NavigationBridge, NoToken, RecoverConfig, StaticToken, TokenSource,
};
use recover_providers::{HttpResetBackend, HttpSettings, RetryConfig};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Without a log file, stay silent rather than interleave logs with prompts.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.recover/logs/recover.log
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".recover").join("logs").join("recover.log"));
    }

    // Fallback: ./.recover/logs/recover.log
    candidates.push(PathBuf::from(".recover").join("logs").join("recover.log"));

    candidates
}

fn build_backend(config: &RecoverConfig) -> Result<HttpResetBackend> {
    let base_url = config.base_url().context(
        "No API base URL configured. Set RECOVER_API_URL or [api] base_url in ~/.recover/config.toml",
    )?;

    let retry = config.retry();
    let settings = HttpSettings {
        base_url,
        timeout: Duration::from_secs(config.timeout_secs()),
        allow_insecure_http: config.allow_insecure_http(),
        retry: RetryConfig::from_millis(
            retry.max_retries,
            retry.initial_delay_ms,
            retry.max_delay_ms,
        ),
    };

    let tokens: Arc<dyn TokenSource> = match config.auth_token() {
        Some(token) => Arc::new(StaticToken::new(token)),
        None => Arc::new(NoToken),
    };

    HttpResetBackend::new(settings, tokens).context("Failed to set up the recovery API client")
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match RecoverConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            eprintln!("Warning: {err}. Using defaults.");
            RecoverConfig::default()
        }
    };

    let backend = build_backend(&config)?;
    tracing::info!(base_url = backend.base_url(), "Starting password reset");

    let flow = Arc::new(FlowController::new(
        Arc::new(backend),
        config.flow_settings(),
    ));

    let (navigator, screens) = screens::ChannelNavigator::channel();
    let bridge = tokio::spawn(NavigationBridge::new(Arc::clone(&flow), navigator).run());

    let result = screens::run(&flow, screens).await;
    bridge.abort();

    if let Err(err) = &result {
        tracing::error!(error = %err, "Password reset aborted");
    }
    result
}
