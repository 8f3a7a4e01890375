//! Tracing subscriber setup.
//!
//! Two modes, picked by `logging.production`:
//! - **Production**: JSON to a daily rolling file plus compact stdout for the
//!   service manager's journal
//! - **Development**: pretty stdout with span open/close events

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::Context;
use beakn_core::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable overriding `logging.level`.
pub const LOG_LEVEL_ENV: &str = "BEAKN_LOG_LEVEL";

/// Non-blocking writer guards. Dropping one stops its writer thread, so they
/// live for the rest of the process.
static GUARDS: OnceLock<[WorkerGuard; 2]> = OnceLock::new();

/// Install the global subscriber.
///
/// Filter precedence: `RUST_LOG`, then `BEAKN_LOG_LEVEL`, then
/// `config.level`.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid or the production log
/// directory cannot be created.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = env_filter(config)?;

    if config.production {
        let dir = log_directory(config);
        init_production(filter, dir)
    } else {
        init_development(filter);
        Ok(())
    }
}

fn env_filter(config: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directive = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| config.level.clone());
    EnvFilter::try_new(&directive).with_context(|| format!("invalid log filter '{directive}'"))
}

fn init_production(filter: EnvFilter, dir: PathBuf) -> anyhow::Result<()> {
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(RollingFileAppender::new(Rotation::DAILY, &dir, "beakn.log"));
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    let _ = GUARDS.set([file_guard, stdout_guard]);
    tracing::debug!(directory = %dir.display(), "File logging enabled");

    Ok(())
}

fn init_development(filter: EnvFilter) {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .init();
}

/// Directory for production log files.
///
/// `logging.directory` if set, else `/var/log/beakn` on Linux, else `logs`
/// under the platform data directory.
fn log_directory(config: &LoggingConfig) -> PathBuf {
    if let Some(dir) = &config.directory {
        return dir.clone();
    }

    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/beakn")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "beakn")
            .map_or_else(|| PathBuf::from("./logs"), |dirs| dirs.data_dir().join("logs"))
    }
}
