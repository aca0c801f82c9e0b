use std::fs;

use anyhow::Context;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::paths;

/// Initialize structured logging.
///
/// - File output: `{data_dir}/logs/vchat.<date>.log`, daily rotation, latest 5 kept.
/// - Console output on stderr. stdout carries IPC and must stay clean.
/// - `RUST_LOG` overrides the default filter.
pub fn init() -> anyhow::Result<()> {
    let log_dir = paths::get_log_dir();
    let _ = fs::create_dir_all(&log_dir);

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("vchat")
        .filename_suffix("log")
        .max_log_files(5)
        .build(&log_dir)
        .context("failed to create log file appender")?;

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .compact();

    // symphonia logs every probed frame at debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,reqwest=warn,hyper=warn,mio=warn,symphonia=warn")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("logger already initialized")?;

    tracing::info!(log_dir = %log_dir.display(), "Logger initialized");
    Ok(())
}
