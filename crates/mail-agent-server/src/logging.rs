use anyhow::{Context, Result};
use etcetera::{choose_app_strategy, AppStrategy};
use mail_agent::config::APP_STRATEGY;
use std::fs;
use std::path::PathBuf;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

/// Returns the directory where log files should be stored.
/// Creates the directory structure if it doesn't exist.
fn get_log_directory() -> Result<PathBuf> {
    let home_dir =
        choose_app_strategy(APP_STRATEGY.clone()).context("HOME environment variable not set")?;

    let base_log_dir = home_dir
        .in_state_dir("logs")
        .unwrap_or_else(|| home_dir.in_data_dir("logs"));

    // One directory per day
    let date_str = chrono::Local::now().format("%Y-%m-%d").to_string();
    let date_dir = base_log_dir.join("server").join(date_str);

    fs::create_dir_all(&date_dir).context("Failed to create log directory")?;

    Ok(date_dir)
}

/// Sets up the logging infrastructure for the server.
/// This includes:
/// - File-based logging with JSON formatting (DEBUG level)
/// - Console output for development (INFO level, overridable with RUST_LOG)
pub fn setup_logging(name: Option<&str>) -> Result<()> {
    let log_dir = get_log_directory()?;
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let log_filename = match name {
        Some(n) => format!("{}-{}.log", timestamp, n),
        None => format!("{}.log", timestamp),
    };

    let file_appender = tracing_appender::rolling::RollingFileAppender::new(
        Rotation::NEVER,
        log_dir,
        log_filename,
    );

    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .with_file(true)
        .with_line_number(true)
        .pretty();

    let base_env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("")
            .add_directive("mail_agent=debug".parse().expect("static directive"))
            .add_directive("mail_agent_server=info".parse().expect("static directive"))
            .add_directive("tower_http=info".parse().expect("static directive"))
            .add_directive(LevelFilter::WARN.into())
    });

    let subscriber = Registry::default()
        .with(file_layer.with_filter(base_env_filter))
        .with(console_layer.with_filter(LevelFilter::INFO));

    subscriber
        .try_init()
        .context("Failed to set global subscriber")?;

    Ok(())
}
