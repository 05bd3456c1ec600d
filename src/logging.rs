//! # Structured Logging Module
//!
//! Environment-aware structured logging to the console and a JSON file under `log/`.

use crate::config::LoggingConfig;
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with default settings
pub fn init_structured_logging() {
    init_structured_logging_with(&LoggingConfig::default());
}

/// Initialize structured logging once per process; later calls are no-ops
pub fn init_structured_logging_with(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .or_else(|| config.level.clone())
            .unwrap_or_else(|| get_log_level(&environment).to_string());

        let console = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(&log_level));

        let pid = process::id();
        let log_dir = PathBuf::from(&config.directory);
        let file_log = if config.json_file {
            match fs::create_dir_all(&log_dir) {
                Ok(()) => {
                    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
                    let log_filename = format!("{environment}.{pid}.{timestamp}.log");
                    let file_appender = tracing_appender::rolling::never(&log_dir, &log_filename);
                    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
                    // Keep the writer alive for the life of the process
                    std::mem::forget(guard);
                    Some((file_writer, log_dir.join(log_filename)))
                }
                Err(err) => {
                    eprintln!("Could not create log directory {}: {err}", log_dir.display());
                    None
                }
            }
        } else {
            None
        };

        let log_path = file_log.as_ref().map(|(_, path)| path.display().to_string());
        let file_layer = file_log.map(|(writer, _)| {
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(EnvFilter::new(&log_level))
        });

        let subscriber = tracing_subscriber::registry().with(console).with(file_layer);

        // A global subscriber may already be set by an embedding application or a test
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = log_path.as_deref(),
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("SPROUT_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        "test" | "development" => "debug",
        _ => "debug",
    }
}

/// Log structured data for single-tray operations
pub fn log_tray_operation(
    operation: &str,
    tray_id: Option<i64>,
    batch_code: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        tray_id = tray_id,
        batch_code = batch_code,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🌱 TRAY_OPERATION"
    );
}

/// Log structured data for bulk advance/delete calls
pub fn log_bulk_operation(
    operation: &str,
    scope: &str,
    actor_id: Option<i64>,
    item_count: usize,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        scope = %scope,
        actor_id = actor_id,
        item_count = item_count,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📦 BULK_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
