//! log4rs setup: rolling `app.log`, `audit.log` and `metrics.log` files with dedicated targets.

use std::path::{Path, PathBuf};

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::config::LoggingConfig;
use crate::errors::DbError;

pub const AUDIT_TARGET: &str = "montylite::audit";
pub const METRICS_TARGET: &str = "montylite::metrics";

const ENC_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

/// Initializes the logging system from a specific config file path.
///
/// # Errors
/// Returns an error if the file is missing or invalid.
pub fn init_path(path: &Path) -> Result<(), DbError> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| DbError::Config(format!("log4rs: {e}")))
}

fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, DbError> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)
        .map_err(|e| DbError::Config(format!("log roller: {e}")))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(ENC_PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))
        .map_err(DbError::from)
}

/// Configure logging globally for the process.
/// - dir: base directory for logs; if None, current directory.
/// - level: off|error|warn|info|debug|trace
/// - retention: number of rolled files to keep (default 7)
///
/// # Errors
/// Returns an error if the directory or appenders cannot be created.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<(), DbError> {
    configure_logging_with_dev(dir, level, retention, false)
}

/// Configure logging with optional dev6 routing. When `enable_dev6` is set, the per-operation
/// timing records from `devlog::OpTimer` are persisted to a rolling `dev6.log` in the base directory.
///
/// # Errors
/// Returns an error if the directory or appenders cannot be created.
pub fn configure_logging_with_dev(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
    enable_dev6: bool,
) -> Result<(), DbError> {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    std::fs::create_dir_all(&base)?;
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(u32::MAX);
    let lvl = parse_level(level);

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(&base, "audit", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(&base, "metrics", keep)?)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, lvl))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, lvl));

    if enable_dev6 {
        builder = builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(
                Logger::builder()
                    .appender("dev6")
                    .additive(false)
                    .build(super::devlog::DEV_TARGET, LevelFilter::Trace),
            );
    } else {
        builder = builder.logger(
            Logger::builder().additive(false).build(super::devlog::DEV_TARGET, LevelFilter::Off),
        );
    }

    let config = builder
        .build(Root::builder().appender("app").build(lvl))
        .map_err(|e| DbError::Config(format!("log4rs: {e}")))?;
    // A second initialization in the same process keeps the first logger.
    if let Err(e) = log4rs::init_config(config) {
        log::debug!("logger already initialized: {e}");
    }
    Ok(())
}

/// Configure logging from a `[logging]` config section.
///
/// # Errors
/// Returns an error if the appenders cannot be created.
pub fn configure_from_config(cfg: &LoggingConfig) -> Result<(), DbError> {
    configure_logging_with_dev(cfg.dir.as_deref(), cfg.level.as_deref(), cfg.retention, cfg.dev6)
}

/// Configure logging from environment variables if present:
/// - `MONTYLITE_LOG_DIR`
/// - `MONTYLITE_LOG_LEVEL`
/// - `MONTYLITE_LOG_RETENTION`
/// - `MONTYLITE_DEV6`
///
/// # Errors
/// Returns an error if the appenders cannot be created.
pub fn configure_from_env() -> Result<(), DbError> {
    let cfg = LoggingConfig {
        dir: std::env::var("MONTYLITE_LOG_DIR").ok().map(PathBuf::from),
        level: std::env::var("MONTYLITE_LOG_LEVEL").ok(),
        retention: std::env::var("MONTYLITE_LOG_RETENTION")
            .ok()
            .and_then(|s| s.parse::<usize>().ok()),
        dev6: std::env::var("MONTYLITE_DEV6")
            .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false),
    };
    configure_from_config(&cfg)
}
