use std::path::Path;
use std::str::FromStr;
use std::sync::{Once, OnceLock};

use config::LogConfig;
use time::UtcOffset;
use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter, fmt, Registry};

static GLOBAL_LOG_GUARD: OnceLock<Vec<WorkerGuard>> = OnceLock::new();
static START_LOGGING: Once = Once::new();

pub fn targets_filter(level: LevelFilter) -> filter::Targets {
    filter::Targets::new().with_targets(vec![
        // Workspace crates,
        // make sure all workspace members are here.
        ("config", level),
        ("geometa", level),
        ("meta", level),
        ("models", level),
        ("trace", level),
        ("version", level),
        // Third-party crates
        ("sled", LevelFilter::WARN),
    ])
}

fn parse_rotation(file_rotation: &str) -> Rotation {
    match file_rotation {
        "daily" => Rotation::DAILY,
        "hourly" => Rotation::HOURLY,
        "minutely" => Rotation::MINUTELY,
        "never" => Rotation::NEVER,
        _ => {
            eprintln!(
                "unrecognized file_rotation: {}, default to [never]",
                file_rotation
            );
            Rotation::NEVER
        }
    }
}

/// Installs the process wide subscriber: stderr plus a rolling file under
/// `log_config.path`. Only the first call has any effect.
pub fn init_global_logging(log_config: &LogConfig, file_name_prefix: &str) {
    START_LOGGING.call_once(|| {
        let tracing_level = LevelFilter::from_str(&log_config.level).unwrap_or(LevelFilter::WARN);

        let local_time = OffsetTime::new(
            UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
            time::format_description::well_known::Iso8601::DEFAULT,
        );
        let formatting_layer = fmt::layer()
            .with_ansi(false)
            .with_timer(local_time.clone())
            .with_writer(std::io::stderr);

        let mut file_appender_builder = RollingFileAppender::builder()
            .filename_prefix(file_name_prefix)
            .rotation(parse_rotation(&log_config.file_rotation));

        if let Some(count) = log_config.max_file_count {
            file_appender_builder = file_appender_builder.max_log_files(count);
        }

        let file_layer = match file_appender_builder.build(&log_config.path) {
            Ok(file_appender) => {
                let (non_blocking_appender, guard) = non_blocking(file_appender);
                GLOBAL_LOG_GUARD.get_or_init(|| vec![guard]);
                Some(
                    fmt::layer()
                        .with_ansi(false)
                        .with_timer(local_time)
                        .with_writer(non_blocking_appender),
                )
            }
            Err(err) => {
                eprintln!(
                    "failed to create log file under '{}': {}, logging to stderr only",
                    log_config.path, err
                );
                None
            }
        };

        let _ = Registry::default()
            .with(ErrorLayer::default())
            .with(formatting_layer)
            .with(file_layer)
            .with(targets_filter(tracing_level))
            .try_init();

        debug!("log trace init successful");
    });
}

/// only use for unit test
/// parameter only use for first call
pub fn init_default_global_tracing(dir: impl AsRef<Path>, file_name: &str, level: &str) {
    let log_config = LogConfig {
        level: level.to_owned(),
        path: dir.as_ref().to_string_lossy().to_string(),
        max_file_count: None,
        file_rotation: "daily".to_owned(),
    };
    init_global_logging(&log_config, file_name);
}
