//! Utilities for logging.

use tracing::Level;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    HumanReadable,
    Compact,
    Json,
}

/// Map a `-v` count to a log level.
pub fn level_from_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Build a filter defaulting to `default_level`, with overrides from
/// `RUST_LOG`.
pub fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(default_level).into())
        .from_env_lossy()
}

/// Configure the global logger.
///
/// Logs are written to `writer`, typically `std::io::stderr`. Only the first
/// call has an effect, later calls are ignored.
pub fn configure_global_logger<W>(default_level: Level, format: LogFormat, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let _ = try_configure_global_logger(default_level, format, writer);
}

pub fn try_configure_global_logger<W>(
    default_level: Level,
    format: LogFormat,
    writer: W,
) -> Result<(), SetGlobalDefaultError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(writer);

    match format {
        LogFormat::HumanReadable => tracing::subscriber::set_global_default(
            builder.with_thread_ids(true).with_file(true).with_line_number(true).finish(),
        ),
        LogFormat::Compact => tracing::subscriber::set_global_default(builder.compact().finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(Level::WARN, level_from_verbosity(0));
        assert_eq!(Level::INFO, level_from_verbosity(1));
        assert_eq!(Level::DEBUG, level_from_verbosity(2));
        assert_eq!(Level::TRACE, level_from_verbosity(7));
    }

    #[test]
    fn configure_twice() {
        configure_global_logger(Level::INFO, LogFormat::Compact, std::io::sink);
        // Global default already set.
        let result = try_configure_global_logger(Level::DEBUG, LogFormat::Json, std::io::sink);
        assert!(result.is_err());
    }
}
