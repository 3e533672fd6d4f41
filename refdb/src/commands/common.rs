use std::error::Error;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

pub(crate) const DEFAULT_LOG_FILTER: &str = "info";

/// Name of the update state file kept next to the database
pub(crate) const STATE_FILE_NAME: &str = "update-state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum LogFormat {
    /// human-readable, single line
    Full,
    /// human-readable, multi line
    Pretty,
    /// machine-parseable
    Json,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct LoggingConfig {
    /// Logs: filter directive
    ///
    /// Configures log severity level filter, by target.
    ///
    /// Simplest options: error, warn, info, debug, trace
    ///
    /// Levels for different modules can be specified. For example
    /// `debug,reqwest=info` specifies debug logging for all modules except for `reqwest`,
    /// which will only display info level logging.
    ///
    /// Overridden by `-v`.
    #[clap(long = "log-filter", env = "LOG_FILTER", global = true)]
    pub(crate) log_filter: Option<String>,

    /// Logs: filter short-hand
    ///
    /// -v   'info'
    ///
    /// -vv  'debug,hyper=info,reqwest=info'
    ///
    /// -vvv 'trace,hyper=info,reqwest=info'
    #[clap(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        verbatim_doc_comment
    )]
    pub(crate) log_verbose_count: u8,

    /// Logs: message format
    #[clap(
        long = "log-format",
        env = "LOG_FORMAT",
        default_value = "full",
        value_enum,
        global = true
    )]
    pub(crate) log_format: LogFormat,
}

impl LoggingConfig {
    /// The effective filter directive; `-v` wins over `--log-filter`
    pub(crate) fn filter_directive(&self) -> String {
        match self.log_verbose_count {
            0 => self
                .log_filter
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            1 => "info".to_string(),
            2 => "debug,hyper=info,reqwest=info".to_string(),
            _ => "trace,hyper=info,reqwest=info".to_string(),
        }
    }
}

/// Install the global log subscriber. Logs go to stderr so command output stays clean.
pub(crate) fn init_logs(config: &LoggingConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = EnvFilter::try_new(config.filter_directive())?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.log_format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}

pub(crate) fn state_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STATE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Cli {
        #[clap(flatten)]
        logging: LoggingConfig,
    }

    #[test]
    fn verbose_overrides_filter() {
        let cli = Cli::parse_from(["refdb", "--log-filter", "warn"]);
        assert_eq!(cli.logging.filter_directive(), "warn");
        assert_eq!(cli.logging.log_format, LogFormat::Full);

        let cli = Cli::parse_from(["refdb", "--log-filter", "warn", "-vv"]);
        assert_eq!(cli.logging.filter_directive(), "debug,hyper=info,reqwest=info");

        let cli = Cli::parse_from(["refdb", "--log-format", "json"]);
        assert_eq!(cli.logging.log_format, LogFormat::Json);
    }
}
