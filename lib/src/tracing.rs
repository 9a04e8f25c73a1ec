use std::str::FromStr;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::field::MakeExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

use yansi::Paint;

use crate::error::{ErrorKind, Result};
use crate::Config;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Production,
    #[default]
    Formatted,
    Json,
}

impl FromStr for Mode {
    type Err = ErrorKind;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        match input {
            "prod" | "production" => Ok(Self::Production),
            "formatted" => Ok(Self::Formatted),
            "json" => Ok(Self::Json),
            _ => Err(ErrorKind::BadInput(format!("unknown log mode: {}", input))),
        }
    }
}

#[derive(PartialEq, Eq, Default, Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Only shows errors and warnings
    Critical,
    /// Shows errors, warnings, and some informational messages that are likely
    /// to be relevant when troubleshooting such as configuration
    Support,
    /// Shows everything except debug and trace information
    #[default]
    Normal,
    /// Shows debug information
    Debug,
    /// Shows everything
    Trace,
    /// Shows nothing
    Off,
}

impl FromStr for Level {
    type Err = ErrorKind;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match &*s.to_ascii_lowercase() {
            "critical" | "error" => Ok(Level::Critical),
            "support" | "warn" => Ok(Level::Support),
            "normal" | "info" => Ok(Level::Normal),
            "debug" | "dbg" => Ok(Level::Debug),
            "trace" => Ok(Level::Trace),
            "off" | "none" => Ok(Level::Off),
            _ => Err(ErrorKind::BadInput(format!(
                "expected a log level (off, trace, debug, normal, support, critical), got {}",
                s
            ))),
        }
    }
}

pub fn filter_layer(level: Level) -> Result<EnvFilter> {
    let filter_str = match level {
        Level::Critical => "warn,sled=off,lettre=off",
        Level::Support => "warn,sled=off",
        Level::Normal => "info,sled=warn",
        Level::Debug => "debug,sled=info,lettre=info",
        Level::Trace => "trace,sled=info,mio=debug,want=off",
        Level::Off => "off",
    };

    EnvFilter::try_new(filter_str).map_err(|e| ErrorKind::Unexpected(e.to_string()).into())
}

pub fn default_logging_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber,
    S: for<'span> LookupSpan<'span>,
{
    let field_format = tracing_subscriber::fmt::format::debug_fn(|writer, field, value| {
        // We'll format the field name and value separated with a colon.
        if field.name() == "message" {
            write!(writer, "{:?}", Paint::new(value).bold())
        } else {
            write!(writer, "{}: {:?}", field, Paint::default(value).bold())
        }
    })
    .delimited(", ")
    .display_messages();

    tracing_subscriber::fmt::layer()
        .fmt_fields(field_format)
        // Configure the formatter to use `print!` rather than
        // `stdout().write_str(...)`, so that logs are captured by libtest's test
        // capturing.
        .with_test_writer()
}

pub fn json_logging_layer<
    S: for<'a> tracing_subscriber::registry::LookupSpan<'a> + tracing::Subscriber,
>() -> impl tracing_subscriber::Layer<S> {
    Paint::disable();

    tracing_subscriber::fmt::layer()
        .json()
        // Configure the formatter to use `print!` rather than
        // `stdout().write_str(...)`, so that logs are captured by libtest's test
        // capturing.
        .with_test_writer()
}

/// Plain-text layer writing into the rolling log file.
pub fn file_logging_layer<S>(writer: NonBlocking) -> impl Layer<S>
where
    S: tracing::Subscriber,
    S: for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
}

/// Initializes the global subscriber according to the tracing config.
///
/// When file logging is configured, the returned guard has to be kept alive
/// for buffered lines to reach the file.
pub fn init(config: &Config) -> Result<Option<WorkerGuard>> {
    use tracing_log::LogTracer;
    use tracing_subscriber::prelude::*;

    if !config.tracing.enabled {
        return Ok(None);
    }

    LogTracer::init().map_err(|e| ErrorKind::Unexpected(e.to_string()))?;

    let (file_writer, guard) = match &config.tracing.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, format!("{}.log", config.name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    match config.tracing.mode {
        Mode::Production => {
            // loki layer
            use tracing_loki::url::Url;
            let url = Url::parse(&config.tracing.loki_address)
                .map_err(|e| ErrorKind::BadInput(format!("loki address: {}", e)))?;
            let (loki_layer, task) = tracing_loki::layer(
                url,
                vec![("app".into(), config.name.clone())]
                    .into_iter()
                    .collect(),
                vec![("version".into(), config.version.clone())]
                    .into_iter()
                    .collect(),
            )
            .map_err(|e| ErrorKind::Unexpected(e.to_string()))?;
            // The background task needs to be spawned so the logs actually get
            // delivered to loki.
            tokio::spawn(task);

            tracing::subscriber::set_global_default(
                tracing_subscriber::registry()
                    .with(loki_layer)
                    .with(json_logging_layer())
                    .with(file_writer.map(file_logging_layer))
                    .with(filter_layer(config.tracing.level)?),
            )
            .map_err(|e| ErrorKind::Unexpected(e.to_string()))?;
        }
        Mode::Formatted => {
            tracing::subscriber::set_global_default(
                tracing_subscriber::registry()
                    .with(default_logging_layer())
                    .with(file_writer.map(file_logging_layer))
                    .with(filter_layer(config.tracing.level)?),
            )
            .map_err(|e| ErrorKind::Unexpected(e.to_string()))?;
        }
        Mode::Json => {
            tracing::subscriber::set_global_default(
                tracing_subscriber::registry()
                    .with(json_logging_layer())
                    .with(file_writer.map(file_logging_layer))
                    .with(filter_layer(config.tracing.level)?),
            )
            .map_err(|e| ErrorKind::Unexpected(e.to_string()))?;
        }
    };

    Ok(guard)
}
