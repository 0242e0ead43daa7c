//! Declarative setup of named loggers.
//!
//! Responsibilities:
//! - Turn a settings tree of named loggers into per-target level filters for a
//!   console sink, file sinks and syslog sinks.
//! - Install the resulting `tracing-subscriber` registry as the global default.
//!
//! Does NOT handle:
//! - Log rotation. File sinks append to a single file.
//!
//! Invariants:
//! - The `default` (or `root`) entry is merged over the built-in defaults and
//!   every named logger is merged over that result.
//! - A named logger only writes to its own sinks; a file or syslog sink never
//!   receives events from loggers configured with a different destination.
//! - Level `0` / `off` disables a sink; a file sink without a location is skipped.
//! - Syslog is off unless a level is configured for it.
//! - File sinks write through a background worker; keep the [`LoggingGuard`]
//!   returned by [`init`] alive so buffered events are flushed.
//!
//! # Example settings
//!
//! ```yaml
//! default:
//!   console: { level: info }
//!   syslog: { level: warning, ident: my-app }
//! authwire_client:
//!   console: { level: debug }
//!   file: { level: warning, location: /var/log/app/client.log }
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::{Value, json};
use syslog::{Facility, Formatter3164, LoggerBackend};
use tracing::{Level, Metadata};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry, fmt};

use crate::constants::{DEFAULT_SYSLOG_IDENT, DEFAULT_SYSLOG_LOCATION};
use crate::loader::{ConfigError, Result};
use crate::settings::{Settings, merge_values};

/// Output format of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Json,
}

/// Where a sink writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkKind {
    Console,
    File(PathBuf),
    /// `location` is a unix socket path or a `host:port` UDP address.
    Syslog {
        location: String,
        ident: String,
    },
}

/// One output with its per-target filter.
#[derive(Debug, Clone)]
pub struct SinkPlan {
    pub kind: SinkKind,
    pub format: LogFormat,
    pub targets: Targets,
}

/// The complete set of sinks derived from a logging settings tree.
#[derive(Debug, Clone)]
pub struct LoggingPlan {
    pub sinks: Vec<SinkPlan>,
}

/// Keeps background log writers running. Dropping it flushes and stops them.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard {
    _workers: Vec<WorkerGuard>,
}

#[derive(Debug)]
struct SinkConfig {
    level: LevelFilter,
    location: Option<String>,
    ident: Option<String>,
    format: LogFormat,
}

#[derive(Debug)]
struct LoggerConfig {
    console: SinkConfig,
    file: SinkConfig,
    syslog: SinkConfig,
}

fn builtin_defaults() -> Value {
    json!({
        "format": "full",
        "console": { "level": "info" },
        "file": { "level": "info", "location": "" },
        "syslog": {
            "level": 0,
            "location": DEFAULT_SYSLOG_LOCATION,
            "ident": DEFAULT_SYSLOG_IDENT,
        },
    })
}

/// Parse a level given as a name or as a classic numeric severity.
///
/// Numeric levels follow the 10/20/30/40/50 convention; `0` disables the sink.
pub fn parse_level(key: &str, value: &Value) -> Result<LevelFilter> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };

    match value {
        Value::Null => Ok(LevelFilter::OFF),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Ok(LevelFilter::OFF),
            Some(1..=9) => Ok(LevelFilter::TRACE),
            Some(10..=19) => Ok(LevelFilter::DEBUG),
            Some(20..=29) => Ok(LevelFilter::INFO),
            Some(30..=39) => Ok(LevelFilter::WARN),
            Some(_) => Ok(LevelFilter::ERROR),
            None => Err(invalid(format!("unsupported numeric level {n}"))),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "0" | "off" | "none" | "disabled" => Ok(LevelFilter::OFF),
            "trace" => Ok(LevelFilter::TRACE),
            "debug" => Ok(LevelFilter::DEBUG),
            "info" => Ok(LevelFilter::INFO),
            "warn" | "warning" => Ok(LevelFilter::WARN),
            "error" | "critical" | "fatal" => Ok(LevelFilter::ERROR),
            other => Err(invalid(format!("unknown level '{other}'"))),
        },
        _ => Err(invalid("level must be a name or a number".to_string())),
    }
}

fn parse_format(key: &str, value: Option<&Value>) -> Result<Option<LogFormat>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("unknown format {v}"),
            }),
    }
}

fn non_empty_str(section: &Value, key: &str) -> Option<String> {
    section
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl LoggerConfig {
    fn from_value(name: &str, value: &Value) -> Result<Self> {
        let logger_format = parse_format(&format!("{name}.format"), value.get("format"))?;
        let sink = |sink: &str| -> Result<SinkConfig> {
            let section = value.get(sink).cloned().unwrap_or(Value::Null);
            let key = format!("{name}.{sink}");
            let level = parse_level(
                &format!("{key}.level"),
                section.get("level").unwrap_or(&Value::Null),
            )?;
            let format = parse_format(&format!("{key}.format"), section.get("format"))?
                .or(logger_format)
                .unwrap_or_default();
            Ok(SinkConfig {
                level,
                location: non_empty_str(&section, "location"),
                ident: non_empty_str(&section, "ident"),
                format,
            })
        };

        Ok(Self {
            console: sink("console")?,
            file: sink("file")?,
            syslog: sink("syslog")?,
        })
    }

    /// Destinations this logger writes to besides the console.
    fn routes(&self) -> Vec<(SinkKind, LevelFilter, LogFormat)> {
        let mut routes = Vec::new();
        if self.file.level != LevelFilter::OFF
            && let Some(location) = &self.file.location
        {
            routes.push((
                SinkKind::File(PathBuf::from(location)),
                self.file.level,
                self.file.format,
            ));
        }
        if self.syslog.level != LevelFilter::OFF {
            let location = self.syslog.location.as_deref().unwrap_or(DEFAULT_SYSLOG_LOCATION);
            let ident = self.syslog.ident.as_deref().unwrap_or(DEFAULT_SYSLOG_IDENT);
            routes.push((
                SinkKind::Syslog {
                    location: location.to_string(),
                    ident: ident.to_string(),
                },
                self.syslog.level,
                self.syslog.format,
            ));
        }
        routes
    }
}

fn mapping_or_null<'a>(key: &str, value: Option<&'a Value>) -> Result<&'a Value> {
    static NULL: Value = Value::Null;
    match value {
        None => Ok(&NULL),
        Some(v @ (Value::Null | Value::Object(_))) => Ok(v),
        Some(_) => Err(ConfigError::InvalidType {
            key: key.to_string(),
            expected: "mapping",
        }),
    }
}

fn overlay(base: &Value, value: &Value) -> Value {
    if value.is_null() {
        base.clone()
    } else {
        merge_values(base, value)
    }
}

/// Build the sink plan for a logging settings tree without installing it.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidType`] for logger entries that are not
/// mappings and [`ConfigError::InvalidValue`] for unknown levels or formats.
pub fn plan(settings: &Settings) -> Result<LoggingPlan> {
    let mut default = builtin_defaults();
    for key in ["default", "root"] {
        default = overlay(&default, mapping_or_null(key, settings.get(key))?);
    }
    let root = LoggerConfig::from_value("default", &default)?;

    let mut console = Targets::new().with_default(root.console.level);
    let mut routed: Vec<SinkPlan> = root
        .routes()
        .into_iter()
        .map(|(kind, level, format)| SinkPlan {
            kind,
            format,
            targets: Targets::new().with_default(level),
        })
        .collect();

    for (name, value) in settings.as_map() {
        if name == "default" || name == "root" {
            continue;
        }
        let merged = overlay(&default, mapping_or_null(name, Some(value))?);
        let logger = LoggerConfig::from_value(name, &merged)?;
        console = console.with_target(name.clone(), logger.console.level);

        let routes = logger.routes();
        for (kind, _, format) in &routes {
            if !routed.iter().any(|sink| &sink.kind == kind) {
                routed.push(SinkPlan {
                    kind: kind.clone(),
                    format: *format,
                    targets: Targets::new(),
                });
            }
        }
        for sink in routed.iter_mut() {
            let level = routes
                .iter()
                .find(|(kind, _, _)| *kind == sink.kind)
                .map_or(LevelFilter::OFF, |(_, level, _)| *level);
            sink.targets = sink.targets.clone().with_target(name.clone(), level);
        }
    }

    let mut sinks = vec![SinkPlan {
        kind: SinkKind::Console,
        format: root.console.format,
        targets: console,
    }];
    sinks.extend(routed);

    Ok(LoggingPlan { sinks })
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn formatted<W>(writer: W, format: LogFormat, ansi: bool, targets: Targets) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_ansi(ansi);
    match format {
        LogFormat::Full => Box::new(layer.with_filter(targets)),
        LogFormat::Compact => Box::new(layer.compact().with_filter(targets)),
        LogFormat::Json => Box::new(layer.json().with_filter(targets)),
    }
}

/// Open `path` for appending behind a background writer thread.
fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ConfigError::InvalidValue {
            key: "file.location".to_string(),
            message: format!("{} does not name a file", path.display()),
        })?;
    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .map_err(|e| ConfigError::Logging(format!("{}: {e}", path.display())))?;
    Ok(tracing_appender::non_blocking(appender))
}

type SyslogLogger = syslog::Logger<LoggerBackend, Formatter3164>;

/// Sends each formatted event to syslog at the event's severity.
#[derive(Clone)]
struct SyslogWriter {
    logger: Arc<Mutex<SyslogLogger>>,
}

impl SyslogWriter {
    fn connect(location: &str, ident: &str) -> Result<Self> {
        let formatter = Formatter3164 {
            facility: Facility::LOG_DAEMON,
            hostname: None,
            process: ident.to_string(),
            pid: std::process::id(),
        };
        let failed = |e: String| ConfigError::Logging(format!("syslog at {location}: {e}"));

        #[cfg(unix)]
        if Path::new(location).is_absolute() {
            let logger = syslog::unix_custom(formatter, location)
                .map_err(|e| failed(e.to_string()))?;
            return Ok(Self::from_logger(logger));
        }

        let logger = syslog::udp(formatter, "0.0.0.0:0", location)
            .map_err(|e| failed(e.to_string()))?;
        Ok(Self::from_logger(logger))
    }

    fn from_logger(logger: SyslogLogger) -> Self {
        Self {
            logger: Arc::new(Mutex::new(logger)),
        }
    }
}

struct SyslogEvent {
    logger: Arc<Mutex<SyslogLogger>>,
    level: Level,
}

impl<'a> fmt::MakeWriter<'a> for SyslogWriter {
    type Writer = SyslogEvent;

    fn make_writer(&'a self) -> Self::Writer {
        SyslogEvent {
            logger: Arc::clone(&self.logger),
            level: Level::INFO,
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SyslogEvent {
            logger: Arc::clone(&self.logger),
            level: *meta.level(),
        }
    }
}

impl io::Write for SyslogEvent {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let message = String::from_utf8_lossy(buf);
        let message = message.trim_end();
        let mut logger = self
            .logger
            .lock()
            .map_err(|_| io::Error::other("syslog writer lock poisoned"))?;

        let sent = if self.level == Level::ERROR {
            logger.err(message)
        } else if self.level == Level::WARN {
            logger.warning(message)
        } else if self.level == Level::INFO {
            logger.info(message)
        } else {
            logger.debug(message)
        };
        sent.map_err(|e| io::Error::other(e.to_string()))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Configure named loggers from `settings` and install them globally.
///
/// # Errors
///
/// Returns the errors of [`plan`], [`ConfigError::InvalidValue`] for a file
/// location without a file name, and [`ConfigError::Logging`] if a log file or
/// syslog socket cannot be opened or a global subscriber is already set.
pub fn init(settings: &Settings) -> Result<LoggingGuard> {
    let plan = plan(settings)?;

    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(plan.sinks.len());
    let mut workers = Vec::new();
    for sink in plan.sinks {
        match sink.kind {
            SinkKind::Console => {
                layers.push(formatted(io::stderr, sink.format, true, sink.targets));
            }
            SinkKind::File(path) => {
                let (writer, guard) = file_writer(&path)?;
                workers.push(guard);
                layers.push(formatted(writer, sink.format, false, sink.targets));
            }
            SinkKind::Syslog { location, ident } => {
                let writer = SyslogWriter::connect(&location, &ident)?;
                layers.push(formatted(writer, sink.format, false, sink.targets));
            }
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    Ok(LoggingGuard { _workers: workers })
}
