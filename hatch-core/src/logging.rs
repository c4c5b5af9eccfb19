//! Tracing setup.
//!
//! The server writes one JSON object per line into three size-rotated files
//! under `LOG_DIR`:
//!
//! - `app.log`: every event at the configured level, access entries excluded
//! - `access.log`: one entry per HTTP request (target [`ACCESS_TARGET`])
//! - `error.log`: ERROR events from any target
//!
//! With `DEBUG` set the same lines are mirrored to stdout. One-shot CLI
//! commands use [`init_console`] instead.
//!
//! `RUST_LOG` overrides the configured level for `app.log` and stdout.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use serde_json::{json, Map, Value};
use tracing::field::{Field, Visit};
use tracing::{span, Event, Level, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingSettings;
use crate::error::{CoreError, Result};

/// Target used by the request access log.
pub const ACCESS_TARGET: &str = "hatch::access";

/// Keeps the background log writers alive. Dropping it flushes pending lines.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _guards: Vec<WorkerGuard>,
}

/// Install the server subscriber globally.
pub fn init_server_logging(settings: &LoggingSettings, debug: bool) -> Result<LogGuard> {
    let (subscriber, guard) = server_subscriber(settings, debug)?;
    subscriber
        .try_init()
        .map_err(|err| CoreError::logging(err.to_string()))?;
    Ok(guard)
}

/// Build the server subscriber without installing it.
pub fn server_subscriber(
    settings: &LoggingSettings,
    debug: bool,
) -> Result<(impl Subscriber + Send + Sync + 'static, LogGuard)> {
    fs::create_dir_all(&settings.dir)?;

    let (app_writer, app_guard) = rolling_writer(&settings.dir, "app.log", settings);
    let (access_writer, access_guard) = rolling_writer(&settings.dir, "access.log", settings);
    let (error_writer, error_guard) = rolling_writer(&settings.dir, "error.log", settings);

    let app_layer = tracing_subscriber::fmt::layer()
        .event_format(JsonLineFormat)
        .with_writer(app_writer)
        .with_filter(app_filter(&settings.level)?);

    let access_layer = tracing_subscriber::fmt::layer()
        .event_format(JsonLineFormat)
        .with_writer(access_writer)
        .with_filter(Targets::new().with_target(ACCESS_TARGET, Level::INFO));

    let error_layer = tracing_subscriber::fmt::layer()
        .event_format(JsonLineFormat)
        .with_writer(error_writer)
        .with_filter(LevelFilter::ERROR);

    let console_layer = if debug {
        Some(
            tracing_subscriber::fmt::layer()
                .event_format(JsonLineFormat)
                .with_writer(io::stdout)
                .with_filter(console_filter(&settings.level)),
        )
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry()
        .with(SpanFieldsLayer)
        .with(app_layer)
        .with(access_layer)
        .with(error_layer)
        .with(console_layer);

    let guard = LogGuard {
        _guards: vec![app_guard, access_guard, error_guard],
    };

    Ok((subscriber, guard))
}

/// Compact console logging for one-shot commands.
pub fn init_console(debug: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .with_writer(io::stderr)
        .compact()
        .try_init()
        .map_err(|err| CoreError::logging(err.to_string()))
}

fn rolling_writer(dir: &Path, file_name: &str, settings: &LoggingSettings) -> (NonBlocking, WorkerGuard) {
    let file = FileRotate::new(
        dir.join(file_name),
        AppendCount::new(settings.backup_count),
        ContentLimit::Bytes(settings.max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    tracing_appender::non_blocking(file)
}

fn app_filter(level: &str) -> Result<EnvFilter> {
    let access_off = format!("{ACCESS_TARGET}=off")
        .parse()
        .map_err(|err| CoreError::logging(format!("bad access filter: {err}")))?;
    Ok(console_filter(level).add_directive(access_off))
}

fn console_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_ascii_lowercase()))
}

/// Renders each event as a single JSON object.
///
/// Keys: `timestamp`, `level`, `logger`, `message`, `module`, `function`,
/// `line` and `extra`. `function` is the innermost span name, which is the
/// instrumented function for `#[tracing::instrument]` spans. `extra` holds
/// the event's own fields plus the fields of every enclosing span.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLineFormat;

impl<S, N> FormatEvent<S, N> for JsonLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        let mut extra = Map::new();
        let mut function = Value::Null;
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                function = Value::String(span.name().to_string());
                let extensions = span.extensions();
                if let Some(SpanFields(fields)) = extensions.get::<SpanFields>() {
                    extra.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        let message = match visitor.fields.remove("message") {
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        extra.extend(visitor.fields);

        let record = json!({
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "level": meta.level().as_str(),
            "logger": meta.target(),
            "message": message,
            "module": meta.module_path(),
            "function": function,
            "line": meta.line(),
            "extra": Value::Object(extra),
        });

        writeln!(writer, "{record}")
    }
}

/// Span fields captured as JSON when the span is created or recorded into.
struct SpanFields(Map<String, Value>);

/// Stores span fields in the span extensions for [`JsonLineFormat`].
pub struct SpanFieldsLayer;

impl<S> Layer<S> for SpanFieldsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.fields));
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(SpanFields(fields)) = extensions.get_mut::<SpanFields>() {
            let mut visitor = JsonVisitor {
                fields: std::mem::take(fields),
            };
            values.record(&mut visitor);
            *fields = visitor.fields;
        }
    }
}

#[derive(Default)]
struct JsonVisitor {
    fields: Map<String, Value>,
}

impl Visit for JsonVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields
            .insert(field.name().to_string(), Value::String(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields
            .insert(field.name().to_string(), Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.fields
            .insert(field.name().to_string(), Value::String(format!("{value:?}")));
    }
}
