//! Plain single-line log output.
//!
//! Every event is written as
//!
//! ```text
//! 2024-05-01 12:00:00.000000+0200 [info]  Proxy url: GET /api/42  status=200
//! ```
//!
//! The offset is omitted when local time is UTC. String values are quoted,
//! numbers and booleans are not. Fields of enclosing spans are rendered as
//! `  span={ key="value" }` groups ahead of the event's own fields.
use std::{
    fmt::{self, Write as _},
    io,
    sync::Mutex,
};

use chrono::Local;
use eyre::{Result, WrapErr, eyre};
use tracing::{Event, Level, Subscriber, field::Field};
use tracing_subscriber::{
    EnvFilter,
    field::{RecordFields, Visit},
    fmt::{
        FmtContext, FormatEvent, FormatFields, FormattedFields, MakeWriter,
        format::Writer,
    },
    registry::LookupSpan,
    util::SubscriberInitExt,
};

const DEFAULT_LEVEL: &str = "info";

/// Initialise the global subscriber writing plain lines to stdout.
///
/// `level` takes an `EnvFilter` directive; when absent `RUST_LOG` is used,
/// falling back to `info`.
pub fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => {
            EnvFilter::try_new(level).wrap_err_with(|| format!("Invalid log level: {level}"))?
        }
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL)),
    };

    subscriber(filter, Mutex::new(io::stdout()))
        .try_init()
        .map_err(|e| eyre!("Failed to install log subscriber: {e}"))
}

fn subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    use tracing_subscriber::layer::SubscriberExt;

    tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .fmt_fields(PlainFields)
            .event_format(PlainFormat),
    )
}

/// Event formatter producing the plain line layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormat;

impl<S, N> FormatEvent<S, N> for PlainFormat
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
        let now = Local::now();
        write!(writer, "{}", now.format("%Y-%m-%d %H:%M:%S%.6f"))?;
        if now.offset().local_minus_utc() != 0 {
            write!(writer, "{}", now.format("%z"))?;
        }
        write!(writer, " {}", level_tag(event.metadata().level()))?;

        let mut visitor = PlainVisitor::default();
        event.record(&mut visitor);
        write!(writer, " {}", visitor.message.as_deref().unwrap_or_default())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let extensions = span.extensions();
                match extensions.get::<FormattedFields<N>>() {
                    Some(fields) if !fields.is_empty() => {
                        write!(writer, "  {}={{ {} }}", span.name(), fields)?
                    }
                    _ => {}
                }
            }
        }

        writer.write_str(&visitor.fields)?;
        writeln!(writer)
    }
}

/// Field formatter used for span fields, so groups match event fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFields;

impl<'w> FormatFields<'w> for PlainFields {
    fn format_fields<R: RecordFields>(&self, mut writer: Writer<'w>, fields: R) -> fmt::Result {
        let mut visitor = PlainVisitor::default();
        fields.record(&mut visitor);
        if let Some(message) = &visitor.message {
            write!(writer, "message={message:?}")?;
        }
        let rendered = match visitor.message {
            Some(_) => visitor.fields.as_str(),
            None => visitor.fields.trim_start(),
        };
        writer.write_str(rendered)
    }
}

fn level_tag(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[trace]",
        Level::DEBUG => "[debug]",
        Level::INFO => "[info] ",
        Level::WARN => "[warn] ",
        _ => "[error]",
    }
}

/// Collects the message apart from the other fields, each of which is
/// rendered with a two-space separator.
#[derive(Default)]
struct PlainVisitor {
    message: Option<String>,
    fields: String,
}

impl PlainVisitor {
    fn quoted(&mut self, field: &Field, value: &str) {
        let _ = write!(self.fields, "  {}={:?}", field.name(), value);
    }

    fn bare(&mut self, field: &Field, value: &dyn fmt::Display) {
        let _ = write!(self.fields, "  {}={}", field.name(), value);
    }
}

impl Visit for PlainVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.quoted(field, value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.quoted(field, &rendered);
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.quoted(field, &value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.bare(field, &value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.bare(field, &value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.bare(field, &value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.bare(field, &value);
    }
}
