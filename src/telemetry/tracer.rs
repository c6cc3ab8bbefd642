// src/telemetry/tracer.rs
use std::fmt;

/// Attribute values a span can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Str(v) => f.write_str(v),
            AttributeValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<usize> for AttributeValue {
    fn from(v: usize) -> Self {
        AttributeValue::Int(v as i64)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Str(v.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

/// Creates the root span of a measurement.
pub trait Tracer: Send + Sync {
    fn start(&self, name: &str) -> Box<dyn CheckSpan>;
}

pub trait CheckSpan: Send {
    /// Start a span nested under this one.
    fn child(&self, name: &str) -> Box<dyn CheckSpan>;

    fn set_attribute(&mut self, key: &'static str, value: AttributeValue);

    /// Attach an error event without changing the span status.
    fn record_error(&mut self, message: &str);

    /// Mark the span as failed.
    fn set_error(&mut self, description: &str);

    fn end(self: Box<Self>);
}

/// Tracer that records nothing.
#[derive(Debug, Clone, Default)]
pub struct NoopTracer;

struct NoopSpan;

impl Tracer for NoopTracer {
    fn start(&self, _name: &str) -> Box<dyn CheckSpan> {
        Box::new(NoopSpan)
    }
}

impl CheckSpan for NoopSpan {
    fn child(&self, _name: &str) -> Box<dyn CheckSpan> {
        Box::new(NoopSpan)
    }

    fn set_attribute(&mut self, _key: &'static str, _value: AttributeValue) {}

    fn record_error(&mut self, _message: &str) {}

    fn set_error(&mut self, _description: &str) {}

    fn end(self: Box<Self>) {}
}

/// Tracer backed by `tracing` spans, so whatever subscriber the process
/// installs (fmt, OTLP bridge, ...) receives them.
///
/// `tracing` fixes span names at the callsite, so the root span is always
/// `health.Measure` and every check span `health.check`. The name handed to
/// [`Tracer::start`] and [`CheckSpan::child`] goes into `otel.name`, which
/// `tracing-opentelemetry` exports as the span name. Failures set
/// `otel.status_code`/`otel.status_message` the same way.
#[derive(Debug, Clone, Default)]
pub struct LogTracer;

struct LogSpan {
    span: tracing::Span,
    name: String,
    failed: bool,
}

impl Tracer for LogTracer {
    fn start(&self, name: &str) -> Box<dyn CheckSpan> {
        let span = tracing::info_span!(
            "health.Measure",
            otel.name = %name,
            checks = tracing::field::Empty,
            status = tracing::field::Empty,
            measurement_id = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
            otel.status_message = tracing::field::Empty,
        );
        Box::new(LogSpan {
            span,
            name: name.to_string(),
            failed: false,
        })
    }
}

impl CheckSpan for LogSpan {
    fn child(&self, name: &str) -> Box<dyn CheckSpan> {
        let span = tracing::info_span!(
            parent: &self.span,
            "health.check",
            otel.name = %name,
            check = %name,
            otel.status_code = tracing::field::Empty,
            otel.status_message = tracing::field::Empty,
        );
        Box::new(LogSpan {
            span,
            name: name.to_string(),
            failed: false,
        })
    }

    fn set_attribute(&mut self, key: &'static str, value: AttributeValue) {
        // Only fields declared at span creation are recorded by `tracing`.
        self.span.record(key, tracing::field::display(&value));
    }

    fn record_error(&mut self, message: &str) {
        let _guard = self.span.enter();
        tracing::debug!(error = %message, "check {} reported an error", self.name);
    }

    fn set_error(&mut self, description: &str) {
        self.failed = true;
        self.span.record("otel.status_code", "ERROR");
        self.span.record("otel.status_message", description);
    }

    fn end(self: Box<Self>) {
        if self.failed {
            let _guard = self.span.enter();
            tracing::debug!("span {} closed with error status", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id, Record};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Collects `(callsite name, field, value)` for every span field.
    #[derive(Clone, Default)]
    struct Capture {
        fields: Arc<Mutex<Vec<(String, String, String)>>>,
    }

    struct Fields<'a> {
        span: &'static str,
        out: &'a Mutex<Vec<(String, String, String)>>,
    }

    impl Visit for Fields<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.out.lock().unwrap().push((
                self.span.to_string(),
                field.name().to_string(),
                format!("{:?}", value),
            ));
        }

        fn record_str(&mut self, field: &Field, value: &str) {
            self.out.lock().unwrap().push((
                self.span.to_string(),
                field.name().to_string(),
                value.to_string(),
            ));
        }
    }

    impl<S> Layer<S> for Capture
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            attrs.record(&mut Fields {
                span: attrs.metadata().name(),
                out: &self.fields,
            });
        }

        fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
            if let Some(span) = ctx.span(id) {
                values.record(&mut Fields {
                    span: span.metadata().name(),
                    out: &self.fields,
                });
            }
        }
    }

    fn has(fields: &[(String, String, String)], span: &str, field: &str, value: &str) -> bool {
        fields
            .iter()
            .any(|(s, f, v)| s == span && f == field && v == value)
    }

    #[test]
    fn test_noop_spans_nest_and_end() {
        let tracer = NoopTracer;
        let mut root = tracer.start("health.Measure");
        root.set_attribute("checks", 2usize.into());

        let mut child = root.child("db");
        child.record_error("boom");
        child.set_error("Timeout during health check");
        child.end();
        root.end();
    }

    #[test]
    fn test_log_tracer_without_subscriber() {
        let tracer = LogTracer;
        let mut root = tracer.start("health.Measure");
        root.set_attribute("status", "OK".into());

        let mut child = root.child("cache");
        child.set_error("failed");
        child.end();
        root.end();
    }

    #[test]
    fn test_log_tracer_exports_caller_names() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            let mut root = LogTracer.start("health.Measure");
            root.set_attribute("checks", 1usize.into());

            let mut child = root.child("postgres");
            child.set_error("Timeout during health check");
            child.end();
            root.end();
        });

        let fields = capture.fields.lock().unwrap().clone();
        assert!(has(&fields, "health.Measure", "otel.name", "health.Measure"));
        assert!(has(&fields, "health.Measure", "checks", "1"));
        assert!(has(&fields, "health.check", "otel.name", "postgres"));
        assert!(has(&fields, "health.check", "otel.status_code", "ERROR"));
        assert!(has(
            &fields,
            "health.check",
            "otel.status_message",
            "Timeout during health check"
        ));
    }

    #[test]
    fn test_attribute_display() {
        assert_eq!(AttributeValue::from(3i64).to_string(), "3");
        assert_eq!(AttributeValue::from("x").to_string(), "x");
        assert_eq!(AttributeValue::from(true).to_string(), "true");
    }
}
