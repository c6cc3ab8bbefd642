// src/telemetry/otel.rs
use super::tracer::{AttributeValue, CheckSpan, Tracer};
use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::{Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue, Value};
use std::sync::Arc;

/// Tracer emitting OpenTelemetry spans.
///
/// Check spans are started in the context of the measurement span, so they
/// share its trace and list it as parent. Any `opentelemetry` tracer works;
/// [`OtelTracer::global`] picks up whatever provider the process installed
/// with `opentelemetry::global::set_tracer_provider`.
pub struct OtelTracer<T = BoxedTracer> {
    tracer: Arc<T>,
}

impl OtelTracer {
    pub fn global(name: &'static str) -> Self {
        Self::new(global::tracer(name))
    }
}

impl<T> OtelTracer<T>
where
    T: opentelemetry::trace::Tracer + Send + Sync + 'static,
    T::Span: Send + Sync + 'static,
{
    pub fn new(tracer: T) -> Self {
        Self {
            tracer: Arc::new(tracer),
        }
    }
}

impl<T> Tracer for OtelTracer<T>
where
    T: opentelemetry::trace::Tracer + Send + Sync + 'static,
    T::Span: Send + Sync + 'static,
{
    fn start(&self, name: &str) -> Box<dyn CheckSpan> {
        let span = self.tracer.start(name.to_string());
        Box::new(OtelSpan {
            cx: Context::current_with_span(span),
            tracer: self.tracer.clone(),
        })
    }
}

struct OtelSpan<T> {
    cx: Context,
    tracer: Arc<T>,
}

impl<T> CheckSpan for OtelSpan<T>
where
    T: opentelemetry::trace::Tracer + Send + Sync + 'static,
    T::Span: Send + Sync + 'static,
{
    fn child(&self, name: &str) -> Box<dyn CheckSpan> {
        let span = self.tracer.start_with_context(name.to_string(), &self.cx);
        Box::new(OtelSpan {
            cx: self.cx.with_span(span),
            tracer: self.tracer.clone(),
        })
    }

    fn set_attribute(&mut self, key: &'static str, value: AttributeValue) {
        let value = match value {
            AttributeValue::Int(v) => Value::I64(v),
            AttributeValue::Str(v) => Value::from(v),
            AttributeValue::Bool(v) => Value::Bool(v),
        };
        self.cx.span().set_attribute(KeyValue::new(key, value));
    }

    fn record_error(&mut self, message: &str) {
        self.cx.span().add_event(
            "exception",
            vec![KeyValue::new("exception.message", message.to_string())],
        );
    }

    fn set_error(&mut self, description: &str) {
        self.cx.span().set_status(Status::error(description.to_string()));
    }

    fn end(self: Box<Self>) {
        self.cx.span().end();
    }
}
