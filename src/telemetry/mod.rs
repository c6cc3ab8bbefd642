// src/telemetry/mod.rs
mod otel;
mod system;
mod tracer;

pub use otel::OtelTracer;
pub use system::{AllocStats, CountingAllocator, RuntimeCollector, SystemCollector, SystemSnapshot};
pub use tracer::{AttributeValue, CheckSpan, LogTracer, NoopTracer, Tracer};
