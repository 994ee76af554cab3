// SPDX-License-Identifier: MIT
//! Application-monitoring records: iteration requests, dependency calls, custom
//! events, exceptions.
//!
//! [`OtelTelemetry`] expresses each record as OpenTelemetry data that the
//! Application Insights exporter installed by [`crate::telemetry`] maps onto the
//! matching telemetry item:
//!
//! * iteration – `SpanKind::Server` span, exported as a request.
//! * dependency – `SpanKind::Client` span with explicit start and end timestamps.
//! * custom event – `ai.custom` span event on the iteration request.
//! * exception – `exception` span event on the iteration request, plus error status.
//!
//! Every record shares one trace id for the process lifetime, which the backend
//! shows as the operation id.
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use opentelemetry::trace::{
    Span as _, SpanContext, SpanKind, Status, TraceContextExt, TraceFlags, TraceId, TraceState,
    Tracer as _,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::{IdGenerator, RandomIdGenerator, SdkTracer};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::error::IterationError;

/// Name of the custom event recorded once per successful iteration.
pub const HEARTBEAT_EVENT: &str = "HeartbeatEvent";

/// Name of the request that groups one iteration's records.
pub const ITERATION_REQUEST: &str = "Heartbeat";

// Span event names the exporter turns into event and exception items.
const CUSTOM_EVENT: &str = "ai.custom";
const CUSTOM_EVENT_NAME: &str = "ai.customEvent.name";
const EXCEPTION_EVENT: &str = "exception";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Http,
    AzureBlob,
}

impl DependencyKind {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::AzureBlob => "Azure Blob",
        }
    }
}

/// One outbound call, as reported to the monitoring backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRecord {
    pub kind: DependencyKind,
    /// Host the call went to.
    pub target: String,
    /// Short operation name, e.g. `GET /`.
    pub name: String,
    /// Full command or URL.
    pub data: String,
    pub start: DateTime<Utc>,
    pub duration: Duration,
    pub result_code: String,
    pub success: bool,
}

impl DependencyRecord {
    fn attributes(&self) -> Vec<KeyValue> {
        let mut attributes = vec![
            KeyValue::new("server.address", self.target.clone()),
            KeyValue::new("url.full", self.data.clone()),
        ];
        if let Ok(code) = self.result_code.parse::<i64>() {
            attributes.push(KeyValue::new("http.response.status_code", code));
        }
        match self.kind {
            DependencyKind::Http => {
                attributes.push(KeyValue::new("http.request.method", "GET"));
            }
            DependencyKind::AzureBlob => {
                attributes.push(KeyValue::new("rpc.system", self.kind.type_name()));
            }
        }
        attributes
    }
}

/// Sink for monitoring records.
pub trait Telemetry {
    /// Open the request that the records of iteration `count` belong to.
    ///
    /// `span` is the `tracing` span the iteration runs in.
    fn begin_iteration(&self, _count: u64, _span: &tracing::Span) {}

    fn track_dependency(&self, dependency: &DependencyRecord);

    fn track_event(&self, name: &str);

    fn track_exception(&self, error: &IterationError);

    /// Close the request opened by [`Telemetry::begin_iteration`].
    fn end_iteration(&self) {}
}

/// [`Telemetry`] on top of an OpenTelemetry tracer.
#[derive(Debug)]
pub struct OtelTelemetry {
    tracer: SdkTracer,
    operation: Context,
    operation_id: TraceId,
    iteration: Mutex<Option<Context>>,
}

impl OtelTelemetry {
    /// Bind `tracer` to a freshly generated operation id.
    pub fn new(tracer: SdkTracer) -> Self {
        let ids = RandomIdGenerator::default();
        let operation_id = ids.new_trace_id();
        let root = SpanContext::new(
            operation_id,
            ids.new_span_id(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        Self {
            tracer,
            operation: Context::new().with_remote_span_context(root),
            operation_id,
            iteration: Mutex::new(None),
        }
    }

    /// Operation id attached to every record, as 32 lowercase hex digits.
    pub fn operation_id(&self) -> String {
        self.operation_id.to_string()
    }

    fn iteration(&self) -> MutexGuard<'_, Option<Context>> {
        self.iteration.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_request(&self, name: String, attributes: Vec<KeyValue>) -> Context {
        let request = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Server)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, &self.operation);
        self.operation.with_span(request)
    }

    // Records outside an iteration get a request of their own.
    fn on_request(&self, name: &str, record: impl FnOnce(&Context)) {
        if let Some(cx) = self.iteration().as_ref() {
            record(cx);
            return;
        }
        let cx = self.start_request(name.to_string(), Vec::new());
        record(&cx);
        cx.span().end();
    }
}

impl Telemetry for OtelTelemetry {
    fn begin_iteration(&self, count: u64, span: &tracing::Span) {
        let cx = self.start_request(
            ITERATION_REQUEST.to_string(),
            vec![KeyValue::new("heartbeat.iteration", count as i64)],
        );
        if let Err(err) = span.set_parent(cx.clone()) {
            tracing::debug!(error = %err, "iteration span not linked to the operation");
        }
        let previous = self.iteration().replace(cx);
        if let Some(previous) = previous {
            previous.span().end();
        }
    }

    fn track_dependency(&self, dependency: &DependencyRecord) {
        let parent = self
            .iteration()
            .clone()
            .unwrap_or_else(|| self.operation.clone());

        let start = SystemTime::from(dependency.start);
        let mut span = self
            .tracer
            .span_builder(dependency.name.clone())
            .with_kind(SpanKind::Client)
            .with_start_time(start)
            .with_attributes(dependency.attributes())
            .start_with_context(&self.tracer, &parent);
        span.set_status(if dependency.success {
            Status::Ok
        } else {
            Status::error(format!("result code {}", dependency.result_code))
        });
        span.end_with_timestamp(start + dependency.duration);
    }

    fn track_event(&self, name: &str) {
        self.on_request(name, |cx| {
            cx.span().add_event(
                CUSTOM_EVENT,
                vec![KeyValue::new(CUSTOM_EVENT_NAME, name.to_string())],
            );
        });
    }

    fn track_exception(&self, error: &IterationError) {
        let mut chain = error.to_string();
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            chain.push_str("\ncaused by: ");
            chain.push_str(&cause.to_string());
            source = cause.source();
        }

        self.on_request(&format!("{} failure", error.kind()), |cx| {
            let request = cx.span();
            request.add_event(
                EXCEPTION_EVENT,
                vec![
                    KeyValue::new("exception.type", error.kind()),
                    KeyValue::new("exception.message", error.to_string()),
                    KeyValue::new("exception.stacktrace", chain),
                ],
            );
            request.set_status(Status::error(error.to_string()));
        });
    }

    fn end_iteration(&self) {
        let open = self.iteration().take();
        if let Some(cx) = open {
            cx.span().end();
        }
    }
}
