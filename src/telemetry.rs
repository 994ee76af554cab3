// SPDX-License-Identifier: MIT
//! Telemetry initialization: Application Insights export, Live Metrics, the
//! optional OTLP diagnostics provider, and the `tracing` subscriber.
//!
//! * [`TelemetryConfig`] – connection string, role name/instance, Live Metrics & optional OTLP endpoint.
//! * [`init_telemetry`] – builds the tracer providers and installs the global subscriber.
//! * [`TelemetryHandle`] – hands out the [`OtelTelemetry`] client and flushes on shutdown.
//!
//! Feature flags:
//!
//! * `console-log` (default) – add a compact console formatting layer on stderr.
//!
//! # Providers
//! The Application Insights provider only carries the records [`OtelTelemetry`]
//! produces. `tracing` spans are bridged to a separate provider that exports over
//! OTLP, and only when an OTLP endpoint is configured.
//!
//! # Shutdown
//! Call [`TelemetryHandle::shutdown`] before exiting the Tokio runtime to flush any remaining batches.
//!
//! # Threading Model
//! Batch exporters run on their own worker threads and use blocking HTTP clients. The
//! Application Insights client is built on a plain thread since blocking `reqwest`
//! clients must not be created inside the async runtime. Live Metrics runs as a task
//! on the Tokio runtime with an async client, so [`init_telemetry`] must be called
//! from within the runtime when it is enabled.
use anyhow::{anyhow, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_application_insights::{Exporter, LiveMetricsSpanProcessor};
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use tracing_opentelemetry::OpenTelemetryLayer;
#[cfg(feature = "console-log")]
use tracing_subscriber::fmt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

use crate::config::Settings;
use crate::insights::OtelTelemetry;

const INSTRUMENTATION_NAME: &str = "http-status-heartbeat";

/// Configuration used when initializing telemetry.
#[derive(Clone)]
pub struct TelemetryConfig {
    /// Application Insights connection string.
    pub connection_string: String,
    /// Logical role name (`service.name`).
    pub role_name: String,
    /// Role instance, normally the host name (`service.instance.id`).
    pub role_instance: String,
    /// Service version reported in resource attributes (`service.version`).
    pub service_version: String,
    /// Base OTLP endpoint (without per-signal suffix); `None` leaves `tracing` spans unexported.
    pub otlp_endpoint: Option<String>,
    /// Stream Live Metrics from the Application Insights provider.
    pub live_metrics: bool,
}

impl TelemetryConfig {
    pub fn new(settings: &Settings, role_instance: impl Into<String>) -> Self {
        Self {
            connection_string: settings.insights_connection_string.clone(),
            role_name: settings.role_name.clone(),
            role_instance: role_instance.into(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: settings.otlp_endpoint.clone(),
            live_metrics: settings.live_metrics,
        }
    }

    fn resource(&self) -> Resource {
        Resource::builder()
            .with_service_name(self.role_name.clone())
            .with_attributes([
                KeyValue::new("service.instance.id", self.role_instance.clone()),
                KeyValue::new("service.version", self.service_version.clone()),
                KeyValue::new(
                    "deployment.environment",
                    std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".into()),
                ),
            ])
            .build()
    }
}

/// Host identifier used as the role instance.
pub fn host_identifier() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown-host".to_string())
}

/// Handle owning the tracer providers.
///
/// Dropping the handle without calling [`TelemetryHandle::shutdown`] may lose
/// the final batch.
pub struct TelemetryHandle {
    tracer_provider: SdkTracerProvider,
    diagnostics_provider: Option<SdkTracerProvider>,
}

impl TelemetryHandle {
    /// A telemetry client bound to a new random operation id.
    pub fn client(&self) -> OtelTelemetry {
        OtelTelemetry::new(self.tracer_provider.tracer(INSTRUMENTATION_NAME))
    }

    /// Flush and shutdown every provider and the exporters behind them.
    pub fn shutdown(self) -> Result<()> {
        if let Some(diagnostics) = self.diagnostics_provider {
            diagnostics
                .shutdown()
                .map_err(|e| anyhow!("diagnostics tracer: {e}"))?;
        }
        self.tracer_provider
            .shutdown()
            .map_err(|e| anyhow!("tracer: {e}"))
    }
}

/// Build the tracer providers and install the global `tracing` subscriber.
///
/// # Errors
/// Returns an error if the connection string is rejected by the exporter or the
/// OTLP endpoint is unusable.
pub fn init_telemetry(cfg: TelemetryConfig) -> Result<TelemetryHandle> {
    let tracer_provider = build_provider(&cfg)?;
    global::set_tracer_provider(tracer_provider.clone());

    let diagnostics_provider = build_diagnostics_provider(&cfg)?;
    let otel_trace_layer = diagnostics_provider
        .as_ref()
        .map(|provider| OpenTelemetryLayer::new(provider.tracer(INSTRUMENTATION_NAME)));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Console formatting: plain compact single-line output, kept off stdout.
    #[cfg(feature = "console-log")]
    let fmt_layer_plain = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact();

    #[cfg(feature = "console-log")]
    Registry::default()
        .with(filter)
        .with(fmt_layer_plain)
        .with(otel_trace_layer)
        .try_init()?;

    #[cfg(not(feature = "console-log"))]
    Registry::default()
        .with(filter)
        .with(otel_trace_layer)
        .try_init()?;

    Ok(TelemetryHandle {
        tracer_provider,
        diagnostics_provider,
    })
}

fn insights_exporter<C>(cfg: &TelemetryConfig, client: C) -> Result<Exporter<C>> {
    Exporter::new_from_connection_string(&cfg.connection_string, client)
        .map_err(|e| anyhow!("invalid Application Insights connection string: {e}"))
}

fn build_provider(cfg: &TelemetryConfig) -> Result<SdkTracerProvider> {
    let thread_cfg = cfg.clone();
    let batch_exporter = std::thread::spawn(move || {
        insights_exporter(&thread_cfg, reqwest::blocking::Client::new())
    })
    .join()
    .map_err(|_| anyhow!("Application Insights client construction panicked"))??;

    let mut builder = SdkTracerProvider::builder()
        .with_batch_exporter(batch_exporter)
        .with_resource(cfg.resource());

    if cfg.live_metrics {
        let live_exporter = insights_exporter(cfg, reqwest::Client::new())?;
        builder = builder.with_span_processor(LiveMetricsSpanProcessor::new(
            live_exporter,
            runtime::Tokio,
        ));
    }

    Ok(builder.build())
}

// `tracing` spans go to OTLP only, never to Application Insights.
fn build_diagnostics_provider(cfg: &TelemetryConfig) -> Result<Option<SdkTracerProvider>> {
    let Some(endpoint) = &cfg.otlp_endpoint else {
        return Ok(None);
    };
    // Build exporter (HTTP binary OTLP)
    let base = endpoint.trim_end_matches('/');
    let span_exporter = SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(format!("{}/v1/traces", base))
        .build()?;
    Ok(Some(
        SdkTracerProvider::builder()
            .with_batch_exporter(span_exporter)
            .with_resource(cfg.resource())
            .build(),
    ))
}
