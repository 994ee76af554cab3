// SPDX-License-Identifier: MIT
//! Process settings: two required secrets plus defaults for everything else.
//!
//! Values are sourced from environment variables:
//! * `APPLICATION_INSIGHTS_CONNECTION_STRING` – required, monitoring backend.
//! * `AZURE_STORAGE_CONNECTION_STRING` – required, blob storage account.
//! * `HEARTBEAT_TARGET_URL` – URL polled each iteration (default `https://www.microsoft.com`).
//! * `HEARTBEAT_CONTAINER` – destination blob container (default `httpstatus`).
//! * `HEARTBEAT_INTERVAL_MS` – delay added after every iteration (default `1000`).
//! * `HEARTBEAT_REPORT_EVERY` – console status cadence (default `10`).
//! * `HEARTBEAT_LIVE_METRICS` – `false` turns off the Live Metrics stream (default `true`).
//! * `OTEL_SERVICE_NAME` – logical role name reported with all telemetry (default `JPConsoleApp`).
//! * `OTEL_EXPORTER_OTLP_ENDPOINT` – optional OTLP collector for the diagnostic `tracing` spans.
use std::fmt;
use std::time::Duration;

use reqwest::Url;

use crate::error::ConfigError;

pub const INSIGHTS_CONNECTION_STRING_VAR: &str = "APPLICATION_INSIGHTS_CONNECTION_STRING";
pub const STORAGE_CONNECTION_STRING_VAR: &str = "AZURE_STORAGE_CONNECTION_STRING";

pub const DEFAULT_TARGET_URL: &str = "https://www.microsoft.com";
pub const DEFAULT_CONTAINER: &str = "httpstatus";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_REPORT_EVERY: u64 = 10;
pub const DEFAULT_ROLE_NAME: &str = "JPConsoleApp";

#[derive(Clone)]
pub struct Settings {
    pub insights_connection_string: String,
    pub storage_connection_string: String,
    pub target_url: Url,
    pub container: String,
    /// Fixed delay applied after each iteration, not a fixed rate.
    pub interval: Duration,
    /// Print a console status line when the counter is a multiple of this.
    pub report_every: u64,
    pub role_name: String,
    pub otlp_endpoint: Option<String>,
    /// Stream Live Metrics alongside the regular export.
    pub live_metrics: bool,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup.
    ///
    /// Blank values count as unset, for the secrets and the overrides alike.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let insights_connection_string = get(INSIGHTS_CONNECTION_STRING_VAR)
            .ok_or(ConfigError::Missing(INSIGHTS_CONNECTION_STRING_VAR))?;
        let storage_connection_string = get(STORAGE_CONNECTION_STRING_VAR)
            .ok_or(ConfigError::Missing(STORAGE_CONNECTION_STRING_VAR))?;

        let raw_url = get("HEARTBEAT_TARGET_URL").unwrap_or_else(|| DEFAULT_TARGET_URL.into());
        let target_url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            key: "HEARTBEAT_TARGET_URL",
            reason: e.to_string(),
        })?;
        if !matches!(target_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: "HEARTBEAT_TARGET_URL",
                reason: format!("unsupported scheme `{}`", target_url.scheme()),
            });
        }

        let container = get("HEARTBEAT_CONTAINER").unwrap_or_else(|| DEFAULT_CONTAINER.into());

        let interval = match get("HEARTBEAT_INTERVAL_MS") {
            Some(ms) => Duration::from_millis(parse_number("HEARTBEAT_INTERVAL_MS", &ms)?),
            None => DEFAULT_INTERVAL,
        };

        let report_every = match get("HEARTBEAT_REPORT_EVERY") {
            Some(n) => parse_number("HEARTBEAT_REPORT_EVERY", &n)?,
            None => DEFAULT_REPORT_EVERY,
        };
        if report_every == 0 {
            return Err(ConfigError::Invalid {
                key: "HEARTBEAT_REPORT_EVERY",
                reason: "must be at least 1".into(),
            });
        }

        let live_metrics = match get("HEARTBEAT_LIVE_METRICS") {
            Some(flag) => parse_flag("HEARTBEAT_LIVE_METRICS", &flag)?,
            None => true,
        };

        Ok(Self {
            insights_connection_string,
            storage_connection_string,
            target_url,
            container,
            interval,
            report_every,
            role_name: get("OTEL_SERVICE_NAME").unwrap_or_else(|| DEFAULT_ROLE_NAME.into()),
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
            live_metrics,
        })
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        key,
        reason: format!("`{value}`: {e}"),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("`{value}` is not a boolean"),
        }),
    }
}

// Connection strings embed account keys; keep them out of logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("insights_connection_string", &"<redacted>")
            .field("storage_connection_string", &"<redacted>")
            .field("target_url", &self.target_url.as_str())
            .field("container", &self.container)
            .field("interval", &self.interval)
            .field("report_every", &self.report_every)
            .field("role_name", &self.role_name)
            .field("otlp_endpoint", &self.otlp_endpoint)
            .field("live_metrics", &self.live_metrics)
            .finish()
    }
}
