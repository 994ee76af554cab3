// SPDX-License-Identifier: MIT
//! HTTP status heartbeat: a long-running probe that polls a URL once per interval,
//! writes the response status to Azure Blob Storage and reports every step to
//! Application Insights.
//!
//! The loop itself lives in [`heartbeat`]; each external concern sits behind a
//! small trait so the loop can be exercised without network access:
//! * [`probe::HttpProbe`] – the outbound GET.
//! * [`storage::BlobStore`] – the status blob container.
//! * [`insights::Telemetry`] – per-iteration requests with their dependency, custom event & exception records.
//! * [`clock::Clock`] – wall-clock time and the fixed inter-iteration delay.
//!
//! # Feature Flags
//! * `console-log` (default) – compact console formatter for diagnostics on stderr.
//!
//! # Quick Start
//! ```no_run
//! use http_status_heartbeat::clock::SystemClock;
//! use http_status_heartbeat::config::Settings;
//! use http_status_heartbeat::heartbeat::Heartbeat;
//! use http_status_heartbeat::probe::ReqwestProbe;
//! use http_status_heartbeat::storage::AzureBlobStore;
//! use http_status_heartbeat::telemetry::{host_identifier, init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let handle = init_telemetry(TelemetryConfig::new(&settings, host_identifier()))?;
//!     let store = AzureBlobStore::from_connection_string(
//!         &settings.storage_connection_string,
//!         &settings.container,
//!     )?;
//!     let mut heartbeat = Heartbeat::new(
//!         settings,
//!         ReqwestProbe::default(),
//!         store,
//!         handle.client(),
//!         SystemClock,
//!     );
//!     heartbeat.tick().await;
//!     handle.shutdown()?;
//!     Ok(())
//! }
//! ```
pub mod clock;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod insights;
pub mod probe;
pub mod storage;
pub mod telemetry;
