// SPDX-License-Identifier: MIT
//! The polling loop.
//!
//! [`Heartbeat`] owns everything one iteration needs: settings, the HTTP probe, the
//! blob store, the telemetry client, the clock and the iteration counter. Each
//! [`Heartbeat::tick`] opens the iteration's request, runs the iteration to
//! completion (or failure), reports a failure as exception telemetry, closes the
//! request, advances the counter and then sleeps for the
//! configured interval. The delay is added after the iteration, so the effective
//! period is the iteration time plus the interval.
use std::time::Duration;

use tracing::{debug, error, info_span, Instrument};

use crate::clock::Clock;
use crate::config::Settings;
use crate::error::IterationError;
use crate::insights::{DependencyKind, DependencyRecord, Telemetry, HEARTBEAT_EVENT};
use crate::probe::{HttpProbe, ProbeResponse};
use crate::storage::{blob_name, status_content, BlobStore};

/// What one successful iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    pub response: ProbeResponse,
    pub blob_name: String,
}

/// Result of a single [`Heartbeat::tick`].
#[derive(Debug)]
pub struct Tick {
    /// Counter value the iteration ran with.
    pub count: u64,
    pub outcome: Result<IterationReport, IterationError>,
    /// Console line printed for this tick, if any.
    pub status_line: Option<String>,
}

/// Console line for a successful iteration, printed on every `every`-th count.
pub fn status_line(count: u64, status: u16, every: u64) -> Option<String> {
    (count % every == 0).then(|| format!("Heartbeat #{count} sent - HTTP Status: {status}"))
}

pub struct Heartbeat<P, S, T, C> {
    settings: Settings,
    probe: P,
    store: S,
    telemetry: T,
    clock: C,
    count: u64,
}

impl<P, S, T, C> Heartbeat<P, S, T, C>
where
    P: HttpProbe,
    S: BlobStore,
    T: Telemetry,
    C: Clock,
{
    pub fn new(settings: Settings, probe: P, store: S, telemetry: T, clock: C) -> Self {
        Self {
            settings,
            probe,
            store,
            telemetry,
            clock,
            count: 1,
        }
    }

    /// Counter value the next iteration will run with.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    /// Run forever. Only process termination stops the loop.
    pub async fn run(&mut self) {
        loop {
            self.tick().await;
        }
    }

    /// One iteration, its error reporting, the counter increment and the delay.
    pub async fn tick(&mut self) -> Tick {
        let count = self.count;
        let span = info_span!("heartbeat", iteration = count);
        self.telemetry.begin_iteration(count, &span);

        let outcome = self.iterate().instrument(span.clone()).await;
        let status_line = match &outcome {
            Ok(report) => {
                let line = status_line(count, report.response.status, self.settings.report_every);
                if let Some(line) = &line {
                    println!("{line}");
                }
                line
            }
            Err(err) => {
                span.in_scope(|| {
                    self.telemetry.track_exception(err);
                    error!(error = %err, "heartbeat iteration failed");
                });
                println!("Error: {err}");
                None
            }
        };
        self.telemetry.end_iteration();

        self.count += 1;
        self.clock.sleep(self.settings.interval).await;

        Tick {
            count,
            outcome,
            status_line,
        }
    }

    async fn iterate(&self) -> Result<IterationReport, IterationError> {
        let url = &self.settings.target_url;
        let started = self.clock.now();
        let response = self.probe.get(url).await?;

        self.store.ensure_container().await?;

        let name = blob_name(self.clock.now());
        let blob_url = self.store.blob_url(&name)?;
        let content = status_content(response.status, self.clock.now());

        // Reported before the upload runs, with a fixed success code.
        let now = self.clock.now();
        self.telemetry.track_dependency(&DependencyRecord {
            kind: DependencyKind::AzureBlob,
            target: blob_url.host_str().unwrap_or_default().to_string(),
            name: format!("Upload {name}"),
            data: blob_url.to_string(),
            start: started,
            duration: elapsed(started, now),
            result_code: "200".into(),
            success: true,
        });

        self.store.upload(&name, content).await?;
        debug!(blob = %name, status = response.status, "uploaded status blob");

        let now = self.clock.now();
        self.telemetry.track_dependency(&DependencyRecord {
            kind: DependencyKind::Http,
            target: url.host_str().unwrap_or_default().to_string(),
            name: format!("GET {}", url.path()),
            data: url.to_string(),
            start: now,
            duration: response.date.map_or(Duration::ZERO, |date| elapsed(date, now)),
            result_code: response.status.to_string(),
            success: response.is_success(),
        });

        self.telemetry.track_event(HEARTBEAT_EVENT);

        Ok(IterationReport {
            response,
            blob_name: name,
        })
    }
}

// Negative spans (clock skew against a server `Date` header) clamp to zero.
fn elapsed(from: chrono::DateTime<chrono::Utc>, to: chrono::DateTime<chrono::Utc>) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}
