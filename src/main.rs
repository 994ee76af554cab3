// SPDX-License-Identifier: MIT
use anyhow::Result;
use http_status_heartbeat::clock::SystemClock;
use http_status_heartbeat::config::Settings;
use http_status_heartbeat::heartbeat::Heartbeat;
use http_status_heartbeat::probe::ReqwestProbe;
use http_status_heartbeat::storage::AzureBlobStore;
use http_status_heartbeat::telemetry::{host_identifier, init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // A local .env may carry the secrets; its absence is fine.
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;
    let store =
        AzureBlobStore::from_connection_string(&settings.storage_connection_string, &settings.container)?;

    let role_instance = host_identifier();
    let telemetry = init_telemetry(TelemetryConfig::new(&settings, role_instance.clone()))?;
    let client = telemetry.client();

    println!("Starting {} on {}", settings.role_name, role_instance);
    println!("Press Ctrl+C to exit.");
    info!(
        operation_id = %client.operation_id(),
        target = %settings.target_url,
        container = %settings.container,
        interval = ?settings.interval,
        live_metrics = settings.live_metrics,
        "application started"
    );

    let mut heartbeat = Heartbeat::new(settings, ReqwestProbe::default(), store, client, SystemClock);
    tokio::select! {
        _ = heartbeat.run() => {}
        signal = tokio::signal::ctrl_c() => signal?,
    }

    info!(iterations = heartbeat.count() - 1, "shutting down");
    telemetry.shutdown()?;
    Ok(())
}
