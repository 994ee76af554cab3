// SPDX-License-Identifier: MIT
//! Status blobs: their names, their contents, and where they are written.
use std::future::Future;

use azure_storage::{CloudLocation, ConnectionString};
use azure_storage_blobs::prelude::{ClientBuilder, ContainerClient};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;

use crate::config::STORAGE_CONNECTION_STRING_VAR;
use crate::error::{ConfigError, IterationError};

/// Blob name for a status report written at `at`.
///
/// Second granularity: two reports within the same second share a name.
pub fn blob_name(at: DateTime<Utc>) -> String {
    format!("status-{}.txt", at.format("%Y-%m-%d-%H-%M-%S"))
}

/// UTF-8 body of a status report.
pub fn status_content(status: u16, at: DateTime<Utc>) -> String {
    format!(
        "Status: {status}\nTimestamp: {}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// A blob container the loop writes status reports into.
pub trait BlobStore {
    /// Create the container unless it already exists.
    fn ensure_container(&self) -> impl Future<Output = Result<(), IterationError>> + Send;

    /// Write `content` as `name`, replacing any blob of the same name.
    fn upload(
        &self,
        name: &str,
        content: String,
    ) -> impl Future<Output = Result<(), IterationError>> + Send;

    /// Fully qualified URL of the blob `name`.
    fn blob_url(&self, name: &str) -> Result<Url, IterationError>;
}

/// Azure Blob Storage container, addressed through a storage connection string.
#[derive(Debug, Clone)]
pub struct AzureBlobStore {
    container: ContainerClient,
}

impl AzureBlobStore {
    /// Parse `connection_string` and bind to `container`.
    ///
    /// A `BlobEndpoint` entry (as used by the storage emulator) takes precedence
    /// over the public cloud endpoint derived from the account name.
    pub fn from_connection_string(
        connection_string: &str,
        container: &str,
    ) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            key: STORAGE_CONNECTION_STRING_VAR,
            reason,
        };

        let parsed = ConnectionString::new(connection_string).map_err(|e| invalid(e.to_string()))?;
        let account = parsed
            .account_name
            .ok_or_else(|| invalid("missing AccountName".into()))?;
        let credentials = parsed
            .storage_credentials()
            .map_err(|e| invalid(e.to_string()))?;

        let builder = match parsed.blob_endpoint {
            Some(uri) => ClientBuilder::with_location(
                CloudLocation::Custom {
                    account: account.to_string(),
                    uri: uri.trim_end_matches('/').to_string(),
                },
                credentials,
            ),
            None => ClientBuilder::new(account, credentials),
        };

        Ok(Self {
            container: builder.container_client(container),
        })
    }
}

impl BlobStore for AzureBlobStore {
    async fn ensure_container(&self) -> Result<(), IterationError> {
        let exists = self
            .container
            .exists()
            .await
            .map_err(|e| IterationError::storage("container exists check", e))?;
        if !exists {
            self.container
                .create()
                .await
                .map_err(|e| IterationError::storage("container create", e))?;
            tracing::info!(container = self.container.container_name(), "created blob container");
        }
        Ok(())
    }

    async fn upload(&self, name: &str, content: String) -> Result<(), IterationError> {
        self.container
            .blob_client(name)
            .put_block_blob(content.into_bytes())
            .content_type("text/plain; charset=utf-8")
            .await
            .map_err(|e| IterationError::storage("upload", e))?;
        Ok(())
    }

    fn blob_url(&self, name: &str) -> Result<Url, IterationError> {
        self.container
            .blob_client(name)
            .url()
            .map_err(|e| IterationError::storage("blob url", e))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, s).unwrap()
            + chrono::Duration::milliseconds(ms as i64)
    }

    #[test]
    fn blob_name_has_second_granularity() {
        assert_eq!(blob_name(at(2, 1, 7, 0)), "status-2026-10-19-02-01-07.txt");
        assert_eq!(blob_name(at(2, 1, 7, 0)), blob_name(at(2, 1, 7, 999)));
        assert_ne!(blob_name(at(2, 1, 7, 999)), blob_name(at(2, 1, 8, 0)));
    }

    #[test]
    fn content_is_status_then_timestamp() {
        assert_eq!(
            status_content(200, at(23, 59, 59, 250)),
            "Status: 200\nTimestamp: 2026-10-19T23:59:59Z"
        );
        assert_eq!(
            status_content(503, at(0, 0, 0, 0)),
            "Status: 503\nTimestamp: 2026-10-19T00:00:00Z"
        );
    }

    const EMULATOR: &str = "DefaultEndpointsProtocol=http;AccountName=devstoreaccount1;\
        AccountKey=Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==;\
        BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1;";

    #[test]
    fn blob_endpoint_override_is_honoured() {
        let store = AzureBlobStore::from_connection_string(EMULATOR, "httpstatus").unwrap();
        let url = store.blob_url("status-2026-10-19-02-01-07.txt").unwrap();
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.port(), Some(10000));
        assert!(url
            .path()
            .ends_with("/httpstatus/status-2026-10-19-02-01-07.txt"));
    }

    #[test]
    fn public_cloud_url_derives_from_account_name() {
        let conn = "DefaultEndpointsProtocol=https;AccountName=heartbeatacct;\
            AccountKey=a2V5;EndpointSuffix=core.windows.net";
        let store = AzureBlobStore::from_connection_string(conn, "httpstatus").unwrap();
        let url = store.blob_url("status.txt").unwrap();
        assert_eq!(url.host_str(), Some("heartbeatacct.blob.core.windows.net"));
        assert_eq!(url.path(), "/httpstatus/status.txt");
    }

    #[test]
    fn connection_string_without_account_is_rejected() {
        let err = AzureBlobStore::from_connection_string("AccountKey=a2V5", "httpstatus").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: STORAGE_CONNECTION_STRING_VAR,
                ..
            }
        ));
    }
}
