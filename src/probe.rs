// SPDX-License-Identifier: MIT
//! The outbound HTTP GET performed once per iteration.
use std::future::Future;

use chrono::{DateTime, Utc};
use reqwest::header::DATE;
use reqwest::Url;

use crate::error::IterationError;

/// What the loop keeps from a probe response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    /// Parsed `Date` response header, if present and well formed.
    pub date: Option<DateTime<Utc>>,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs the GET. Non-2xx statuses are responses, not errors.
pub trait HttpProbe {
    fn get(&self, url: &Url) -> impl Future<Output = Result<ProbeResponse, IterationError>> + Send;
}

/// `reqwest`-backed probe. Timeouts are the client defaults.
#[derive(Debug, Clone, Default)]
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &Url) -> Result<ProbeResponse, IterationError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| IterationError::http(url.as_str(), e))?;

        let date = response
            .headers()
            .get(DATE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date);

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            date,
        })
    }
}

/// Parse an HTTP `Date` header (IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_imf_fixdate() {
        assert_eq!(
            parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"),
            Some(Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap())
        );
    }

    #[test]
    fn malformed_date_is_absent() {
        assert_eq!(parse_http_date("yesterday-ish"), None);
        assert_eq!(parse_http_date(""), None);
    }

    #[test]
    fn only_2xx_is_success() {
        let resp = |status| ProbeResponse { status, date: None };
        assert!(resp(200).is_success());
        assert!(resp(204).is_success());
        assert!(!resp(301).is_success());
        assert!(!resp(404).is_success());
        assert!(!resp(503).is_success());
    }

    #[tokio::test]
    async fn connection_refused_is_an_http_error() {
        // Port 9 (discard) on loopback is closed in any sane test environment.
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let err = ReqwestProbe::default().get(&url).await.unwrap_err();
        assert_eq!(err.kind(), "http");
        assert!(err.to_string().starts_with("GET http://127.0.0.1:9/ failed"));
    }
}
