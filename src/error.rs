// SPDX-License-Identifier: MIT
//! Error types for startup configuration and individual loop iterations.
use thiserror::Error;

/// Boxed source error carried by [`IterationError`] variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal configuration problems detected before the loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required secret is absent or blank.
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    /// An override or secret is present but cannot be used.
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// A failure somewhere inside one pass of the polling loop.
///
/// These are never fatal. The loop driver reports them and moves on.
#[derive(Debug, Error)]
pub enum IterationError {
    #[error("GET {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: BoxError,
    },
    #[error("blob storage {operation} failed: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
}

impl IterationError {
    pub fn http(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Http {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn storage(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Storage {
            operation,
            source: source.into(),
        }
    }

    /// Short stable label reported as the exception type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Storage { .. } => "storage",
        }
    }
}
