//! Error types for the sync engine.

use thiserror::Error;

/// A single failed fetch attempt. Always eligible for retry.
#[derive(Debug, Error)]
pub enum TransientFetchError {
    #[error("HTTP {status}")]
    Status { status: u16 },
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Errors that end a tenant's run.
///
/// None of them leave the persisted cursor past the last fully ingested page.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unable to fetch posts before {before:?} after {attempts} attempts: {last}")]
    FetchExhausted {
        attempts: u32,
        before: Option<i64>,
        #[source]
        last: TransientFetchError,
    },
    #[error("failed to ingest page fetched before {before}: {source:#}")]
    Ingestion {
        before: i64,
        #[source]
        source: anyhow::Error,
    },
    #[error("tenant '{tenant}' is misconfigured: {message}")]
    Configuration { tenant: String, message: String },
    #[error("storage error: {0:#}")]
    Storage(#[source] anyhow::Error),
}

impl SyncError {
    /// Whether the error came from the remote API rather than local state.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::FetchExhausted { .. })
    }
}
