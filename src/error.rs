//! Error types for the ETL cycle.
//!
//! Only [`ConfigError`] is handled gracefully, by turning it into an HTTP 500
//! response. Everything in [`EtlError`] propagates up to the Lambda runtime.
//! Per-row insert failures are not errors at all: see
//! [`crate::load::LoadOutcome`].

use thiserror::Error;

/// Boxed source error from one of the external clients.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("NEO feed request failed: {0}")]
    UpstreamFetch(#[source] BoxError),

    #[error("failed to archive raw feed to `{key}`: {source}")]
    StorageWrite {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("insert into table `{table}` failed: {source}")]
    Load {
        table: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("malformed NEO feed payload: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("malformed near-earth object #{index} for {date}: {source}")]
    Object {
        date: String,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}
