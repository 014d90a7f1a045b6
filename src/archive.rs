//! Archiving the raw feed to S3.
//!
//! One object per calendar date, under a `raw/neo/YYYY/MM/DD/` prefix. A
//! second run for the same date simply overwrites the object.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{Datelike, NaiveDate};
use lambda_runtime::tracing;

use crate::{
    config::EtlConfig,
    error::{BoxError, EtlError},
    feed::RawFeedPayload,
};

pub const CONTENT_TYPE: &str = "application/json";

/// Somewhere that we can write whole objects.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), BoxError>;
}

#[derive(Clone, Debug)]
pub struct S3BlobStore {
    s3c: aws_sdk_s3::Client,
}

impl S3BlobStore {
    pub fn new(s3c: aws_sdk_s3::Client) -> Self {
        S3BlobStore { s3c }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), BoxError> {
        self.s3c
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await?;
        Ok(())
    }
}

/// The object key for the raw feed of `date`.
pub fn archive_key(date: NaiveDate) -> String {
    format!(
        "raw/neo/{}/{:02}/{:02}/neo_{}.json",
        date.year(),
        date.month(),
        date.day(),
        date
    )
}

/// Write the raw payload, as compact JSON, to its date-keyed location.
///
/// Returns the key that was written.
pub async fn archive_raw<S: BlobStore + ?Sized>(
    store: &S,
    config: &EtlConfig,
    payload: &RawFeedPayload,
    date: NaiveDate,
) -> Result<String, EtlError> {
    let key = archive_key(date);

    let body = serde_json::to_vec(payload).map_err(|e| EtlError::StorageWrite {
        key: key.clone(),
        source: e.into(),
    })?;

    store
        .put_object(&config.bucket, &key, CONTENT_TYPE, body)
        .await
        .map_err(|source| EtlError::StorageWrite {
            key: key.clone(),
            source,
        })?;

    tracing::info!("raw JSON saved to s3://{}/{}", config.bucket, key);
    Ok(key)
}
