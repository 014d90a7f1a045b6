//! Sequencing one ETL cycle: fetch, archive, transform, load.

use chrono::{DateTime, NaiveDate, Utc};
use lambda_http::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    Body, Response,
};
use lambda_runtime::tracing;
use serde::Serialize;

use crate::{
    archive::{archive_raw, BlobStore},
    config::EtlConfig,
    error::{ConfigError, EtlError},
    fetch::{fetch_today_at, FeedSource},
    load::{load_records, LoadOutcome, RowSink},
    transform::transform_records,
};

pub const MISSING_CONFIG_MESSAGE: &str = "Missing required environment variables";

/// The result of one successful cycle.
///
/// Only `status`, `rows_inserted`, and `date` are reported to the caller.
/// `rows_inserted` counts the transformed records, whether or not the table
/// accepted all of them; the real load outcome stays internal.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub status: &'static str,
    pub rows_inserted: usize,
    pub date: NaiveDate,
    #[serde(skip)]
    pub archive_key: String,
    #[serde(skip)]
    pub load: LoadOutcome,
}

/// The three external services that a cycle talks to.
pub struct Pipeline<F, B, S> {
    pub feed: F,
    pub store: B,
    pub sink: S,
}

impl<F, B, S> Pipeline<F, B, S>
where
    F: FeedSource,
    B: BlobStore,
    S: RowSink,
{
    pub fn new(feed: F, store: B, sink: S) -> Self {
        Pipeline { feed, store, sink }
    }

    /// Run one full cycle for the current UTC date.
    pub async fn run(&self, config: &EtlConfig) -> Result<RunSummary, EtlError> {
        self.run_at(config, Utc::now()).await
    }

    /// Run one full cycle for the UTC calendar date of `now`.
    pub async fn run_at(
        &self,
        config: &EtlConfig,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, EtlError> {
        tracing::info!("starting NASA NEO ETL");

        let (payload, date) = fetch_today_at(&self.feed, config, now).await?;
        let archive_key = archive_raw(&self.store, config, &payload, date).await?;
        let records = transform_records(&payload, date)?;
        let load = load_records(&self.sink, config, &records).await?;

        Ok(RunSummary {
            status: "success",
            rows_inserted: records.len(),
            date,
            archive_key,
            load,
        })
    }

    /// Handle an HTTP invocation for the current UTC date.
    pub async fn respond(
        &self,
        config: &Result<EtlConfig, ConfigError>,
    ) -> Result<Response<Body>, EtlError> {
        self.respond_at(config, Utc::now()).await
    }

    /// Handle an HTTP invocation as if it arrived at `now`.
    ///
    /// Incomplete configuration gets a plain-text 500 without touching any
    /// external service. Errors from the cycle itself are passed up for the
    /// Lambda runtime to deal with.
    pub async fn respond_at(
        &self,
        config: &Result<EtlConfig, ConfigError>,
        now: DateTime<Utc>,
    ) -> Result<Response<Body>, EtlError> {
        let config = match config {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("{e}");
                return Ok(text_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    MISSING_CONFIG_MESSAGE,
                ));
            }
        };

        let summary = self.run_at(config, now).await?;
        Ok(json_response(&summary))
    }
}

fn text_response(status: StatusCode, text: &str) -> Response<Body> {
    let mut resp = Response::new(Body::from(text.to_owned()));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    resp
}

fn json_response(summary: &RunSummary) -> Response<Body> {
    let text = serde_json::json!({
        "status": summary.status,
        "rows_inserted": summary.rows_inserted,
        "date": summary.date.to_string(),
    })
    .to_string();

    let mut resp = Response::new(Body::from(text));
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}
