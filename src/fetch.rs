//! Fetching the NeoWs feed.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use lambda_runtime::tracing;

use crate::{config::EtlConfig, error::EtlError, feed::RawFeedPayload};

/// A source of raw NEO feed payloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the feed for the single-day range `[date, date]`.
    async fn fetch_feed(
        &self,
        config: &EtlConfig,
        date: NaiveDate,
    ) -> Result<RawFeedPayload, EtlError>;
}

/// Talks to the NASA NeoWs REST API.
#[derive(Clone, Debug)]
pub struct NeoWsClient {
    http: reqwest::Client,
}

impl NeoWsClient {
    pub fn new(http: reqwest::Client) -> Self {
        NeoWsClient { http }
    }
}

#[async_trait]
impl FeedSource for NeoWsClient {
    async fn fetch_feed(
        &self,
        config: &EtlConfig,
        date: NaiveDate,
    ) -> Result<RawFeedPayload, EtlError> {
        let date = date.to_string();
        tracing::info!(url = %config.feed_url, %date, "fetching NEO feed");

        let resp = self
            .http
            .get(&config.feed_url)
            .query(&feed_query(config, &date))
            .send()
            .await
            .map_err(upstream)?
            .error_for_status()
            .map_err(upstream)?;

        let payload = resp.json().await.map_err(upstream)?;

        Ok(RawFeedPayload(payload))
    }
}

// The API key is part of the request URL, so keep the URL out of errors.
fn upstream(e: reqwest::Error) -> EtlError {
    EtlError::UpstreamFetch(e.without_url().into())
}

fn feed_query<'a>(config: &'a EtlConfig, date: &'a str) -> [(&'static str, &'a str); 3] {
    [
        ("start_date", date),
        ("end_date", date),
        ("api_key", &config.api_key),
    ]
}

/// Fetch the feed for the current UTC date, returning the payload along with
/// the date used.
pub async fn fetch_today<F: FeedSource + ?Sized>(
    source: &F,
    config: &EtlConfig,
) -> Result<(RawFeedPayload, NaiveDate), EtlError> {
    fetch_today_at(source, config, Utc::now()).await
}

/// Fetch the feed for the UTC calendar date of `now`.
pub async fn fetch_today_at<F: FeedSource + ?Sized>(
    source: &F,
    config: &EtlConfig,
    now: DateTime<Utc>,
) -> Result<(RawFeedPayload, NaiveDate), EtlError> {
    let today = now.date_naive();
    let payload = source.fetch_feed(config, today).await?;
    Ok((payload, today))
}
