//! The AWS/Lambda-powered NASA NEO ingest
//!
//! This library crate implements a daily extract-transform-load cycle: fetch
//! today's near-earth-object feed from NASA's NeoWs API, archive the raw JSON
//! to S3, flatten it into one row per object, and append the rows to a
//! DynamoDB table. The common codebase is compiled into three executables:
//! `neo-etl-proxyevent` for HTTP invocation through API Gateway or a function
//! URL, `neo-etl-scheduled` for direct EventBridge invocations, and
//! `neo-etl-oneshot` for running a single cycle from the command line.
//!
//! There's no state between invocations other than what ends up in S3 and the
//! table. In particular, running twice on the same day overwrites the archive
//! object but inserts every row a second time.

use lambda_http::{Body, Error, Response};
use tracing_subscriber::EnvFilter;

pub mod archive;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod load;
pub mod pipeline;
pub mod transform;

use crate::{
    archive::S3BlobStore,
    config::EtlConfig,
    error::ConfigError,
    fetch::NeoWsClient,
    load::DynamoRowSink,
    pipeline::{Pipeline, RunSummary},
};

pub struct Services {
    config: Result<EtlConfig, ConfigError>,
    pipeline: Pipeline<NeoWsClient, S3BlobStore, DynamoRowSink>,
}

impl Services {
    /// Create a state object for the NEO ingest.
    ///
    /// Incomplete configuration isn't fatal here: it's reported on every
    /// invocation instead, before any external service is contacted.
    pub async fn init() -> Result<Self, Error> {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false) // don't print the module name
            .without_time() // don't print time (CloudWatch has it)
            .with_writer(std::io::stderr) // stdout is reserved for the oneshot result
            .init();

        let config = EtlConfig::from_env();
        let aws = aws_config::load_from_env().await;

        let pipeline = Pipeline::new(
            NeoWsClient::new(reqwest::Client::builder().build()?),
            S3BlobStore::new(aws_sdk_s3::Client::new(&aws)),
            DynamoRowSink::new(aws_sdk_dynamodb::Client::new(&aws)),
        );

        Ok(Services { config, pipeline })
    }

    /// Handle an HTTP invocation for the current UTC date.
    pub async fn handle_http(&self) -> Result<Response<Body>, Error> {
        Ok(self.pipeline.respond(&self.config).await?)
    }

    /// Run one cycle for the current UTC date outside of HTTP, where there's
    /// no response to carry a configuration failure.
    pub async fn run_once(&self) -> Result<RunSummary, Error> {
        let config = self.config.as_ref().map_err(|e| -> Error { e.to_string().into() })?;
        Ok(self.pipeline.run(config).await?)
    }
}
