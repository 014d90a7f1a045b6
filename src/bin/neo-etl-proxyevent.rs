//! "Proxy event" version of the NEO ingest Lambda.
//!
//! This executable defines a server that expects to be interacted with
//! according to AWS API Gateway's "proxy event" protocol (function URLs use
//! the same shape). The request itself is ignored: every invocation runs one
//! cycle for the current UTC date.

use lambda_http::{run, service_fn, Error, Request};

use neo_etl_lambda::Services;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let svcs = Services::init().await?;
    let ref_svcs = &svcs;

    run(service_fn(|_req: Request| async move {
        ref_svcs.handle_http().await
    }))
    .await?;
    Ok(())
}
