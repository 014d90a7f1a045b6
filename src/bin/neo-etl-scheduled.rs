//! Direct-invocation version of the NEO ingest Lambda.
//!
//! EventBridge schedules invoke the function with their own JSON event rather
//! than an HTTP proxy event. We don't look at it; we just run a cycle and
//! return the summary as the invocation result.

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;

use neo_etl_lambda::Services;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let svcs = Services::init().await?;
    let ref_svcs = &svcs;

    run(service_fn(|_event: LambdaEvent<Value>| async move {
        let summary = ref_svcs.run_once().await?;
        Ok::<Value, Error>(serde_json::to_value(summary)?)
    }))
    .await?;
    Ok(())
}
