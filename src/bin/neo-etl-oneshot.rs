//! "Oneshot" version of the NEO ingest.
//!
//! This executable runs one cycle for today's date from the command line and
//! prints the response JSON to standard output. Configuration can come from a
//! `.env` file in the working directory.

use lambda_runtime::Error;

use neo_etl_lambda::Services;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // A missing .env is fine; the real environment still applies.
    let _ = dotenvy::dotenv();

    let svcs = Services::init().await?;
    let summary = svcs.run_once().await?;

    serde_json::to_writer(std::io::stdout().lock(), &summary)?;
    println!();
    Ok(())
}
