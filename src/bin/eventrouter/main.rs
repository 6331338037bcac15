// Third Party
use clap::Parser;
use tracing::warn;

// Local
use kube_event_router::{config::Args, coordinator, utils::init_tracing};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    init_tracing("kube_event_router", tracing::Level::INFO);
    let args = Args::parse();

    // Setup errors, e.g. unusable credentials, end the process with a non-zero status
    coordinator::run(&args).await?;

    warn!("Exiting main()");
    Ok(())
}
