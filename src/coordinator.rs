// System
use std::{future::Future, time::Duration};

// Third Party
use tokio_util::sync::CancellationToken;
use tracing::info;

// Local
use crate::{
    client::resolve_client, config::Args, error::Error, informer::EventInformer,
    router::EventRouter, shutdown::ShutdownSignal, sink::JsonSink, supervisor::Supervisor,
};

/// Resolves the cluster client, wires the event informer to the event router and runs both until
/// a shutdown signal arrives and they have stopped.
///
/// Client resolution happens before anything is started, so a failure there leaves nothing
/// running behind.
pub async fn run(args: &Args) -> Result<(), Error> {
    let client = resolve_client(args.kubeconfig()).await?;
    let mut informer = EventInformer::new(client, args.resync_interval);
    let router = EventRouter::new(&mut informer, JsonSink::stdout());

    let shutdown = ShutdownSignal::listen()?;
    let router = router.run(shutdown.clone());
    let informer = informer.run(shutdown.clone());
    supervise(shutdown, informer, router, args.shutdown_grace_period).await
}

/// Starts `router` and `informer` as supervised activities sharing `shutdown`, then waits for both
/// to stop.
pub async fn supervise<I, R>(
    shutdown: CancellationToken,
    informer: I,
    router: R,
    grace_period: Duration,
) -> Result<(), Error>
where
    I: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    R: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
{
    let mut supervisor = Supervisor::new(shutdown);
    supervisor.spawn("event-router", router);
    info!("Starting shared informer(s)");
    supervisor.spawn("event-informer", informer);
    supervisor.wait(grace_period).await
}
