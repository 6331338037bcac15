// System
use std::{
    any::Any, collections::BTreeSet, future::Future, panic::AssertUnwindSafe, time::Duration,
};

// Third Party
use futures::FutureExt;
use tokio::{
    task::{JoinError, JoinSet},
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Local
use crate::error::Error;

/// How a supervised activity ended.
struct Exit {
    name: &'static str,
    result: Result<(), String>,
}

/// Tracks the background activities the process must wait for before it exits.
///
/// Every activity shares the same shutdown token. An activity that ends on its own before shutdown
/// was requested cancels the token, so the process never keeps running with a missing piece.
pub struct Supervisor {
    shutdown: CancellationToken,
    activities: JoinSet<Exit>,
    running: BTreeSet<&'static str>,
    failure: Option<Error>,
}

impl Supervisor {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            activities: JoinSet::new(),
            running: BTreeSet::new(),
            failure: None,
        }
    }

    /// Registers `activity` under `name` and starts it on the runtime.
    pub fn spawn<F>(&mut self, name: &'static str, activity: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        debug!("Starting supervised activity {}", name);
        self.running.insert(name);
        self.activities.spawn(async move {
            let result = match AssertUnwindSafe(activity).catch_unwind().await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(error)) => Err(format!("{:#}", error)),
                Err(panic) => Err(panic_message(panic)),
            };
            Exit { name, result }
        });
    }

    /// Blocks until shutdown is requested and then until every registered activity has finished,
    /// for at most `grace_period` after the request. Activities still running when the grace
    /// period expires are aborted.
    pub async fn wait(mut self, grace_period: Duration) -> Result<(), Error> {
        if self.running.is_empty() {
            return Ok(());
        }

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {}
            Some(joined) = self.activities.join_next() => {
                if let Some(name) = self.settle(joined) {
                    warn!("{} stopped before shutdown was requested, stopping everything else", name);
                }
                self.shutdown.cancel();
            }
        }

        let drained = time::timeout(grace_period, async {
            while let Some(joined) = self.activities.join_next().await {
                self.settle(joined);
            }
        })
        .await;

        if drained.is_err() {
            let remaining: Vec<&'static str> = self.running.iter().copied().collect();
            error!(
                "Shutdown grace period of {:?} expired, aborting {}",
                grace_period,
                remaining.join(", ")
            );
            self.activities.shutdown().await;
            return Err(Error::GracePeriodExpired {
                grace_period,
                remaining,
            });
        }

        self.failure.map_or(Ok(()), Err)
    }

    /// Records the outcome of a finished activity and returns its name.
    fn settle(&mut self, joined: Result<Exit, JoinError>) -> Option<&'static str> {
        let exit = match joined {
            Ok(exit) => exit,
            Err(error) => {
                error!("Unable to join supervised activity: {}", error);
                return None;
            }
        };
        self.running.remove(exit.name);
        match exit.result {
            Ok(()) => info!("{} stopped", exit.name),
            Err(reason) => {
                error!("{} failed: {}", exit.name, reason);
                self.failure.get_or_insert(Error::ActivityFailed {
                    name: exit.name,
                    reason,
                });
            }
        }
        Some(exit.name)
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
