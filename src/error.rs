// System
use std::{path::PathBuf, time::Duration};

// Third Party
use kube::config::{InClusterError, KubeconfigError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unable to load kubeconfig {path:?}: {source}")]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },

    #[error("in-cluster configuration unavailable: {0}")]
    InCluster(#[from] InClusterError),

    /// Wraps a kube client error.
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),

    #[error("unable to listen for shutdown signals: {0}")]
    Signals(#[source] std::io::Error),

    #[error("{name} failed: {reason}")]
    ActivityFailed { name: &'static str, reason: String },

    #[error("shutdown grace period of {grace_period:?} expired waiting for {}", .remaining.join(", "))]
    GracePeriodExpired {
        grace_period: Duration,
        remaining: Vec<&'static str>,
    },
}
