// System
use std::path::Path;

// Third Party
use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use tracing::debug;

// Local
use crate::error::Error;

/// Builds a cluster API client from `kubeconfig` when given, otherwise from the service account
/// mounted into the pod.
pub async fn resolve_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    let config = match kubeconfig {
        Some(path) => {
            debug!("Loading cluster credentials from {}", path.display());
            let into_error = |source| Error::Kubeconfig {
                path: path.to_path_buf(),
                source,
            };
            let kubeconfig = Kubeconfig::read_from(path).map_err(into_error)?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(into_error)?
        }
        None => {
            debug!("Loading in-cluster credentials");
            Config::incluster()?
        }
    };
    Ok(Client::try_from(config)?)
}
