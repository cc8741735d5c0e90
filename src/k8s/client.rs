use crate::{LabelerError, Result};
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client};
use tracing::{debug, info};

pub struct K8sClient {
    client: Client,
}

impl K8sClient {
    /// Connects using in-cluster credentials, falling back to the local
    /// kubeconfig.
    pub async fn try_default() -> Result<Self> {
        debug!("Initializing Kubernetes client");

        let client = Client::try_default().await.map_err(|e| {
            LabelerError::KubernetesError(format!("Failed to create K8s client: {}", e))
        })?;

        info!("Successfully connected to Kubernetes cluster");

        Ok(Self { client })
    }

    pub fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }
}
