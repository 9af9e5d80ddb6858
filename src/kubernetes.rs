use async_trait::async_trait;
use futures::io::AsyncBufRead;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, LogParams};
use kube::config::{Config, KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, ResourceExt};
use std::path::Path;
use std::pin::Pin;
use tracing::{debug, info};

use crate::error::{BoxError, TailError};
use crate::selector::Selector;
use crate::types::PodDescriptor;

/// A following log stream. Dropping it closes the underlying connection.
pub type LogStream = Pin<Box<dyn AsyncBufRead + Send>>;

/// The slice of the cluster API the tailer needs.
#[async_trait]
pub trait PodApi: Send + Sync {
    /// List pods in `namespace` (all namespaces when `None`) matching `selector`.
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> Result<Vec<PodDescriptor>, BoxError>;

    /// Open a following log stream for one container.
    async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<LogStream, BoxError>;
}

pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    /// Build a client from an explicit kubeconfig, a named context, or the
    /// usual inference chain (`$KUBECONFIG`, `~/.kube/config`, in-cluster).
    pub async fn connect(
        kubeconfig: Option<&Path>,
        context: Option<&str>,
    ) -> Result<Self, TailError> {
        let options = KubeConfigOptions {
            context: context.map(str::to_string),
            ..Default::default()
        };

        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .map_err(|e| TailError::ClientConstruction(e.into()))?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| TailError::ClientConstruction(e.into()))?
            }
            None if context.is_some() => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| TailError::ClientConstruction(e.into()))?,
            None => Config::infer()
                .await
                .map_err(|e| TailError::ClientConstruction(e.into()))?,
        };

        info!("Connecting to {}", config.cluster_url);
        let client =
            Client::try_from(config).map_err(|e| TailError::ClientConstruction(e.into()))?;
        Ok(Self { client })
    }

    fn pods(&self, namespace: Option<&str>) -> Api<Pod> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

fn describe(pod: Pod) -> PodDescriptor {
    let namespace = pod.namespace().unwrap_or_default();
    let name = pod.name_any();
    let containers = pod
        .spec
        .map(|spec| spec.containers.into_iter().map(|c| c.name).collect())
        .unwrap_or_default();
    PodDescriptor {
        namespace,
        name,
        containers,
    }
}

#[async_trait]
impl PodApi for KubeClient {
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> Result<Vec<PodDescriptor>, BoxError> {
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector.to_string());
        }
        let pods = self.pods(namespace).list(&params).await?;
        debug!("Listed {} pods", pods.items.len());
        Ok(pods.items.into_iter().map(describe).collect())
    }

    async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<LogStream, BoxError> {
        let params = LogParams {
            follow: true,
            container: Some(container.to_string()),
            ..Default::default()
        };
        let stream = self
            .pods(Some(namespace))
            .log_stream(pod, &params)
            .await?;
        Ok(Box::pin(stream))
    }
}
