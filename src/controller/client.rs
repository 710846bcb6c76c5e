//! Kubernetes API access for the reconciliation engine
//!
//! The engine talks to the cluster through the [`KubeApi`] trait so tests
//! can substitute a mock. [`KubeApiFor`] is the real implementation, bound
//! to one namespace and one custom-resource kind per reconcile invocation.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::Client;

#[cfg(test)]
use mockall::automock;

use crate::crd::{ConduitResource, ConduitStatus};
use crate::Error;

/// Field manager recorded on writes made by this operator
pub const FIELD_MANAGER: &str = "conduit-operator";

/// Trait abstracting Kubernetes operations for one reconcile invocation
///
/// All operations are scoped to the namespace of the resource being
/// reconciled. The trait is kind-erased: the engine never names a concrete
/// custom-resource type, so one implementation per kind is enough.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeApi: Send + Sync {
    /// Fetch a Deployment by name, `None` when absent
    async fn get_deployment(&self, name: &str) -> Result<Option<Deployment>, Error>;

    /// Create a Deployment
    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), Error>;

    /// Replace a Deployment wholesale
    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), Error>;

    /// Fetch a Service by name, `None` when absent
    async fn get_service(&self, name: &str) -> Result<Option<Service>, Error>;

    /// Create a Service
    async fn create_service(&self, service: &Service) -> Result<(), Error>;

    /// Replace a Service wholesale
    async fn update_service(&self, service: &Service) -> Result<(), Error>;

    /// List pods matching a label selector
    async fn list_pods(&self, selector: &str) -> Result<Vec<Pod>, Error>;

    /// List services matching a label selector
    async fn list_services(&self, selector: &str) -> Result<Vec<Service>, Error>;

    /// Patch the status subresource of the owning custom resource
    async fn patch_status(&self, name: &str, status: &ConduitStatus) -> Result<(), Error>;
}

/// Real implementation over a [`kube::Client`], parameterized by kind
pub struct KubeApiFor<K: ConduitResource> {
    deployments: Api<Deployment>,
    services: Api<Service>,
    pods: Api<Pod>,
    resources: Api<K>,
}

impl<K: ConduitResource> KubeApiFor<K> {
    /// Bind the client to the given namespace
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            deployments: Api::namespaced(client.clone(), namespace),
            services: Api::namespaced(client.clone(), namespace),
            pods: Api::namespaced(client.clone(), namespace),
            resources: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl<K: ConduitResource> KubeApi for KubeApiFor<K> {
    async fn get_deployment(&self, name: &str) -> Result<Option<Deployment>, Error> {
        Ok(self.deployments.get_opt(name).await?)
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        self.deployments
            .create(&PostParams::default(), deployment)
            .await?;
        Ok(())
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), Error> {
        let name = deployment.metadata.name.as_deref().unwrap_or_default();
        self.deployments
            .replace(name, &PostParams::default(), deployment)
            .await?;
        Ok(())
    }

    async fn get_service(&self, name: &str) -> Result<Option<Service>, Error> {
        Ok(self.services.get_opt(name).await?)
    }

    async fn create_service(&self, service: &Service) -> Result<(), Error> {
        self.services.create(&PostParams::default(), service).await?;
        Ok(())
    }

    async fn update_service(&self, service: &Service) -> Result<(), Error> {
        let name = service.metadata.name.as_deref().unwrap_or_default();
        self.services
            .replace(name, &PostParams::default(), service)
            .await?;
        Ok(())
    }

    async fn list_pods(&self, selector: &str) -> Result<Vec<Pod>, Error> {
        let params = ListParams::default().labels(selector);
        Ok(self.pods.list(&params).await?.items)
    }

    async fn list_services(&self, selector: &str) -> Result<Vec<Service>, Error> {
        let params = ListParams::default().labels(selector);
        Ok(self.services.list(&params).await?.items)
    }

    async fn patch_status(&self, name: &str, status: &ConduitStatus) -> Result<(), Error> {
        let status_patch = serde_json::json!({ "status": status });
        self.resources
            .patch_status(
                name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&status_patch),
            )
            .await?;
        Ok(())
    }
}
