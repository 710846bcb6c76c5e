//! Custom Resource Definitions for Conduit
//!
//! Two kinds share one spec/status shape: [`ConduitProxy`] and
//! [`ConduitRelay`]. The [`ConduitResource`] trait is the seam the generic
//! reconciliation engine works through.

use k8s_openapi::NamespaceResourceScope;
use serde::de::DeserializeOwned;
use serde::Serialize;

mod proxy;
mod relay;
mod types;

pub use proxy::{ConduitProxy, ConduitProxySpec};
pub use relay::{ConduitRelay, ConduitRelaySpec};
pub use types::{
    ConduitSpec, ConduitStatus, ConfigKind, ConfigRef, EndpointStatus, InstanceStatus,
    LifecycleConfig, LifecycleHook, PodTemplate, ServiceConfig,
};

/// A namespaced custom resource reconcilable by the Conduit engine
///
/// Both CRDs implement this; the engine itself never names a concrete kind.
pub trait ConduitResource:
    kube::Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + std::fmt::Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    /// Kind name, used for logging
    const KIND: &'static str;

    /// The shared proxy specification
    fn conduit_spec(&self) -> &ConduitSpec;

    /// The shared status, if one has been written
    fn conduit_status(&self) -> Option<&ConduitStatus>;
}
