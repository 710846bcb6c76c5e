//! Shared spec and status types for the Conduit custom resources
//!
//! ConduitProxy and ConduitRelay share one spec/status shape; both embed
//! [`ConduitSpec`] and report [`ConduitStatus`]. Pod-level fields reuse the
//! upstream `k8s-openapi` types so users write standard Kubernetes YAML.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Affinity, ContainerPort, ExecAction, ResourceRequirements, SecurityContext, Volume,
    VolumeMount,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired state shared by ConduitProxy and ConduitRelay
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConduitSpec {
    /// Container image for the proxy. Defaults to the release image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Desired instance count. Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Pod-level customization for the proxy instances
    #[serde(default)]
    pub pod_template: PodTemplate,

    /// Shape of the Service exposing the proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceConfig>,

    /// Proxy rules configuration source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigRef>,

    /// Lifecycle hooks for the proxy container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<LifecycleConfig>,

    /// HTTP path probed for readiness (e.g. "/healthz")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub healthcheck_path: String,

    /// Compute resources for the proxy container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

/// Pod template customization
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplate {
    /// Affinity to be set on the proxy pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    /// Extra annotations for the pods
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Extra labels for the pods
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Run the pods in the host's network namespace
    #[serde(default)]
    pub host_network: bool,

    /// Container ports. The well-known `http`/`https` ports are defaulted
    /// when absent; explicit entries are never overridden.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,

    /// Max duration in seconds for pods to terminate gracefully
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_grace_period_seconds: Option<i64>,

    /// Security context for the proxy container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,

    /// Volumes attached to the proxy pods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    /// Mounts for the volumes declared above
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

/// Service shape overrides
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Service type. Defaults to ClusterIP.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub type_: Option<String>,

    /// Optional load balancer IP for the service
    ///
    /// Renamed by hand: the platform convention capitalizes the trailing
    /// "IP", which rename_all would render as "Ip".
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "loadBalancerIP"
    )]
    pub load_balancer_ip: Option<String>,

    /// Extra labels for the service
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Extra annotations for the service
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Whether external traffic is routed to node-local or cluster-wide
    /// endpoints. Defaults to the platform default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_traffic_policy: Option<String>,

    /// Whether the service selects pods via the ownership labels.
    /// Defaults to true; set false to manage endpoints externally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_pod_selector: Option<bool>,
}

/// Lifecycle hooks for the proxy container
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleConfig {
    /// Executed after the container starts, appended to the baseline hook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_start: Option<LifecycleHook>,

    /// Executed before the container stops, used verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_stop: Option<LifecycleHook>,
}

/// A single exec-based lifecycle hook
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleHook {
    /// Command to execute inside the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecAction>,
}

/// Reference to the proxy rules configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRef {
    /// Name of the config object. For `Inline` configs this doubles as the
    /// pod-template annotation key holding the content.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Kind of the config source. Defaults to ConfigMap.
    #[serde(default)]
    pub kind: ConfigKind,

    /// Inline configuration content. Required when kind is Inline.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
}

/// Supported configuration sources
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConfigKind {
    /// Mount a ConfigMap into the container filesystem
    #[default]
    ConfigMap,
    /// Store the content as a pod-template annotation and project it into
    /// the container through the Downward API. The platform has no way to
    /// embed arbitrary content in a workload spec without persisting it
    /// somewhere addressable.
    Inline,
}

/// Observed state shared by ConduitProxy and ConduitRelay
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConduitStatus {
    /// Observed proxy instances, sorted by name
    ///
    /// Serialized even when empty: status is written as a merge patch, and
    /// an omitted key would leave a previously reported list in place.
    #[serde(default)]
    pub instances: Vec<InstanceStatus>,

    /// Observed services owned by this resource, sorted by name
    #[serde(default)]
    pub endpoints: Vec<EndpointStatus>,

    /// Number of instances currently observed
    #[serde(default)]
    pub current_instance_count: i32,

    /// Serialized ownership-label selector for the instances
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ownership_selector: String,
}

/// Snapshot of one observed proxy instance
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    /// Name of the pod running the proxy
    pub name: String,
    /// Cluster-internal address of the pod, or `<pending>` if unassigned
    pub internal_address: String,
    /// Address of the host the pod runs on, or `<pending>` if unassigned
    pub host_address: String,
}

/// Snapshot of one observed endpoint
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStatus {
    /// Name of the Service created for this resource
    pub name: String,
}
