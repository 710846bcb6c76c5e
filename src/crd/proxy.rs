//! ConduitProxy Custom Resource Definition
//!
//! A ConduitProxy owns one Deployment running the proxy image and one
//! Service exposing it. Children are discovered back through the ownership
//! labels, never through object references.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ConduitSpec, ConduitStatus};

/// Specification for a ConduitProxy
///
/// The shape is shared with ConduitRelay through the embedded [`ConduitSpec`].
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "conduit.dev",
    version = "v1alpha1",
    kind = "ConduitProxy",
    plural = "conduitproxies",
    shortname = "cdp",
    status = "ConduitStatus",
    namespaced,
    printcolumn = r#"{"name":"Instances","type":"integer","jsonPath":".status.currentInstanceCount"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ConduitProxySpec {
    /// Shared proxy specification
    #[serde(flatten)]
    pub conduit: ConduitSpec,
}

impl super::ConduitResource for ConduitProxy {
    const KIND: &'static str = "ConduitProxy";

    fn conduit_spec(&self) -> &ConduitSpec {
        &self.spec.conduit
    }

    fn conduit_status(&self) -> Option<&ConduitStatus> {
        self.status.as_ref()
    }
}
