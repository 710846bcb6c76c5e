//! ConduitRelay Custom Resource Definition
//!
//! The edge-relay variant of the proxy. Identical spec and status shape to
//! ConduitProxy; both kinds run through the same reconciliation engine.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ConduitSpec, ConduitStatus};

/// Specification for a ConduitRelay
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "conduit.dev",
    version = "v1alpha1",
    kind = "ConduitRelay",
    plural = "conduitrelays",
    shortname = "cdr",
    status = "ConduitStatus",
    namespaced,
    printcolumn = r#"{"name":"Instances","type":"integer","jsonPath":".status.currentInstanceCount"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ConduitRelaySpec {
    /// Shared proxy specification
    #[serde(flatten)]
    pub conduit: ConduitSpec,
}

impl super::ConduitResource for ConduitRelay {
    const KIND: &'static str = "ConduitRelay";

    fn conduit_spec(&self) -> &ConduitSpec {
        &self.spec.conduit
    }

    fn conduit_status(&self) -> Option<&ConduitStatus> {
        self.status.as_ref()
    }
}
