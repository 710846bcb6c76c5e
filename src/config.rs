//! Operator-wide defaults injected into the synthesizer
//!
//! These values are resolved once at startup (defaults file plus process
//! environment) and passed explicitly into synthesis. The synthesizer never
//! reads ambient process state itself.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Process-wide defaults applied to every synthesized workload
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorDefaults {
    /// Labels merged into every pod template, below the spec's own labels
    /// in precedence and above the ownership labels
    pub pod_labels: BTreeMap<String, String>,

    /// Annotations merged into every pod template, below the spec's own
    /// annotations in precedence
    pub pod_annotations: BTreeMap<String, String>,

    /// Backend endpoints injected into the proxy environment
    pub backend: BackendDefaults,
}

/// Backend service endpoints for the proxy environment
///
/// Unset fields fall back to the well-known in-cluster defaults.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendDefaults {
    /// Origin server host (CONDUIT_BACKEND_HOST)
    pub host: Option<String>,
    /// Origin server port (CONDUIT_BACKEND_PORT)
    pub port: Option<String>,
    /// Address the proxy binds for plain HTTP (CONDUIT_HTTP_BIND)
    pub http_bind: Option<String>,
    /// Authentication service URI (CONDUIT_AUTH_URI)
    pub auth_uri: Option<String>,
}

impl OperatorDefaults {
    /// Load defaults from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::serialization(format!("failed to read {}: {e}", path.display())))?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::serialization(format!("invalid defaults file: {e}")))
    }

    /// Fill unset backend fields from CONDUIT_* process environment variables
    pub fn with_env_overrides(mut self) -> Self {
        let fill = |slot: &mut Option<String>, var: &str| {
            if slot.is_none() {
                *slot = std::env::var(var).ok().filter(|v| !v.is_empty());
            }
        };
        fill(&mut self.backend.host, "CONDUIT_BACKEND_HOST");
        fill(&mut self.backend.port, "CONDUIT_BACKEND_PORT");
        fill(&mut self.backend.http_bind, "CONDUIT_HTTP_BIND");
        fill(&mut self.backend.auth_uri, "CONDUIT_AUTH_URI");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: operators ship a defaults file alongside the controller
    #[test]
    fn story_defaults_parse_from_yaml() {
        let yaml = r#"
podLabels:
  topology.conduit.dev/tier: edge
podAnnotations:
  prometheus.io/scrape: "true"
backend:
  host: origin.prod.internal
  port: "9000"
"#;
        let defaults: OperatorDefaults = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            defaults.pod_labels.get("topology.conduit.dev/tier"),
            Some(&"edge".to_string())
        );
        assert_eq!(defaults.backend.host.as_deref(), Some("origin.prod.internal"));
        assert_eq!(defaults.backend.auth_uri, None);
    }

    /// Story: an empty file means no overrides, not an error
    #[test]
    fn story_empty_defaults_are_valid() {
        let defaults: OperatorDefaults = serde_yaml::from_str("{}").unwrap();
        assert!(defaults.pod_labels.is_empty());
        assert_eq!(defaults, OperatorDefaults::default());
    }
}
