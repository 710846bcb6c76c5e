//! Desired-state synthesis: spec in, child resources out
//!
//! Maps a [`ConduitSpec`] into the canonical Deployment and Service for a
//! resource, applying defaults in place. Synthesis is total: given a
//! well-typed spec it always produces a result. The fingerprint annotation
//! is attached later by the engine, after defaulting has settled.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment,
};
use k8s_openapi::api::core::v1::{
    Capabilities, ConfigMapVolumeSource, Container, ContainerPort, DownwardAPIVolumeFile,
    DownwardAPIVolumeSource, EnvVar, ExecAction, Lifecycle, LifecycleHandler, ObjectFieldSelector,
    PodSpec, PodTemplateSpec, Probe, SecurityContext, Service, ServicePort, ServiceSpec, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::config::OperatorDefaults;
use crate::crd::{ConduitSpec, ConfigKind, ConfigRef, LifecycleConfig, PodTemplate};

/// Ownership label carrying the owning resource's name
pub const RESOURCE_NAME_LABEL: &str = "conduit.dev/resource-name";
/// Fixed application label on every synthesized object
pub const APP_LABEL: &str = "conduit.dev/app";
/// Value of the application label
pub const APP_LABEL_VALUE: &str = "conduit";

/// Default proxy image when the spec does not name one
pub const DEFAULT_IMAGE: &str = "ghcr.io/conduit-proxy/conduit";

const CONTAINER_NAME: &str = "conduit";

const HTTP_PORT_NAME: &str = "http";
const HTTPS_PORT_NAME: &str = "https";
const DEFAULT_HTTP_PORT: i32 = 8080;
const DEFAULT_HTTPS_PORT: i32 = 8443;
// Host-network pods bind the node directly, so the well-known ports apply.
const HOST_NETWORK_HTTP_PORT: i32 = 80;
const HOST_NETWORK_HTTPS_PORT: i32 = 443;

const CONFIG_VOLUME_NAME: &str = "conduit-config";
const CONFIG_MOUNT_PATH: &str = "/etc/conduit";
const CONFIG_FILE_NAME: &str = "proxy-rules.yaml";

const PROBE_COMMAND_TIMEOUT_SECS: i32 = 1;

const BASELINE_POST_START: [&str; 3] = ["/bin/sh", "-c", "/opt/conduit/bin/poststart.sh"];

/// Ownership labels attached to every object synthesized for `name`
pub fn ownership_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (RESOURCE_NAME_LABEL.to_string(), name.to_string()),
        (APP_LABEL.to_string(), APP_LABEL_VALUE.to_string()),
    ])
}

/// Ownership labels rendered as a `k=v,k=v` selector string
///
/// BTreeMap iteration keeps the keys sorted, so the rendering is stable.
pub fn selector_string(name: &str) -> String {
    ownership_labels(name)
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Name of the Service derived for `name`
pub fn service_name(name: &str) -> String {
    format!("{name}-service")
}

/// Synthesize the child Deployment for a resource
///
/// Mutates `spec` in place to fill defaults (image, replicas, well-known
/// ports) so the caller can fingerprint the settled spec afterwards.
pub fn deployment(
    name: &str,
    namespace: &str,
    spec: &mut ConduitSpec,
    owner: Option<OwnerReference>,
    defaults: &OperatorDefaults,
) -> Deployment {
    if spec.image.is_none() {
        spec.image = Some(DEFAULT_IMAGE.to_string());
    }
    let replicas = *spec.replicas.get_or_insert(1);
    default_ports(&mut spec.pod_template);

    // hostNetwork deployments cannot run two instances on one host, so the
    // rollout must always be allowed to take at least one instance down.
    // Rounding up (instead of the platform's round-down default) guarantees
    // a nonzero budget for small replica counts.
    let rolling_update = spec.pod_template.host_network.then(|| {
        let adjusted = (f64::from(replicas) * 0.25).ceil() as i32;
        RollingUpdateDeployment {
            max_surge: Some(IntOrString::Int(adjusted)),
            max_unavailable: Some(IntOrString::Int(adjusted)),
        }
    });

    let mut annotations = assemble_annotations(&spec.pod_template, defaults);
    let mut volumes = spec.pod_template.volumes.clone();
    let mut volume_mounts = spec.pod_template.volume_mounts.clone();
    if let Some(wiring) = config_wiring(spec.config.as_ref()) {
        volume_mounts.push(wiring.mount);
        volumes.push(wiring.volume);
        if let Some((key, value)) = wiring.pod_annotation {
            annotations.insert(key, value);
        }
    }

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: spec.image.clone(),
        env: Some(backend_env(defaults)),
        ports: Some(spec.pod_template.ports.clone()),
        resources: spec.resources.clone(),
        security_context: effective_security_context(&spec.pod_template),
        lifecycle: Some(lifecycle(spec.lifecycle.as_ref())),
        readiness_probe: readiness_probe(spec),
        volume_mounts: (!volume_mounts.is_empty()).then_some(volume_mounts),
        ..Default::default()
    };

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            owner_references: owner.map(|o| vec![o]),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            strategy: Some(DeploymentStrategy {
                type_: Some("RollingUpdate".to_string()),
                rolling_update,
            }),
            selector: LabelSelector {
                match_labels: Some(ownership_labels(name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    namespace: Some(namespace.to_string()),
                    labels: Some(assemble_labels(name, &spec.pod_template, defaults)),
                    annotations: (!annotations.is_empty()).then_some(annotations),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    affinity: spec.pod_template.affinity.clone(),
                    host_network: spec.pod_template.host_network.then_some(true),
                    termination_grace_period_seconds: spec
                        .pod_template
                        .termination_grace_period_seconds,
                    volumes: (!volumes.is_empty()).then_some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Synthesize the child Service for a resource
///
/// Ports are fixed: 80 and 443 targeting the named container ports. The
/// orchestrator-assigned fields (clusterIP, nodePorts, health-check port)
/// are left unset here; the engine copies them from the live object before
/// updating.
pub fn service(
    name: &str,
    namespace: &str,
    spec: &ConduitSpec,
    owner: Option<OwnerReference>,
) -> Service {
    let config = spec.service.as_ref();

    let selector = match config.and_then(|s| s.use_pod_selector) {
        Some(false) => None,
        _ => Some(ownership_labels(name)),
    };

    // Ownership labels win over user-supplied service labels.
    let mut labels = config.map(|s| s.labels.clone()).unwrap_or_default();
    labels.extend(ownership_labels(name));

    let annotations = config
        .map(|s| s.annotations.clone())
        .filter(|a| !a.is_empty());

    Service {
        metadata: ObjectMeta {
            name: Some(service_name(name)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            annotations,
            owner_references: owner.map(|o| vec![o]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![
                ServicePort {
                    name: Some(HTTP_PORT_NAME.to_string()),
                    port: 80,
                    protocol: Some("TCP".to_string()),
                    target_port: Some(IntOrString::String(HTTP_PORT_NAME.to_string())),
                    ..Default::default()
                },
                ServicePort {
                    name: Some(HTTPS_PORT_NAME.to_string()),
                    port: 443,
                    protocol: Some("TCP".to_string()),
                    target_port: Some(IntOrString::String(HTTPS_PORT_NAME.to_string())),
                    ..Default::default()
                },
            ]),
            selector,
            type_: Some(
                config
                    .and_then(|s| s.type_.clone())
                    .unwrap_or_else(|| "ClusterIP".to_string()),
            ),
            load_balancer_ip: config.and_then(|s| s.load_balancer_ip.clone()),
            external_traffic_policy: config.and_then(|s| s.external_traffic_policy.clone()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn port_by_name<'a>(ports: &'a [ContainerPort], name: &str) -> Option<&'a ContainerPort> {
    ports.iter().find(|p| p.name.as_deref() == Some(name))
}

fn default_ports(pod_template: &mut PodTemplate) {
    if port_by_name(&pod_template.ports, HTTP_PORT_NAME).is_none() {
        let port = if pod_template.host_network {
            HOST_NETWORK_HTTP_PORT
        } else {
            DEFAULT_HTTP_PORT
        };
        pod_template.ports.push(ContainerPort {
            name: Some(HTTP_PORT_NAME.to_string()),
            container_port: port,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        });
    }

    if port_by_name(&pod_template.ports, HTTPS_PORT_NAME).is_none() {
        let port = if pod_template.host_network {
            HOST_NETWORK_HTTPS_PORT
        } else {
            DEFAULT_HTTPS_PORT
        };
        pod_template.ports.push(ContainerPort {
            name: Some(HTTPS_PORT_NAME.to_string()),
            container_port: port,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        });
    }
}

fn has_low_port(ports: &[ContainerPort]) -> bool {
    ports.iter().any(|p| p.container_port < 1024)
}

/// Security context with NET_BIND_SERVICE injected when a declared port is
/// below 1024; unprivileged containers cannot bind such ports otherwise.
fn effective_security_context(pod_template: &PodTemplate) -> Option<SecurityContext> {
    let mut context = pod_template.security_context.clone();
    if has_low_port(&pod_template.ports) {
        let context = context.get_or_insert_with(Default::default);
        context
            .capabilities
            .get_or_insert_with(Capabilities::default)
            .add
            .get_or_insert_with(Default::default)
            .push("NET_BIND_SERVICE".to_string());
    }
    context
}

/// Backend environment with explicit fallbacks for unset defaults
fn backend_env(defaults: &OperatorDefaults) -> Vec<EnvVar> {
    let backend = &defaults.backend;
    let env = |name: &str, value: &Option<String>, fallback: &str| EnvVar {
        name: name.to_string(),
        value: Some(value.clone().unwrap_or_else(|| fallback.to_string())),
        ..Default::default()
    };
    vec![
        env("CONDUIT_BACKEND_HOST", &backend.host, "origin-server"),
        env("CONDUIT_BACKEND_PORT", &backend.port, "9000"),
        env("CONDUIT_HTTP_BIND", &backend.http_bind, "8080"),
        env(
            "CONDUIT_AUTH_URI",
            &backend.auth_uri,
            "http://conduit-auth:8080",
        ),
    ]
}

/// Merge label sources in increasing precedence: ownership labels,
/// operator-wide defaults, the spec's own pod-template labels.
fn assemble_labels(
    name: &str,
    pod_template: &PodTemplate,
    defaults: &OperatorDefaults,
) -> BTreeMap<String, String> {
    let mut labels = ownership_labels(name);
    labels.extend(defaults.pod_labels.clone());
    labels.extend(pod_template.labels.clone());
    labels
}

fn assemble_annotations(
    pod_template: &PodTemplate,
    defaults: &OperatorDefaults,
) -> BTreeMap<String, String> {
    let mut annotations = defaults.pod_annotations.clone();
    annotations.extend(pod_template.annotations.clone());
    annotations
}

/// Readiness probe: a single composite exec command of curl checks against
/// the HTTP port, or nothing when no `http`-named port exists.
fn readiness_probe(spec: &ConduitSpec) -> Option<Probe> {
    let http_port = port_by_name(&spec.pod_template.ports, HTTP_PORT_NAME)?;
    let url = format!(
        "http://localhost:{}{}",
        http_port.container_port, spec.healthcheck_path
    );
    let commands = vec![format!(
        "curl -m{PROBE_COMMAND_TIMEOUT_SECS} -kfsS -o /dev/null {url}"
    )];

    Some(Probe {
        timeout_seconds: Some(PROBE_COMMAND_TIMEOUT_SECS * commands.len() as i32),
        exec: Some(ExecAction {
            command: Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                commands.join(" && "),
            ]),
        }),
        ..Default::default()
    })
}

/// Container lifecycle: the baseline post-start hook always runs first; a
/// user post-start command is appended joined with `&&` so the baseline
/// must succeed before the custom hook runs. Pre-stop is used verbatim.
fn lifecycle(config: Option<&LifecycleConfig>) -> Lifecycle {
    let mut post_start_command: Vec<String> =
        BASELINE_POST_START.iter().map(|s| s.to_string()).collect();
    let mut pre_stop = None;

    if let Some(config) = config {
        if let Some(exec) = config.pre_stop.as_ref().and_then(|h| h.exec.as_ref()) {
            pre_stop = Some(LifecycleHandler {
                exec: Some(exec.clone()),
                ..Default::default()
            });
        }

        let custom_command = config
            .post_start
            .as_ref()
            .and_then(|h| h.exec.as_ref())
            .and_then(|e| e.command.as_ref())
            .filter(|c| !c.is_empty());
        if let Some(command) = custom_command {
            let custom = command.join(" ");
            if let Some(baseline) = post_start_command.pop() {
                post_start_command.push(format!("{baseline} && {custom}"));
            }
        }
    }

    Lifecycle {
        post_start: Some(LifecycleHandler {
            exec: Some(ExecAction {
                command: Some(post_start_command),
            }),
            ..Default::default()
        }),
        pre_stop,
        ..Default::default()
    }
}

struct ConfigWiring {
    mount: VolumeMount,
    volume: Volume,
    pod_annotation: Option<(String, String)>,
}

fn config_wiring(config: Option<&ConfigRef>) -> Option<ConfigWiring> {
    let config = config?;

    let mount = VolumeMount {
        name: CONFIG_VOLUME_NAME.to_string(),
        mount_path: format!("{CONFIG_MOUNT_PATH}/{CONFIG_FILE_NAME}"),
        sub_path: Some(CONFIG_FILE_NAME.to_string()),
        ..Default::default()
    };

    match config.kind {
        ConfigKind::ConfigMap => Some(ConfigWiring {
            mount,
            volume: Volume {
                name: CONFIG_VOLUME_NAME.to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: config.name.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            pod_annotation: None,
        }),
        // Inline content has to live somewhere addressable: it is stored as
        // a pod-template annotation and projected into the filesystem via
        // the Downward API.
        ConfigKind::Inline => Some(ConfigWiring {
            mount,
            volume: Volume {
                name: CONFIG_VOLUME_NAME.to_string(),
                downward_api: Some(DownwardAPIVolumeSource {
                    items: Some(vec![DownwardAPIVolumeFile {
                        path: CONFIG_FILE_NAME.to_string(),
                        field_ref: Some(ObjectFieldSelector {
                            field_path: format!("metadata.annotations['{}']", config.name),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            pod_annotation: Some((config.name.clone(), config.value.clone())),
        }),
    }
}
