//! Generic reconciliation engine
//!
//! One engine serves every Conduit kind. Each invocation runs a fixed
//! sequence: synthesize desired state, converge the workload, converge the
//! endpoint, then aggregate status. The engine holds no state between
//! invocations; the controller runtime guarantees at most one in-flight
//! reconcile per resource.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::config::OperatorDefaults;
use crate::controller::client::{KubeApi, KubeApiFor};
use crate::crd::{ConduitResource, ConduitStatus, EndpointStatus, InstanceStatus};
use crate::{fingerprint, synth, Error};

/// Interval between reconciles of a healthy resource
const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Backoff applied by the error policy before retrying a failed reconcile
const ERROR_REQUEUE: Duration = Duration::from_secs(5);

/// Placeholder reported for addresses the platform has not assigned yet
const PENDING_PLACEHOLDER: &str = "<pending>";

/// Shared context handed to every reconcile invocation
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Operator-wide pod defaults and backend endpoints
    pub defaults: OperatorDefaults,
}

/// Reconcile one resource of kind `K`
#[instrument(skip(resource, ctx), fields(kind = K::KIND, resource = %resource.name_any()))]
pub async fn reconcile<K: ConduitResource>(
    resource: Arc<K>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let namespace = resource
        .namespace()
        .unwrap_or_else(|| "default".to_string());
    let api = KubeApiFor::<K>::new(ctx.client.clone(), &namespace);
    reconcile_with(resource.as_ref(), &namespace, &api, &ctx.defaults).await
}

/// Decide what to do after a failed reconcile
pub fn error_policy<K: ConduitResource>(
    resource: Arc<K>,
    error: &Error,
    _ctx: Arc<Context>,
) -> Action {
    error!(
        ?error,
        kind = K::KIND,
        resource = %resource.name_any(),
        "reconciliation failed"
    );
    Action::requeue(ERROR_REQUEUE)
}

async fn reconcile_with<K: ConduitResource>(
    resource: &K,
    namespace: &str,
    api: &dyn KubeApi,
    defaults: &OperatorDefaults,
) -> Result<Action, Error> {
    let name = resource.name_any();
    info!("reconciling");

    // Synthesis defaults the spec in place; the fingerprint records the
    // settled spec so later comparisons see the same defaults.
    let mut spec = resource.conduit_spec().clone();
    let owner = resource.controller_owner_ref(&());

    let mut workload = synth::deployment(&name, namespace, &mut spec, owner.clone(), defaults);
    fingerprint::set(&mut workload.metadata, &spec)?;
    converge_workload(api, &name, &workload, &spec).await?;

    let endpoint = synth::service(&name, namespace, &spec, owner);
    converge_endpoint(api, &endpoint).await?;

    refresh_status(api, &name, resource.conduit_status()).await?;

    Ok(Action::requeue(RESYNC_INTERVAL))
}

/// Converge the child workload: create, or full-replace when stale
///
/// Create runs first; an AlreadyExists race falls through to the update
/// path. The fingerprint on the live object is the equality oracle: a
/// matching fingerprint means no write at all, and a missing or corrupt one
/// is treated as stale rather than fatal.
async fn converge_workload(
    api: &dyn KubeApi,
    name: &str,
    desired: &Deployment,
    spec: &crate::crd::ConduitSpec,
) -> Result<(), Error> {
    match api.create_deployment(desired).await {
        Ok(()) => {
            info!("workload created");
            return Ok(());
        }
        Err(e) if e.is_already_exists() => {}
        Err(e) => return Err(e),
    }

    let Some(live) = api.get_deployment(name).await? else {
        // Deleted between create and fetch; the child watch re-enqueues.
        debug!("workload vanished after create race");
        return Ok(());
    };

    match fingerprint::extract(&live.metadata) {
        Ok(recorded) if recorded == *spec => {
            debug!("workload up to date");
            return Ok(());
        }
        Ok(_) => info!("workload stale, replacing"),
        Err(Error::MissingFingerprint) => {
            warn!("workload has no fingerprint, replacing");
        }
        Err(Error::CorruptFingerprint(reason)) => {
            warn!(%reason, "workload fingerprint unreadable, replacing");
        }
        Err(e) => return Err(e),
    }

    let mut replacement = desired.clone();
    replacement.metadata.resource_version = live.metadata.resource_version.clone();
    api.update_deployment(&replacement).await
}

/// Converge the child endpoint: create, or update with field preservation
///
/// When a live Service exists, the platform-assigned fields are copied into
/// the fresh object before the write. Omitting them would make the platform
/// treat them as newly requested and reallocate, breaking external routing.
/// The write itself is unconditional; there is no fingerprint short-circuit
/// for endpoints.
async fn converge_endpoint(api: &dyn KubeApi, desired: &Service) -> Result<(), Error> {
    let name = desired.metadata.name.as_deref().unwrap_or_default();

    let live = match api.get_service(name).await? {
        Some(live) => live,
        None => match api.create_service(desired).await {
            Ok(()) => {
                info!("endpoint created");
                return Ok(());
            }
            // Lost a create race; converge against whatever the winner
            // wrote so its object does not wait for the next resync.
            Err(e) if e.is_already_exists() => match api.get_service(name).await? {
                Some(live) => live,
                None => {
                    debug!("endpoint vanished after create race");
                    return Ok(());
                }
            },
            Err(e) => return Err(e),
        },
    };

    let mut replacement = desired.clone();
    replacement.metadata.resource_version = live.metadata.resource_version.clone();
    if let (Some(spec), Some(live_spec)) = (replacement.spec.as_mut(), live.spec.as_ref()) {
        spec.cluster_ip = live_spec.cluster_ip.clone();
        spec.health_check_node_port = live_spec.health_check_node_port;
        if let (Some(ports), Some(live_ports)) = (spec.ports.as_mut(), live_spec.ports.as_ref()) {
            for port in ports.iter_mut() {
                if let Some(live_port) = live_ports.iter().find(|p| p.port == port.port) {
                    port.node_port = live_port.node_port;
                }
            }
        }
    }
    api.update_service(&replacement).await
}

/// Aggregate observed children into status, writing only on change
///
/// Both observed lists are sorted by name before comparison; the stored
/// status is re-sorted too so ordering alone never counts as a change. A
/// status write generates a new change notification, so writing an equal
/// status would reconcile forever.
async fn refresh_status(
    api: &dyn KubeApi,
    name: &str,
    current: Option<&ConduitStatus>,
) -> Result<(), Error> {
    let selector = synth::selector_string(name);

    let mut instances: Vec<InstanceStatus> = api
        .list_pods(&selector)
        .await?
        .into_iter()
        .map(|pod| {
            let addresses = pod.status.as_ref();
            InstanceStatus {
                name: pod.metadata.name.clone().unwrap_or_default(),
                internal_address: address_or_pending(addresses.and_then(|s| s.pod_ip.clone())),
                host_address: address_or_pending(addresses.and_then(|s| s.host_ip.clone())),
            }
        })
        .collect();
    instances.sort();

    let mut endpoints: Vec<EndpointStatus> = api
        .list_services(&selector)
        .await?
        .into_iter()
        .map(|service| EndpointStatus {
            name: service.metadata.name.unwrap_or_default(),
        })
        .collect();
    endpoints.sort();

    let observed = ConduitStatus {
        current_instance_count: instances.len() as i32,
        instances,
        endpoints,
        ownership_selector: selector,
    };

    let mut stored = current.cloned().unwrap_or_default();
    stored.instances.sort();
    stored.endpoints.sort();

    if stored == observed {
        debug!("status unchanged");
        return Ok(());
    }

    info!(
        instances = observed.current_instance_count,
        "updating status"
    );
    api.patch_status(name, &observed).await
}

fn address_or_pending(address: Option<String>) -> String {
    address
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| PENDING_PLACEHOLDER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::client::MockKubeApi;
    use crate::crd::{ConduitProxy, ConduitProxySpec, ConduitSpec};
    use k8s_openapi::api::core::v1::{Pod, PodStatus};
    use kube::core::ErrorResponse;

    const NAMESPACE: &str = "proxies";

    fn proxy(name: &str) -> ConduitProxy {
        let mut resource = ConduitProxy::new(
            name,
            ConduitProxySpec {
                conduit: ConduitSpec::default(),
            },
        );
        resource.metadata.namespace = Some(NAMESPACE.to_string());
        resource
    }

    fn already_exists() -> Error {
        Error::Kube(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "deployments \"edge\" already exists".to_string(),
            reason: "AlreadyExists".to_string(),
            code: 409,
        }))
    }

    fn transport_error() -> Error {
        Error::Kube(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "etcdserver: request timed out".to_string(),
            reason: "InternalError".to_string(),
            code: 500,
        }))
    }

    /// Live workload carrying the fingerprint of `spec` after defaulting
    fn converged_workload(name: &str, spec: &ConduitSpec) -> Deployment {
        let mut spec = spec.clone();
        let mut deploy = synth::deployment(
            name,
            NAMESPACE,
            &mut spec,
            None,
            &OperatorDefaults::default(),
        );
        fingerprint::set(&mut deploy.metadata, &spec).unwrap();
        deploy.metadata.resource_version = Some("7".to_string());
        deploy
    }

    fn live_service(name: &str, spec: &ConduitSpec) -> Service {
        let mut service = synth::service(name, NAMESPACE, spec, None);
        service.metadata.resource_version = Some("41".to_string());
        service
    }

    /// Status equal to what aggregation observes over empty child lists
    fn empty_status(name: &str) -> ConduitStatus {
        ConduitStatus {
            instances: vec![],
            endpoints: vec![],
            current_instance_count: 0,
            ownership_selector: synth::selector_string(name),
        }
    }

    fn pod(name: &str, pod_ip: Option<&str>, host_ip: Option<&str>) -> Pod {
        Pod {
            metadata: kube::api::ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                pod_ip: pod_ip.map(String::from),
                host_ip: host_ip.map(String::from),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn run(resource: &ConduitProxy, api: &MockKubeApi) -> Result<Action, Error> {
        reconcile_with(resource, NAMESPACE, api, &OperatorDefaults::default()).await
    }

    // =========================================================================
    // First Reconcile Stories
    // =========================================================================

    /// Story: a fresh resource gets its children created and status written
    #[tokio::test]
    async fn story_fresh_resource_creates_children() {
        let resource = proxy("edge");
        let mut api = MockKubeApi::new();

        api.expect_create_deployment()
            .once()
            .withf(|deploy: &Deployment| {
                let annotations = deploy.metadata.annotations.as_ref().unwrap();
                annotations.contains_key(fingerprint::GENERATED_FROM_ANNOTATION)
            })
            .returning(|_| Ok(()));
        api.expect_get_service().returning(|_| Ok(None));
        api.expect_create_service()
            .once()
            .withf(|svc: &Service| svc.metadata.name.as_deref() == Some("edge-service"))
            .returning(|_| Ok(()));
        api.expect_list_pods().returning(|_| Ok(vec![]));
        api.expect_list_services().returning(|_| Ok(vec![]));
        // No status exists yet, so the first aggregation always writes
        api.expect_patch_status()
            .once()
            .withf(|name, status| {
                name == "edge"
                    && status.current_instance_count == 0
                    && status.ownership_selector
                        == "conduit.dev/app=conduit,conduit.dev/resource-name=edge"
            })
            .returning(|_, _| Ok(()));

        let action = run(&resource, &api).await.expect("reconcile should succeed");
        assert_eq!(action, Action::requeue(RESYNC_INTERVAL));
    }

    // =========================================================================
    // Idempotence Stories
    // =========================================================================

    /// Story: a converged resource produces zero workload and status writes
    ///
    /// The mock has no update_deployment or patch_status expectations, so
    /// any such call fails the test. The endpoint rewrite is the one
    /// permitted write on a no-op pass.
    #[tokio::test]
    async fn story_converged_resource_performs_no_spurious_writes() {
        let mut resource = proxy("edge");
        resource.status = Some(empty_status("edge"));
        let spec = resource.spec.conduit.clone();

        let mut api = MockKubeApi::new();
        api.expect_create_deployment()
            .returning(|_| Err(already_exists()));
        {
            let spec = spec.clone();
            api.expect_get_deployment()
                .returning(move |_| Ok(Some(converged_workload("edge", &spec))));
        }
        api.expect_get_service()
            .returning(move |_| Ok(Some(live_service("edge", &spec))));
        api.expect_update_service().once().returning(|_| Ok(()));
        api.expect_list_pods().returning(|_| Ok(vec![]));
        api.expect_list_services().returning(|_| Ok(vec![]));

        run(&resource, &api).await.expect("reconcile should succeed");
    }

    /// Story: a create race is swallowed and falls through to comparison
    #[tokio::test]
    async fn story_create_race_falls_through() {
        let resource = proxy("edge");
        let spec = resource.spec.conduit.clone();

        let mut api = MockKubeApi::new();
        api.expect_create_deployment()
            .once()
            .returning(|_| Err(already_exists()));
        api.expect_get_deployment()
            .returning(move |_| Ok(Some(converged_workload("edge", &spec))));
        api.expect_get_service().returning(|_| Ok(None));
        api.expect_create_service().returning(|_| Ok(()));
        api.expect_list_pods().returning(|_| Ok(vec![]));
        api.expect_list_services().returning(|_| Ok(vec![]));
        api.expect_patch_status().returning(|_, _| Ok(()));

        run(&resource, &api).await.expect("reconcile should succeed");
    }

    // =========================================================================
    // Staleness Stories
    // =========================================================================

    /// Story: a changed spec replaces the live workload wholesale
    #[tokio::test]
    async fn story_stale_workload_is_replaced() {
        let mut resource = proxy("edge");
        resource.spec.conduit.replicas = Some(3);

        // Live object fingerprinted from an older spec (1 replica)
        let old_spec = ConduitSpec::default();

        let mut api = MockKubeApi::new();
        api.expect_create_deployment()
            .returning(|_| Err(already_exists()));
        api.expect_get_deployment()
            .returning(move |_| Ok(Some(converged_workload("edge", &old_spec))));
        api.expect_update_deployment()
            .once()
            .withf(|deploy: &Deployment| {
                // Resource version is carried over from the live object
                deploy.metadata.resource_version.as_deref() == Some("7")
                    && deploy.spec.as_ref().unwrap().replicas == Some(3)
            })
            .returning(|_| Ok(()));
        api.expect_get_service().returning(|_| Ok(None));
        api.expect_create_service().returning(|_| Ok(()));
        api.expect_list_pods().returning(|_| Ok(vec![]));
        api.expect_list_services().returning(|_| Ok(vec![]));
        api.expect_patch_status().returning(|_, _| Ok(()));

        run(&resource, &api).await.expect("reconcile should succeed");
    }

    /// Story: a workload without a fingerprint is assumed stale
    #[tokio::test]
    async fn story_missing_fingerprint_forces_replace() {
        let resource = proxy("edge");

        let mut api = MockKubeApi::new();
        api.expect_create_deployment()
            .returning(|_| Err(already_exists()));
        api.expect_get_deployment().returning(|_| {
            let mut live = converged_workload("edge", &ConduitSpec::default());
            live.metadata.annotations = None;
            Ok(Some(live))
        });
        api.expect_update_deployment().once().returning(|_| Ok(()));
        api.expect_get_service().returning(|_| Ok(None));
        api.expect_create_service().returning(|_| Ok(()));
        api.expect_list_pods().returning(|_| Ok(vec![]));
        api.expect_list_services().returning(|_| Ok(vec![]));
        api.expect_patch_status().returning(|_, _| Ok(()));

        run(&resource, &api).await.expect("reconcile should succeed");
    }

    /// Story: an unreadable fingerprint forces a replace, not an abort
    #[tokio::test]
    async fn story_corrupt_fingerprint_forces_replace() {
        let resource = proxy("edge");

        let mut api = MockKubeApi::new();
        api.expect_create_deployment()
            .returning(|_| Err(already_exists()));
        api.expect_get_deployment().returning(|_| {
            let mut live = converged_workload("edge", &ConduitSpec::default());
            live.metadata
                .annotations
                .as_mut()
                .unwrap()
                .insert(fingerprint::GENERATED_FROM_ANNOTATION.to_string(), "{not json".to_string());
            Ok(Some(live))
        });
        api.expect_update_deployment().once().returning(|_| Ok(()));
        api.expect_get_service().returning(|_| Ok(None));
        api.expect_create_service().returning(|_| Ok(()));
        api.expect_list_pods().returning(|_| Ok(vec![]));
        api.expect_list_services().returning(|_| Ok(vec![]));
        api.expect_patch_status().returning(|_, _| Ok(()));

        run(&resource, &api).await.expect("reconcile should succeed");
    }

    // =========================================================================
    // Endpoint Preservation Stories
    // =========================================================================

    /// Story: platform-assigned endpoint fields survive reconvergence
    ///
    /// The live service carries a cluster IP, a health-check node port, and
    /// an allocated node port on 443. All three must appear unchanged in
    /// the written object even though the fresh synthesis knows none of
    /// them.
    #[tokio::test]
    async fn story_endpoint_preserves_assigned_fields() {
        let mut resource = proxy("edge");
        // Unrelated change relative to whatever was live before
        resource.spec.conduit.replicas = Some(2);
        let spec = resource.spec.conduit.clone();

        let mut api = MockKubeApi::new();
        api.expect_create_deployment().returning(|_| Ok(()));
        api.expect_get_service().returning(move |_| {
            let mut live = live_service("edge", &spec);
            let live_spec = live.spec.as_mut().unwrap();
            live_spec.cluster_ip = Some("10.0.0.5".to_string());
            live_spec.health_check_node_port = Some(31000);
            let ports = live_spec.ports.as_mut().unwrap();
            for port in ports.iter_mut() {
                if port.port == 443 {
                    port.node_port = Some(32000);
                }
            }
            Ok(Some(live))
        });
        api.expect_update_service()
            .once()
            .withf(|svc: &Service| {
                let spec = svc.spec.as_ref().unwrap();
                let ports = spec.ports.as_ref().unwrap();
                let https = ports.iter().find(|p| p.port == 443).unwrap();
                let http = ports.iter().find(|p| p.port == 80).unwrap();
                svc.metadata.resource_version.as_deref() == Some("41")
                    && spec.cluster_ip.as_deref() == Some("10.0.0.5")
                    && spec.health_check_node_port == Some(31000)
                    && https.node_port == Some(32000)
                    && http.node_port.is_none()
            })
            .returning(|_| Ok(()));
        api.expect_list_pods().returning(|_| Ok(vec![]));
        api.expect_list_services().returning(|_| Ok(vec![]));
        api.expect_patch_status().returning(|_, _| Ok(()));

        run(&resource, &api).await.expect("reconcile should succeed");
    }

    /// Story: losing the endpoint create race still converges the winner
    ///
    /// The first fetch sees nothing, the create collides, and the loser
    /// must re-fetch and run the update path instead of leaving the
    /// winner's object alone until the next resync.
    #[tokio::test]
    async fn story_endpoint_create_race_proceeds_to_update() {
        let resource = proxy("edge");
        let spec = resource.spec.conduit.clone();

        let mut api = MockKubeApi::new();
        api.expect_create_deployment().returning(|_| Ok(()));
        let mut fetches = 0;
        api.expect_get_service().returning(move |_| {
            fetches += 1;
            if fetches == 1 {
                Ok(None)
            } else {
                Ok(Some(live_service("edge", &spec)))
            }
        });
        api.expect_create_service()
            .once()
            .returning(|_| Err(already_exists()));
        api.expect_update_service()
            .once()
            .withf(|svc: &Service| svc.metadata.resource_version.as_deref() == Some("41"))
            .returning(|_| Ok(()));
        api.expect_list_pods().returning(|_| Ok(vec![]));
        api.expect_list_services().returning(|_| Ok(vec![]));
        api.expect_patch_status().returning(|_, _| Ok(()));

        run(&resource, &api).await.expect("reconcile should succeed");
    }

    // =========================================================================
    // Status Aggregation Stories
    // =========================================================================

    /// Story: an unchanged observation writes no status
    ///
    /// Stored status arrives unsorted; sorting happens before comparison so
    /// ordering alone is never a change. The mock has no patch_status
    /// expectation, so any write fails the test.
    #[tokio::test]
    async fn story_unchanged_status_writes_nothing() {
        let mut resource = proxy("edge");
        let mut stored = empty_status("edge");
        stored.instances = vec![
            InstanceStatus {
                name: "edge-b".to_string(),
                internal_address: "10.1.0.2".to_string(),
                host_address: "192.168.1.2".to_string(),
            },
            InstanceStatus {
                name: "edge-a".to_string(),
                internal_address: "10.1.0.1".to_string(),
                host_address: "192.168.1.1".to_string(),
            },
        ];
        stored.current_instance_count = 2;
        resource.status = Some(stored);
        let spec = resource.spec.conduit.clone();

        let mut api = MockKubeApi::new();
        api.expect_create_deployment()
            .returning(|_| Err(already_exists()));
        api.expect_get_deployment()
            .returning(move |_| Ok(Some(converged_workload("edge", &spec))));
        api.expect_get_service().returning(|_| Ok(None));
        api.expect_create_service().returning(|_| Ok(()));
        api.expect_list_pods().returning(|_| {
            Ok(vec![
                pod("edge-a", Some("10.1.0.1"), Some("192.168.1.1")),
                pod("edge-b", Some("10.1.0.2"), Some("192.168.1.2")),
            ])
        });
        api.expect_list_services().returning(|_| Ok(vec![]));

        run(&resource, &api).await.expect("reconcile should succeed");
    }

    /// Story: scaling to zero clears previously reported instances
    ///
    /// Status goes out as a merge patch, so the written object must carry
    /// the emptied lists as explicit arrays; an omitted key would leave
    /// the stale instances in place forever.
    #[tokio::test]
    async fn story_scale_to_zero_clears_status() {
        let mut resource = proxy("edge");
        let mut stored = empty_status("edge");
        stored.instances = vec![InstanceStatus {
            name: "edge-a".to_string(),
            internal_address: "10.1.0.1".to_string(),
            host_address: "192.168.1.1".to_string(),
        }];
        stored.current_instance_count = 1;
        resource.status = Some(stored);

        let mut api = MockKubeApi::new();
        api.expect_create_deployment().returning(|_| Ok(()));
        api.expect_get_service().returning(|_| Ok(None));
        api.expect_create_service().returning(|_| Ok(()));
        api.expect_list_pods().returning(|_| Ok(vec![]));
        api.expect_list_services().returning(|_| Ok(vec![]));
        api.expect_patch_status()
            .once()
            .withf(|_, status| {
                let patch = serde_json::to_value(status).unwrap();
                status.current_instance_count == 0
                    && patch["instances"] == serde_json::json!([])
                    && patch["endpoints"] == serde_json::json!([])
            })
            .returning(|_, _| Ok(()));

        run(&resource, &api).await.expect("reconcile should succeed");
    }

    /// Story: unassigned addresses are reported as a pending placeholder
    #[tokio::test]
    async fn story_pending_addresses_use_placeholder() {
        let resource = proxy("edge");

        let mut api = MockKubeApi::new();
        api.expect_create_deployment().returning(|_| Ok(()));
        api.expect_get_service().returning(|_| Ok(None));
        api.expect_create_service().returning(|_| Ok(()));
        // Names arrive out of order and one pod has no addresses yet
        api.expect_list_pods().returning(|_| {
            Ok(vec![
                pod("edge-b", None, None),
                pod("edge-a", Some("10.1.0.1"), Some("192.168.1.1")),
            ])
        });
        api.expect_list_services().returning(|_| {
            Ok(vec![Service {
                metadata: kube::api::ObjectMeta {
                    name: Some("edge-service".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            }])
        });
        api.expect_patch_status()
            .once()
            .withf(|_, status| {
                status.current_instance_count == 2
                    && status.instances[0].name == "edge-a"
                    && status.instances[1].name == "edge-b"
                    && status.instances[1].internal_address == "<pending>"
                    && status.instances[1].host_address == "<pending>"
                    && status.endpoints[0].name == "edge-service"
            })
            .returning(|_, _| Ok(()));

        run(&resource, &api).await.expect("reconcile should succeed");
    }

    // =========================================================================
    // Error Propagation Stories
    // =========================================================================

    /// Story: a transport failure during create aborts the reconcile
    #[tokio::test]
    async fn story_transport_error_propagates() {
        let resource = proxy("edge");

        let mut api = MockKubeApi::new();
        api.expect_create_deployment()
            .returning(|_| Err(transport_error()));

        let result = run(&resource, &api).await;
        assert!(matches!(result, Err(Error::Kube(_))));
    }
}
