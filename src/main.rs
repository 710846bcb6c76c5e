//! Conduit Operator - edge proxy fleet management for Kubernetes

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt, ResourceExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use conduit::config::OperatorDefaults;
use conduit::controller::{error_policy, reconcile, Context, FIELD_MANAGER};
use conduit::crd::{ConduitProxy, ConduitRelay, ConduitResource};
use conduit::synth;

/// Conduit - CRD-driven Kubernetes operator for edge proxy fleets
#[derive(Parser, Debug)]
#[command(name = "conduit", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Path to a YAML file with operator-wide pod defaults and backend
    /// endpoints
    #[arg(long, env = "CONDUIT_DEFAULTS_FILE")]
    defaults: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.crd {
        // Generate CRD YAML for both kinds
        for crd in [ConduitProxy::crd(), ConduitRelay::crd()] {
            let yaml = serde_yaml::to_string(&crd)
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("---\n{yaml}");
        }
        return Ok(());
    }

    let defaults = match cli.defaults {
        Some(path) => OperatorDefaults::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Failed to load defaults from {:?}: {}", path, e))?,
        None => OperatorDefaults::default(),
    }
    .with_env_overrides();

    run_controllers(defaults).await
}

/// Ensure both Conduit CRDs are installed
///
/// The operator installs its own CRDs on startup using server-side apply,
/// so the CRD versions always match the operator version.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    tracing::info!("Installing ConduitProxy CRD...");
    crds.patch(
        "conduitproxies.conduit.dev",
        &params,
        &Patch::Apply(&ConduitProxy::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install ConduitProxy CRD: {}", e))?;

    tracing::info!("Installing ConduitRelay CRD...");
    crds.patch(
        "conduitrelays.conduit.dev",
        &params,
        &Patch::Apply(&ConduitRelay::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install ConduitRelay CRD: {}", e))?;

    tracing::info!("All Conduit CRDs installed/updated");
    Ok(())
}

/// Map a labeled child object back to the resource that owns it
///
/// Children carry the ownership labels instead of a kind-specific pointer;
/// any pod or service change re-enqueues the reconcile of its owner.
fn owner_of<K, C>(child: C) -> Option<ObjectRef<K>>
where
    K: ConduitResource,
    C: kube::Resource<DynamicType = ()>,
{
    let labels = child.labels();
    if labels.get(synth::APP_LABEL).map(String::as_str) != Some(synth::APP_LABEL_VALUE) {
        return None;
    }
    let name = labels.get(synth::RESOURCE_NAME_LABEL)?;
    Some(ObjectRef::new(name).within(&child.namespace()?))
}

/// Run one controller for kind `K`, watching its labeled children
async fn controller_for<K: ConduitResource>(client: Client, ctx: Arc<Context>) {
    let resources: Api<K> = Api::all(client.clone());
    let pods: Api<Pod> = Api::all(client.clone());
    let services: Api<Service> = Api::all(client);

    Controller::new(resources, WatcherConfig::default())
        .watches(pods, WatcherConfig::default(), owner_of::<K, Pod>)
        .watches(services, WatcherConfig::default(), owner_of::<K, Service>)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(resource) => {
                    tracing::debug!(?resource, kind = K::KIND, "Reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, kind = K::KIND, "Reconciliation error");
                }
            }
        })
        .await;
}

/// Run both kind controllers until shutdown
async fn run_controllers(defaults: OperatorDefaults) -> anyhow::Result<()> {
    tracing::info!("Conduit controller starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    // Operator installs its own CRDs on startup
    ensure_crds_installed(&client).await?;

    let ctx = Arc::new(Context {
        client: client.clone(),
        defaults,
    });

    tracing::info!("Starting Conduit controllers...");
    tracing::info!("  - ConduitProxy controller");
    tracing::info!("  - ConduitRelay controller");

    let proxy_controller = controller_for::<ConduitProxy>(client.clone(), ctx.clone());
    let relay_controller = controller_for::<ConduitRelay>(client, ctx);

    // Run both controllers concurrently
    tokio::select! {
        _ = proxy_controller => {
            tracing::info!("ConduitProxy controller completed");
        }
        _ = relay_controller => {
            tracing::info!("ConduitRelay controller completed");
        }
    }

    tracing::info!("Conduit controller shutting down");
    Ok(())
}
