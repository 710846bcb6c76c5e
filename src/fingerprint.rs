//! Fingerprint store: last-applied spec tracking on the child workload
//!
//! The full (defaulted) spec is serialized into a single annotation on the
//! Deployment. On later reconciles the engine decodes it and compares it
//! structurally against the incoming spec; equality means the live workload
//! already reflects the desired state and the update is skipped. The
//! fingerprint is a change-detection oracle only, never a source of truth.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::crd::ConduitSpec;
use crate::Error;

/// Annotation key holding the serialized spec on the child workload
pub const GENERATED_FROM_ANNOTATION: &str = "conduit.dev/generated-from";

/// Serialize `spec` into the fingerprint annotation on `meta`
pub fn set(meta: &mut ObjectMeta, spec: &ConduitSpec) -> Result<(), Error> {
    let encoded =
        serde_json::to_string(spec).map_err(|e| Error::serialization(e.to_string()))?;
    meta.annotations
        .get_or_insert_with(Default::default)
        .insert(GENERATED_FROM_ANNOTATION.to_string(), encoded);
    Ok(())
}

/// Decode the spec last applied to the object carrying `meta`
///
/// Fails with [`Error::MissingFingerprint`] when the annotation is absent
/// and [`Error::CorruptFingerprint`] when it does not parse. Callers treat
/// both as "assume the workload is stale".
pub fn extract(meta: &ObjectMeta) -> Result<ConduitSpec, Error> {
    let encoded = meta
        .annotations
        .as_ref()
        .and_then(|a| a.get(GENERATED_FROM_ANNOTATION))
        .ok_or(Error::MissingFingerprint)?;
    serde_json::from_str(encoded).map_err(|e| Error::CorruptFingerprint(e.to_string()))
}
