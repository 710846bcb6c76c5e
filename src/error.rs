//! Error types for the Conduit operator

use thiserror::Error;

/// Main error type for Conduit operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The workload carries no fingerprint annotation
    #[error("missing fingerprint annotation on workload")]
    MissingFingerprint,

    /// The fingerprint annotation is present but not parseable
    #[error("corrupt fingerprint annotation: {0}")]
    CorruptFingerprint(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Returns true if this wraps a 404 from the API server
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(ae)) if ae.code == 404)
    }

    /// Returns true if this wraps a 409 AlreadyExists from the API server
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(ae)) if ae.code == 409 && ae.reason == "AlreadyExists")
    }
}
