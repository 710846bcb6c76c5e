//! Conduit - CRD-driven Kubernetes operator for edge proxy fleets
//!
//! Conduit reconciles declared proxy resources into running workloads. For
//! each ConduitProxy or ConduitRelay it synthesizes a Deployment and a
//! Service, converges them against the cluster, and reports observed
//! instances back through the status subresource.
//!
//! # Architecture
//!
//! One generic reconciliation engine serves both resource kinds:
//! - Synthesis is a pure function from spec to desired children
//! - A fingerprint annotation on the workload detects no-op reconciles
//! - Convergence is create-or-full-replace, preserving platform-assigned
//!   Service fields
//! - Status is aggregated from children found via ownership labels and
//!   written only on change
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (ConduitProxy, ConduitRelay)
//! - [`synth`] - Desired-state synthesis from spec to child resources
//! - [`fingerprint`] - Last-applied-spec annotation on the child workload
//! - [`controller`] - Generic reconciliation engine and Kubernetes access
//! - [`config`] - Operator-wide defaults injected into synthesis
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod fingerprint;
pub mod synth;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
