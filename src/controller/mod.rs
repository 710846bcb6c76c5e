//! Reconciliation controller
//!
//! [`engine`] holds the generic reconcile sequence; [`client`] is the
//! Kubernetes access seam it runs against. The per-kind controllers are
//! wired up in the binary.

pub mod client;
pub mod engine;

pub use client::{KubeApi, KubeApiFor, FIELD_MANAGER};
pub use engine::{error_policy, reconcile, Context};
