//! OSO Install Strategy Kubernetes Operator
//!
//! Reconciles `Installation` resources: keeps the RBAC objects of a running
//! release backed up while an in-place upgrade is in progress, and tracks the
//! generations of platform-managed objects to detect drift.

pub mod adapters;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod reconcilers;

pub use error::{Error, Result};
