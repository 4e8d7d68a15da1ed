//! Custom Resource Definitions for the Install Strategy Operator

mod installation;

pub use installation::*;

use kube::CustomResourceExt;

/// Generate CRD YAML manifests for all custom resources
pub fn generate_crds() -> crate::Result<Vec<String>> {
    let crd = serde_yaml::to_string(&Installation::crd())
        .map_err(|e| crate::Error::ConfigError(format!("Failed to render CRD: {}", e)))?;
    Ok(vec![crd])
}
