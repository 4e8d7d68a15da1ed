//! Installation Custom Resource Definition

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Installation resource specification
///
/// Declares the release the operator should converge the managed application
/// towards. Every object the operator creates is stamped with the resulting
/// image tag, image registry and deployment identifier.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "install.oso.sh",
    version = "v1alpha1",
    kind = "Installation",
    plural = "installations",
    singular = "installation",
    shortname = "inst",
    namespaced,
    status = "InstallationStatus",
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Tag", "type": "string", "jsonPath": ".spec.imageTag"}"#,
    printcolumn = r#"{"name": "Registry", "type": "string", "jsonPath": ".spec.imageRegistry"}"#,
    printcolumn = r#"{"name": "Deployment", "type": "string", "jsonPath": ".status.deploymentId"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InstallationSpec {
    /// Image tag of the release to install
    pub image_tag: String,

    /// Registry the release images are pulled from
    pub image_registry: String,

    /// Product name, part of the deployment identifier
    #[serde(default = "default_product_name")]
    pub product_name: String,

    /// Suspend reconciliation (no backups, no status updates besides phase)
    #[serde(default)]
    pub suspend: bool,
}

fn default_product_name() -> String {
    "managed-app".to_string()
}

/// Installation status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallationStatus {
    /// Current phase (BackingUp, Reconciled, Suspended)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Deployment identifier derived from the spec
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,

    /// Image tag the operator is converging towards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_image_tag: Option<String>,

    /// Image registry the operator is converging towards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_image_registry: Option<String>,

    /// Generation of the Installation last reconciled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Last observed generations of platform-managed objects
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generations: Vec<GenerationStatus>,

    /// Last status update time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,

    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Last observed generation of a single managed object.
///
/// Unique by (group, resource, namespace, name); cluster-scoped objects carry
/// an empty namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    /// API group of the object
    pub group: String,

    /// Plural resource name
    pub resource: String,

    /// Namespace, empty for cluster-scoped objects
    #[serde(default)]
    pub namespace: String,

    /// Object name
    pub name: String,

    /// Generation observed after the last apply
    pub last_generation: i64,
}

/// Status condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type (Ready, Validated, RbacBackedUp)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status (True, False, Unknown)
    pub status: String,

    /// Last transition time
    pub last_transition_time: DateTime<Utc>,

    /// Reason for the condition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
