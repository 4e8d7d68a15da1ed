//! Creation-time metadata stamping for managed objects

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

use crate::adapters::version_annotations::{
    DeployedVersion, DEPLOYMENT_ID_ANNOTATION, GENERATION_ANNOTATION, IMAGE_REGISTRY_ANNOTATION,
    IMAGE_TAG_ANNOTATION, OWNER_ANNOTATION,
};

/// Value of the `app.kubernetes.io/managed-by` label on managed objects
pub const MANAGED_BY: &str = "install-strategy-operator";

/// Label selector matching every object the operator manages
pub const MANAGED_BY_SELECTOR: &str = "app.kubernetes.io/managed-by=install-strategy-operator";

/// Stamp labels and version annotations onto metadata of an object about to be created
pub fn inject_operator_metadata(
    meta: &mut ObjectMeta,
    version: &DeployedVersion,
    generation: i64,
    owner_key: &str,
) {
    let labels = meta.labels.get_or_insert_with(BTreeMap::new);
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        MANAGED_BY.to_string(),
    );
    labels.insert(
        "app.kubernetes.io/version".to_string(),
        version.image_tag.clone(),
    );

    let annotations = meta.annotations.get_or_insert_with(BTreeMap::new);
    annotations.insert(IMAGE_TAG_ANNOTATION.to_string(), version.image_tag.clone());
    annotations.insert(
        IMAGE_REGISTRY_ANNOTATION.to_string(),
        version.image_registry.clone(),
    );
    annotations.insert(
        DEPLOYMENT_ID_ANNOTATION.to_string(),
        version.deployment_id.clone(),
    );
    annotations.insert(GENERATION_ANNOTATION.to_string(), generation.to_string());
    annotations.insert(OWNER_ANNOTATION.to_string(), owner_key.to_string());
}
