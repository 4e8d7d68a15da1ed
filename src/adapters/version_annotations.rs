//! Deployed version annotations on managed objects
//!
//! Every object the operator creates carries the release that produced it as
//! three annotations. Objects missing any of them are unversioned.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Image tag of the release that produced the object
pub const IMAGE_TAG_ANNOTATION: &str = "install.oso.sh/image-tag";
/// Image registry of the release that produced the object
pub const IMAGE_REGISTRY_ANNOTATION: &str = "install.oso.sh/image-registry";
/// Deployment identifier of the release that produced the object
pub const DEPLOYMENT_ID_ANNOTATION: &str = "install.oso.sh/deployment-id";
/// Installation generation the object was stamped with
pub const GENERATION_ANNOTATION: &str = "install.oso.sh/generation";
/// Owner key (`namespace/name` of the Installation) the object belongs to
pub const OWNER_ANNOTATION: &str = "install.oso.sh/owner";
/// Present only on backup copies; value is the origin object's UID
pub const BACKUP_MARKER_ANNOTATION: &str = "install.oso.sh/ephemeral-backup-object";

/// Release triple identifying which install produced an object
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DeployedVersion {
    pub image_tag: String,
    pub image_registry: String,
    pub deployment_id: String,
}

impl DeployedVersion {
    pub fn new(
        image_tag: impl Into<String>,
        image_registry: impl Into<String>,
        deployment_id: impl Into<String>,
    ) -> Self {
        Self {
            image_tag: image_tag.into(),
            image_registry: image_registry.into(),
            deployment_id: deployment_id.into(),
        }
    }

    /// Decode the triple from object metadata.
    ///
    /// All three annotations must be present, otherwise `None`.
    pub fn decode(meta: &ObjectMeta) -> Option<Self> {
        let annotations = meta.annotations.as_ref()?;
        Some(Self {
            image_tag: annotations.get(IMAGE_TAG_ANNOTATION)?.clone(),
            image_registry: annotations.get(IMAGE_REGISTRY_ANNOTATION)?.clone(),
            deployment_id: annotations.get(DEPLOYMENT_ID_ANNOTATION)?.clone(),
        })
    }
}

impl std::fmt::Display for DeployedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} ({})",
            self.image_registry, self.image_tag, self.deployment_id
        )
    }
}

/// Generation the object was stamped with, if the annotation parses
pub fn stamped_generation(meta: &ObjectMeta) -> Option<i64> {
    meta.annotations
        .as_ref()?
        .get(GENERATION_ANNOTATION)?
        .parse()
        .ok()
}

/// Value of the backup marker, if the object is a backup copy
pub fn backup_marker(meta: &ObjectMeta) -> Option<&str> {
    meta.annotations
        .as_ref()?
        .get(BACKUP_MARKER_ANNOTATION)
        .map(String::as_str)
}

/// Owner key the object was stamped with
pub fn owner_key(meta: &ObjectMeta) -> Option<&str> {
    meta.annotations
        .as_ref()?
        .get(OWNER_ANNOTATION)
        .map(String::as_str)
}

/// Whether the object was produced by `version` at Installation `generation`
pub fn object_matches_version(meta: &ObjectMeta, version: &DeployedVersion, generation: i64) -> bool {
    DeployedVersion::decode(meta).as_ref() == Some(version)
        && stamped_generation(meta) == Some(generation)
}
