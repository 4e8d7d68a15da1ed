//! Reconciliation logic for Installation resources

use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::adapters::version_annotations::DeployedVersion;
use crate::crd::{Condition, GenerationStatus, Installation, InstallationStatus};
use crate::{Error, Result};

/// What the operator is currently converging towards
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorState {
    /// Target release triple
    pub target: DeployedVersion,
    /// `metadata.generation` of the Installation
    pub generation: i64,
    /// `namespace/name` of the Installation, keys expectations
    pub owner_key: String,
}

impl OperatorState {
    pub fn from_installation(installation: &Installation) -> Result<Self> {
        validate(installation)?;
        let generation = installation.metadata.generation.ok_or_else(|| {
            Error::ValidationError("metadata.generation is not set".to_string())
        })?;

        Ok(Self {
            target: target_version(installation),
            generation,
            owner_key: owner_key(installation),
        })
    }
}

/// Validate an Installation spec
pub fn validate(installation: &Installation) -> Result<()> {
    let spec = &installation.spec;

    if spec.image_tag.trim().is_empty() {
        return Err(Error::ValidationError(
            "imageTag cannot be empty".to_string(),
        ));
    }

    if spec.image_registry.trim().is_empty() {
        return Err(Error::ValidationError(
            "imageRegistry cannot be empty".to_string(),
        ));
    }

    if spec.product_name.trim().is_empty() {
        return Err(Error::ValidationError(
            "productName cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Key identifying the Installation in expectations and owner annotations
pub fn owner_key(installation: &Installation) -> String {
    format!(
        "{}/{}",
        installation.namespace().unwrap_or_default(),
        installation.name_any()
    )
}

/// Target release triple of an Installation
pub fn target_version(installation: &Installation) -> DeployedVersion {
    let spec = &installation.spec;
    DeployedVersion::new(
        spec.image_tag.clone(),
        spec.image_registry.clone(),
        deployment_id(installation),
    )
}

/// Deterministic identifier of the requested deployment
pub fn deployment_id(installation: &Installation) -> String {
    let spec = &installation.spec;
    let mut hasher = Sha256::new();
    hasher.update(spec.image_registry.as_bytes());
    hasher.update(b"\0");
    hasher.update(spec.image_tag.as_bytes());
    hasher.update(b"\0");
    hasher.update(spec.product_name.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

/// Outcome of a pass, reflected into status
#[derive(Clone, Debug)]
pub struct PassOutcome {
    pub phase: &'static str,
    pub backups_created: usize,
    pub generations: Vec<GenerationStatus>,
}

/// Update the status of an Installation
pub async fn update_status(
    installation: &Installation,
    client: &Client,
    namespace: &str,
    outcome: &PassOutcome,
) -> Result<()> {
    let name = installation.name_any();
    let target = target_version(installation);
    let now = Utc::now();

    let conditions = vec![
        Condition {
            type_: "Validated".to_string(),
            status: "True".to_string(),
            last_transition_time: now,
            reason: Some("SpecValid".to_string()),
            message: Some("Installation spec is valid".to_string()),
        },
        Condition {
            type_: "RbacBackedUp".to_string(),
            status: if outcome.backups_created > 0 { "False" } else { "True" }.to_string(),
            last_transition_time: now,
            reason: Some(
                if outcome.backups_created > 0 {
                    "BackupsPending"
                } else {
                    "BackupsPresent"
                }
                .to_string(),
            ),
            message: Some(format!(
                "{} backup object(s) created in the last pass",
                outcome.backups_created
            )),
        },
        Condition {
            type_: "Ready".to_string(),
            status: if outcome.phase == "Reconciled" { "True" } else { "False" }.to_string(),
            last_transition_time: now,
            reason: Some(outcome.phase.to_string()),
            message: Some(format!("Installation is {}", outcome.phase.to_lowercase())),
        },
    ];

    let status = InstallationStatus {
        phase: Some(outcome.phase.to_string()),
        message: Some(format!("Converging towards {}", target)),
        deployment_id: Some(target.deployment_id.clone()),
        target_image_tag: Some(target.image_tag.clone()),
        target_image_registry: Some(target.image_registry.clone()),
        observed_generation: installation.metadata.generation,
        generations: outcome.generations.clone(),
        last_update_time: Some(now),
        conditions,
    };

    let installations: Api<Installation> = Api::namespaced(client.clone(), namespace);
    let patch = serde_json::json!({
        "status": status
    });

    installations
        .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(|e| Error::KubeError(format!("Failed to update status: {}", e)))?;

    info!(
        "Updated status for {}/{}: phase={}, tracked generations={}",
        namespace,
        name,
        outcome.phase,
        outcome.generations.len()
    );

    Ok(())
}
