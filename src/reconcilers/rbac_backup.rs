//! Backups of RBAC objects ahead of in-place upgrades
//!
//! While an upgrade is in progress the roles and bindings of the running
//! release must survive until the new release's equivalents exist. Before a
//! live object is touched, an ephemeral copy of it is created carrying a
//! marker annotation that points back at the live object's UID.

use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::PostParams;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapters::operator_metadata::inject_operator_metadata;
use crate::adapters::version_annotations::{
    backup_marker, object_matches_version, owner_key, DeployedVersion, BACKUP_MARKER_ANNOTATION,
};
use crate::metrics::prometheus::{BACKUPS_CREATED, BACKUP_FAILURES};
use crate::reconcilers::cache::CacheStore;
use crate::reconcilers::expectations::Expectations;
use crate::reconcilers::generations::ObjectKind;
use crate::reconcilers::installation::OperatorState;
use crate::{Error, Result};

/// RBAC kinds protected by backups
pub trait BackupTarget:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: ObjectKind;

    /// API handle to create objects of this kind in `namespace`
    fn api(client: Client, namespace: &str) -> Api<Self>;
}

impl BackupTarget for ClusterRole {
    const KIND: ObjectKind = ObjectKind::ClusterRole;

    fn api(client: Client, _namespace: &str) -> Api<Self> {
        Api::all(client)
    }
}

impl BackupTarget for ClusterRoleBinding {
    const KIND: ObjectKind = ObjectKind::ClusterRoleBinding;

    fn api(client: Client, _namespace: &str) -> Api<Self> {
        Api::all(client)
    }
}

impl BackupTarget for Role {
    const KIND: ObjectKind = ObjectKind::Role;

    fn api(client: Client, namespace: &str) -> Api<Self> {
        Api::namespaced(client, namespace)
    }
}

impl BackupTarget for RoleBinding {
    const KIND: ObjectKind = ObjectKind::RoleBinding;

    fn api(client: Client, namespace: &str) -> Api<Self> {
        Api::namespaced(client, namespace)
    }
}

/// Issues create calls against the API server
pub trait ObjectCreator: Send + Sync {
    fn create<K: BackupTarget>(&self, object: &K) -> impl Future<Output = Result<K>> + Send;
}

impl ObjectCreator for Client {
    async fn create<K: BackupTarget>(&self, object: &K) -> Result<K> {
        let namespace = object.namespace().unwrap_or_default();
        K::api(self.clone(), &namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| Error::KubeError(format!("Failed to create {}: {}", K::KIND, e)))
    }
}

/// Verdict for a single cached object
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackupDecision {
    /// Already stamped with the target version and generation
    UpToDate,
    /// The object is itself a backup copy
    IsBackup,
    /// No complete version triple, not protected by backups
    Unversioned,
    /// Stamped by another owner, left to that owner's passes
    NotOwned,
    /// No UID to point a backup marker at
    Unidentified,
    /// A live backup for this version and generation already exists
    AlreadyBackedUp,
    /// A backup stamped with this version must be created
    Required(DeployedVersion),
}

impl BackupDecision {
    pub fn needs_backup(&self) -> bool {
        matches!(self, BackupDecision::Required(_))
    }
}

/// Decide whether `meta` needs a backup, given a snapshot of its kind's cache
pub fn decide<K: Resource<DynamicType = ()>>(
    state: &OperatorState,
    cached: &[Arc<K>],
    meta: &ObjectMeta,
) -> BackupDecision {
    if object_matches_version(meta, &state.target, state.generation) {
        return BackupDecision::UpToDate;
    }

    if backup_marker(meta).is_some() {
        return BackupDecision::IsBackup;
    }

    let Some(version) = DeployedVersion::decode(meta) else {
        return BackupDecision::Unversioned;
    };

    if owner_key(meta) != Some(state.owner_key.as_str()) {
        return BackupDecision::NotOwned;
    }

    let Some(uid) = meta.uid.as_deref() else {
        return BackupDecision::Unidentified;
    };

    // A single UID may have several backups, one per version it went through
    let backed_up = cached.iter().map(|o| o.meta()).any(|other| {
        other.deletion_timestamp.is_none()
            && backup_marker(other) == Some(uid)
            && object_matches_version(other, &version, state.generation)
    });

    if backed_up {
        BackupDecision::AlreadyBackedUp
    } else {
        BackupDecision::Required(version)
    }
}

/// Build the backup copy of `live` stamped with `version`.
///
/// The copy gets a fresh identity so the API server treats it as a new
/// object: generated name, no UID, resource version, owners or deletion
/// timestamp.
pub fn build_backup<K: BackupTarget>(
    live: &K,
    version: &DeployedVersion,
    state: &OperatorState,
) -> K {
    let origin = live.meta();
    let mut backup = live.clone();
    *backup.meta_mut() = ObjectMeta {
        generate_name: origin.name.clone(),
        namespace: if K::KIND.is_namespaced() {
            origin.namespace.clone()
        } else {
            None
        },
        ..Default::default()
    };

    inject_operator_metadata(backup.meta_mut(), version, state.generation, &state.owner_key);
    backup.annotations_mut().insert(
        BACKUP_MARKER_ANNOTATION.to_string(),
        origin.uid.clone().unwrap_or_default(),
    );

    backup
}

/// Create one backup of `live`, tracked by an expectation.
///
/// On failure the expectation is lowered again before the error is returned.
pub async fn create_backup<K, C>(
    state: &OperatorState,
    expectations: &Expectations,
    creator: &C,
    live: &K,
    version: &DeployedVersion,
) -> Result<K>
where
    K: BackupTarget,
    C: ObjectCreator,
{
    let backup = build_backup(live, version, state);

    expectations.raise(K::KIND, &state.owner_key, 1, 0);
    match creator.create(&backup).await {
        Ok(created) => {
            BACKUPS_CREATED.with_label_values(&[K::KIND.kind()]).inc();
            info!(
                kind = %K::KIND,
                origin = %live.name_any(),
                backup = %created.name_any(),
                "Backup created"
            );
            Ok(created)
        }
        Err(e) => {
            expectations.lower(K::KIND, &state.owner_key, 1, 0);
            BACKUP_FAILURES.with_label_values(&[K::KIND.kind()]).inc();
            warn!(kind = %K::KIND, origin = %live.name_any(), "Backup creation failed: {}", e);
            Err(Error::BackupError(format!(
                "unable to create backup {} for {}: {}",
                K::KIND,
                live.name_any(),
                e
            )))
        }
    }
}

/// Back up every object of one kind that needs it; stops at the first failure
pub async fn backup_kind<K, C>(
    state: &OperatorState,
    cache: &dyn CacheStore<K>,
    expectations: &Expectations,
    creator: &C,
) -> Result<usize>
where
    K: BackupTarget,
    C: ObjectCreator,
{
    let objects = cache.list();
    let mut created = 0;

    for live in &objects {
        match decide(state, &objects, live.meta()) {
            BackupDecision::Required(version) => {
                create_backup(state, expectations, creator, live.as_ref(), &version).await?;
                created += 1;
            }
            decision => {
                debug!(kind = %K::KIND, name = %live.name_any(), ?decision, "No backup needed");
            }
        }
    }

    Ok(created)
}

/// Caches of the four RBAC kinds
#[derive(Clone, Copy)]
pub struct BackupCaches<'a> {
    pub cluster_roles: &'a dyn CacheStore<ClusterRole>,
    pub cluster_role_bindings: &'a dyn CacheStore<ClusterRoleBinding>,
    pub roles: &'a dyn CacheStore<Role>,
    pub role_bindings: &'a dyn CacheStore<RoleBinding>,
}

/// Backups created by one pass, per kind
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackupSummary {
    pub cluster_roles: usize,
    pub cluster_role_bindings: usize,
    pub roles: usize,
    pub role_bindings: usize,
}

impl BackupSummary {
    pub fn total(&self) -> usize {
        self.cluster_roles + self.cluster_role_bindings + self.roles + self.role_bindings
    }
}

/// Run one backup pass over all RBAC kinds.
///
/// The first failed create aborts the pass. Nothing is carried over: the next
/// pass decides again from the caches.
pub async fn run_backup_pass<C: ObjectCreator>(
    state: &OperatorState,
    caches: BackupCaches<'_>,
    expectations: &Expectations,
    creator: &C,
) -> Result<BackupSummary> {
    let summary = BackupSummary {
        cluster_roles: backup_kind(state, caches.cluster_roles, expectations, creator).await?,
        cluster_role_bindings: backup_kind(state, caches.cluster_role_bindings, expectations, creator)
            .await?,
        roles: backup_kind(state, caches.roles, expectations, creator).await?,
        role_bindings: backup_kind(state, caches.role_bindings, expectations, creator).await?,
    };

    if summary.total() > 0 {
        info!(owner = %state.owner_key, backups = summary.total(), "Backup pass created objects");
    }

    Ok(summary)
}
