//! Generation tracking for platform-managed objects
//!
//! The API server bumps `metadata.generation` on every spec-affecting change.
//! Recording the generation seen after each apply lets a later reconcile tell
//! that an object changed underneath the operator without diffing its body.

use kube::Resource;
use std::fmt;
use tracing::debug;

use crate::adapters::version_annotations::{backup_marker, owner_key};
use crate::crd::GenerationStatus;
use crate::reconcilers::cache::CacheStore;

/// Sentinel returned by [`expected_generation`] when nothing is known
pub const UNKNOWN_GENERATION: i64 = -1;

/// Object kinds whose generations and backups the operator tracks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    MutatingWebhookConfiguration,
    ValidatingWebhookConfiguration,
    PodDisruptionBudget,
    ClusterRole,
    ClusterRoleBinding,
    Role,
    RoleBinding,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 7] = [
        ObjectKind::MutatingWebhookConfiguration,
        ObjectKind::ValidatingWebhookConfiguration,
        ObjectKind::PodDisruptionBudget,
        ObjectKind::ClusterRole,
        ObjectKind::ClusterRoleBinding,
        ObjectKind::Role,
        ObjectKind::RoleBinding,
    ];

    /// (api group, kind, plural resource, namespaced)
    const fn row(self) -> (&'static str, &'static str, &'static str, bool) {
        match self {
            ObjectKind::MutatingWebhookConfiguration => (
                "admissionregistration.k8s.io",
                "MutatingWebhookConfiguration",
                "mutatingwebhookconfigurations",
                false,
            ),
            ObjectKind::ValidatingWebhookConfiguration => (
                "admissionregistration.k8s.io",
                "ValidatingWebhookConfiguration",
                "validatingwebhookconfigurations",
                false,
            ),
            ObjectKind::PodDisruptionBudget => {
                ("policy", "PodDisruptionBudget", "poddisruptionbudgets", true)
            }
            ObjectKind::ClusterRole => (
                "rbac.authorization.k8s.io",
                "ClusterRole",
                "clusterroles",
                false,
            ),
            ObjectKind::ClusterRoleBinding => (
                "rbac.authorization.k8s.io",
                "ClusterRoleBinding",
                "clusterrolebindings",
                false,
            ),
            ObjectKind::Role => ("rbac.authorization.k8s.io", "Role", "roles", true),
            ObjectKind::RoleBinding => {
                ("rbac.authorization.k8s.io", "RoleBinding", "rolebindings", true)
            }
        }
    }

    pub fn group(self) -> &'static str {
        self.row().0
    }

    pub fn kind(self) -> &'static str {
        self.row().1
    }

    pub fn resource(self) -> &'static str {
        self.row().2
    }

    pub fn is_namespaced(self) -> bool {
        self.row().3
    }

    /// Classify by API group and kind
    pub fn from_group_kind(group: &str, kind: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.group() == group && k.kind() == kind)
    }

    /// Classify a statically typed resource
    pub fn of<K>() -> Option<Self>
    where
        K: Resource<DynamicType = ()>,
    {
        Self::from_group_kind(&K::group(&()), &K::kind(&()))
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Identity of an object in the generation list
struct GenerationKey {
    kind: ObjectKind,
    namespace: String,
    name: String,
    generation: i64,
}

impl GenerationKey {
    fn of<K>(object: &K) -> Option<Self>
    where
        K: Resource<DynamicType = ()>,
    {
        let kind = ObjectKind::of::<K>()?;
        let meta = object.meta();
        let namespace = if kind.is_namespaced() {
            meta.namespace.clone().unwrap_or_default()
        } else {
            String::new()
        };
        Some(Self {
            kind,
            namespace,
            name: meta.name.clone().unwrap_or_default(),
            generation: meta.generation.unwrap_or_default(),
        })
    }

    fn matches(&self, status: &GenerationStatus) -> bool {
        is_record_of(status, self.kind, &self.namespace, &self.name)
    }
}

/// Find the record for an object
pub fn generation_for<'a>(
    generations: &'a [GenerationStatus],
    kind: ObjectKind,
    namespace: &str,
    name: &str,
) -> Option<&'a GenerationStatus> {
    generations
        .iter()
        .find(|g| is_record_of(g, kind, namespace, name))
}

fn is_record_of(status: &GenerationStatus, kind: ObjectKind, namespace: &str, name: &str) -> bool {
    status.group == kind.group()
        && status.resource == kind.resource()
        && status.namespace == namespace
        && status.name == name
}

/// Last recorded generation of `object`, `None` if unknown or unclassified
pub fn lookup_generation<K>(object: &K, generations: &[GenerationStatus]) -> Option<i64>
where
    K: Resource<DynamicType = ()>,
{
    let key = GenerationKey::of(object)?;
    generation_for(generations, key.kind, &key.namespace, &key.name).map(|g| g.last_generation)
}

/// Last recorded generation of `object`, or [`UNKNOWN_GENERATION`]
pub fn expected_generation<K>(object: &K, generations: &[GenerationStatus]) -> i64
where
    K: Resource<DynamicType = ()>,
{
    lookup_generation(object, generations).unwrap_or(UNKNOWN_GENERATION)
}

/// Upsert the current generation of `actual` into `generations`.
///
/// Does nothing for `None` or for kinds outside [`ObjectKind`].
pub fn record_generation<K>(generations: &mut Vec<GenerationStatus>, actual: Option<&K>)
where
    K: Resource<DynamicType = ()>,
{
    let Some(key) = actual.and_then(GenerationKey::of) else {
        return;
    };

    if let Some(existing) = generations.iter_mut().find(|g| key.matches(g)) {
        existing.last_generation = key.generation;
        return;
    }

    generations.push(GenerationStatus {
        group: key.kind.group().to_string(),
        resource: key.kind.resource().to_string(),
        namespace: key.namespace,
        name: key.name,
        last_generation: key.generation,
    });
}

/// Record every live object of `owner` in `cache`, returning how many had
/// moved past their previously recorded generation.
///
/// Backup copies are skipped; only the objects the owner applies are tracked.
pub fn record_owned_generations<K>(
    generations: &mut Vec<GenerationStatus>,
    cache: &dyn CacheStore<K>,
    owner: &str,
) -> usize
where
    K: Resource<DynamicType = ()>,
{
    let mut drifted = 0;
    for object in cache.list() {
        let meta = object.meta();
        if owner_key(meta) != Some(owner) || backup_marker(meta).is_some() {
            continue;
        }

        let current = meta.generation.unwrap_or_default();
        if let Some(expected) = lookup_generation(object.as_ref(), &*generations) {
            if expected != current {
                debug!(
                    kind = %K::kind(&()),
                    name = ?meta.name,
                    expected,
                    current,
                    "Generation drift detected"
                );
                drifted += 1;
            }
        }

        record_generation(generations, Some(object.as_ref()));
    }
    drifted
}
