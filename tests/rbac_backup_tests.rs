//! Integration tests for RBAC backups
//!
//! These tests drive the backup decision and the backup pass against fixture
//! caches and an in-memory create call, checking which objects get backed up,
//! how backups are stamped, and how expectations move.

use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
use kube::runtime::watcher;
use kube::{Resource, ResourceExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use install_strategy_operator::adapters::operator_metadata::inject_operator_metadata;
use install_strategy_operator::adapters::version_annotations::{
    backup_marker, object_matches_version, owner_key, stamped_generation, DeployedVersion,
    BACKUP_MARKER_ANNOTATION,
};
use install_strategy_operator::controllers::cache::CreationObserver;
use install_strategy_operator::reconcilers::expectations::{Expectations, Pending};
use install_strategy_operator::reconcilers::generations::ObjectKind;
use install_strategy_operator::reconcilers::installation::OperatorState;
use install_strategy_operator::reconcilers::rbac_backup::{
    backup_kind, build_backup, create_backup, decide, run_backup_pass, BackupCaches,
    BackupDecision, BackupTarget, ObjectCreator,
};
use install_strategy_operator::{Error, Result};

const OWNER: &str = "kubevirt/install";
const OTHER_OWNER: &str = "tenant-b/install";

// ============================================================================
// Test Helpers
// ============================================================================

/// Records every created object's metadata; fails the call numbered `fail_on`
#[derive(Default)]
struct RecordingCreator {
    created: Mutex<Vec<(ObjectKind, ObjectMeta)>>,
    calls: AtomicUsize,
    fail_on: Option<usize>,
    expectations: Option<Arc<Expectations>>,
    pending_at_call: Mutex<Vec<Pending>>,
}

impl RecordingCreator {
    fn failing_on(call: usize) -> Self {
        Self {
            fail_on: Some(call),
            ..Default::default()
        }
    }

    fn watching(expectations: Arc<Expectations>) -> Self {
        Self {
            expectations: Some(expectations),
            ..Default::default()
        }
    }

    fn created(&self) -> Vec<(ObjectKind, ObjectMeta)> {
        self.created.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ObjectCreator for RecordingCreator {
    async fn create<K: BackupTarget>(&self, object: &K) -> Result<K> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(expectations) = &self.expectations {
            self.pending_at_call
                .lock()
                .unwrap()
                .push(expectations.pending(K::KIND, OWNER));
        }
        if self.fail_on == Some(call) {
            return Err(Error::KubeError("admission webhook denied the request".to_string()));
        }

        let mut stored = object.clone();
        let meta = stored.meta_mut();
        meta.name = Some(format!(
            "{}{}",
            meta.generate_name.clone().unwrap_or_default(),
            call
        ));
        meta.uid = Some(format!("backup-uid-{}", call));
        self.created
            .lock()
            .unwrap()
            .push((K::KIND, stored.meta().clone()));
        Ok(stored)
    }
}

fn target() -> DeployedVersion {
    DeployedVersion::new("1.0", "registry.io", "id1")
}

fn state(generation: i64) -> OperatorState {
    OperatorState {
        target: target(),
        generation,
        owner_key: OWNER.to_string(),
    }
}

fn live_meta(name: &str, namespace: Option<&str>, version: &DeployedVersion, generation: i64) -> ObjectMeta {
    owned_meta(name, namespace, version, generation, OWNER)
}

fn owned_meta(
    name: &str,
    namespace: Option<&str>,
    version: &DeployedVersion,
    generation: i64,
    owner: &str,
) -> ObjectMeta {
    let mut meta = ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        uid: Some(format!("uid-{}", name)),
        resource_version: Some("12345".to_string()),
        generation: Some(1),
        ..Default::default()
    };
    inject_operator_metadata(&mut meta, version, generation, owner);
    meta
}

fn unversioned_meta(name: &str, namespace: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        uid: Some(format!("uid-{}", name)),
        ..Default::default()
    }
}

fn cluster_role(metadata: ObjectMeta) -> ClusterRole {
    ClusterRole {
        metadata,
        rules: Some(vec![PolicyRule {
            api_groups: Some(vec![String::new()]),
            resources: Some(vec!["pods".to_string()]),
            verbs: vec!["get".to_string(), "list".to_string()],
            ..Default::default()
        }]),
        ..Default::default()
    }
}

fn role_binding(metadata: ObjectMeta) -> RoleBinding {
    RoleBinding {
        metadata,
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: "reader".to_string(),
        },
        subjects: None,
    }
}

/// Backup of `live` as the executor would have created it
fn existing_backup(live: &ClusterRole, version: &DeployedVersion, generation: i64) -> ClusterRole {
    let mut backup = build_backup(live, version, &state(generation));
    backup.metadata.name = Some(format!("{}-backup", live.name_any()));
    backup.metadata.uid = Some(format!("backup-of-{}", live.name_any()));
    backup
}

fn decide_for(state: &OperatorState, cache: &[ClusterRole], live: &ClusterRole) -> BackupDecision {
    let snapshot: Vec<Arc<ClusterRole>> = cache.iter().cloned().map(Arc::new).collect();
    decide(state, &snapshot, live.meta())
}

struct Fixtures {
    cluster_roles: Vec<ClusterRole>,
    cluster_role_bindings: Vec<ClusterRoleBinding>,
    roles: Vec<Role>,
    role_bindings: Vec<RoleBinding>,
}

impl Fixtures {
    fn empty() -> Self {
        Self {
            cluster_roles: vec![],
            cluster_role_bindings: vec![],
            roles: vec![],
            role_bindings: vec![],
        }
    }

    fn caches(&self) -> BackupCaches<'_> {
        BackupCaches {
            cluster_roles: &self.cluster_roles,
            cluster_role_bindings: &self.cluster_role_bindings,
            roles: &self.roles,
            role_bindings: &self.role_bindings,
        }
    }
}

// ============================================================================
// Decision Tests
// ============================================================================

#[test]
fn object_at_target_version_and_generation_needs_no_backup() {
    let live = cluster_role(live_meta("foo", None, &target(), 3));

    assert_eq!(decide_for(&state(3), &[live.clone()], &live), BackupDecision::UpToDate);
}

#[test]
fn object_behind_operator_generation_needs_backup() {
    let live = cluster_role(live_meta("foo", None, &target(), 3));

    assert_eq!(
        decide_for(&state(4), &[live.clone()], &live),
        BackupDecision::Required(target())
    );
}

#[test]
fn object_from_older_release_needs_backup_with_its_own_version() {
    let old = DeployedVersion::new("0.9", "registry.io", "id0");
    let live = cluster_role(live_meta("foo", None, &old, 3));

    assert_eq!(
        decide_for(&state(3), &[live.clone()], &live),
        BackupDecision::Required(old)
    );
}

#[test]
fn unversioned_object_is_exempt_regardless_of_generation() {
    let live = cluster_role(unversioned_meta("foo", None));

    for generation in [1, 3, 4, 100] {
        assert_eq!(
            decide_for(&state(generation), &[live.clone()], &live),
            BackupDecision::Unversioned
        );
    }
}

#[test]
fn partially_annotated_object_is_exempt() {
    let mut meta = live_meta("foo", None, &target(), 3);
    meta.annotations
        .as_mut()
        .unwrap()
        .remove("install.oso.sh/deployment-id");
    let live = cluster_role(meta);

    assert_eq!(decide_for(&state(4), &[live.clone()], &live), BackupDecision::Unversioned);
}

#[test]
fn backup_objects_are_never_backed_up() {
    let old = DeployedVersion::new("0.9", "registry.io", "id0");
    let live = cluster_role(live_meta("foo", None, &old, 2));
    let backup = existing_backup(&live, &old, 2);

    assert_eq!(
        decide_for(&state(4), &[live.clone(), backup.clone()], &backup),
        BackupDecision::IsBackup
    );
}

#[test]
fn existing_matching_backup_prevents_duplicate() {
    let live = cluster_role(live_meta("foo", None, &target(), 3));
    let backup = existing_backup(&live, &target(), 4);

    assert_eq!(
        decide_for(&state(4), &[live.clone(), backup], &live),
        BackupDecision::AlreadyBackedUp
    );
}

#[test]
fn terminating_backup_does_not_count() {
    let live = cluster_role(live_meta("foo", None, &target(), 3));
    let mut backup = existing_backup(&live, &target(), 4);
    backup.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));

    assert!(decide_for(&state(4), &[live.clone(), backup], &live).needs_backup());
}

#[test]
fn backup_for_an_earlier_generation_does_not_count() {
    let live = cluster_role(live_meta("foo", None, &target(), 3));
    let backup = existing_backup(&live, &target(), 3);

    assert!(decide_for(&state(4), &[live.clone(), backup], &live).needs_backup());
}

#[test]
fn backup_of_another_object_does_not_count() {
    let live = cluster_role(live_meta("foo", None, &target(), 3));
    let other = cluster_role(live_meta("bar", None, &target(), 3));
    let backup = existing_backup(&other, &target(), 4);

    assert!(decide_for(&state(4), &[live.clone(), other, backup], &live).needs_backup());
}

#[test]
fn object_stamped_by_another_owner_is_left_alone() {
    let theirs = DeployedVersion::new("2.0", "quay.io", "idB");
    let live = cluster_role(owned_meta("foo", None, &theirs, 5, OTHER_OWNER));

    let decision = decide_for(&state(5), &[live.clone()], &live);

    assert_eq!(decision, BackupDecision::NotOwned);
    assert!(!decision.needs_backup());
}

#[test]
fn object_without_uid_is_not_backed_up() {
    let mut meta = live_meta("foo", None, &target(), 3);
    meta.uid = None;
    let live = cluster_role(meta);

    assert_eq!(decide_for(&state(4), &[live.clone()], &live), BackupDecision::Unidentified);
}

#[test]
fn decision_is_stable_without_cache_changes() {
    let live = cluster_role(live_meta("foo", None, &target(), 3));
    let cache = vec![live.clone()];

    let first = decide_for(&state(4), &cache, &live);
    let second = decide_for(&state(4), &cache, &live);
    assert_eq!(first, second);
}

// ============================================================================
// Backup Construction Tests
// ============================================================================

#[test]
fn backup_gets_fresh_identity_and_marker() {
    let mut meta = live_meta("foo", None, &target(), 3);
    meta.owner_references = Some(vec![OwnerReference {
        api_version: "install.oso.sh/v1alpha1".to_string(),
        kind: "Installation".to_string(),
        name: "install".to_string(),
        uid: "owner-uid".to_string(),
        ..Default::default()
    }]);
    meta.deletion_timestamp = Some(Time(chrono::Utc::now()));
    let live = cluster_role(meta);

    let backup = build_backup(&live, &target(), &state(4));

    assert_eq!(backup.metadata.name, None);
    assert_eq!(backup.metadata.generate_name.as_deref(), Some("foo"));
    assert_eq!(backup.metadata.namespace, None);
    assert_eq!(backup.metadata.uid, None);
    assert_eq!(backup.metadata.resource_version, None);
    assert_eq!(backup.metadata.owner_references, None);
    assert_eq!(backup.metadata.deletion_timestamp, None);
    assert_eq!(backup_marker(&backup.metadata), Some("uid-foo"));
    assert_eq!(owner_key(&backup.metadata), Some(OWNER));
    assert!(object_matches_version(&backup.metadata, &target(), 4));
    assert_eq!(backup.rules, live.rules);
}

#[test]
fn namespaced_backup_keeps_namespace() {
    let live = Role {
        metadata: live_meta("reader", Some("apps"), &target(), 3),
        ..Default::default()
    };

    let backup = build_backup(&live, &target(), &state(4));

    assert_eq!(backup.metadata.namespace.as_deref(), Some("apps"));
    assert_eq!(backup.metadata.generate_name.as_deref(), Some("reader"));
}

// ============================================================================
// Executor Tests
// ============================================================================

#[tokio::test]
async fn scenario_backup_created_for_generation_bump() {
    let expectations = Arc::new(Expectations::new());
    let creator = RecordingCreator::watching(expectations.clone());
    let mut fixtures = Fixtures::empty();
    fixtures
        .cluster_roles
        .push(cluster_role(live_meta("foo", None, &target(), 3)));

    let summary = run_backup_pass(&state(4), fixtures.caches(), &expectations, &creator)
        .await
        .unwrap();

    assert_eq!(summary.cluster_roles, 1);
    assert_eq!(summary.total(), 1);

    let created = creator.created();
    assert_eq!(created.len(), 1);
    let (kind, meta) = &created[0];
    assert_eq!(*kind, ObjectKind::ClusterRole);
    assert_eq!(meta.generate_name.as_deref(), Some("foo"));
    assert_eq!(meta.namespace, None);
    assert_eq!(backup_marker(meta), Some("uid-foo"));
    assert_eq!(DeployedVersion::decode(meta), Some(target()));
    assert_eq!(stamped_generation(meta), Some(4));

    // Raised before the call, left raised after success
    assert_eq!(
        creator.pending_at_call.lock().unwrap().clone(),
        vec![Pending { adds: 1, deletes: 0 }]
    );
    assert_eq!(
        expectations.pending(ObjectKind::ClusterRole, OWNER),
        Pending { adds: 1, deletes: 0 }
    );
    assert!(!expectations.all_satisfied(OWNER));
}

#[tokio::test]
async fn scenario_up_to_date_object_creates_nothing() {
    let expectations = Expectations::new();
    let creator = RecordingCreator::default();
    let mut fixtures = Fixtures::empty();
    fixtures
        .cluster_roles
        .push(cluster_role(live_meta("foo", None, &target(), 3)));

    let summary = run_backup_pass(&state(3), fixtures.caches(), &expectations, &creator)
        .await
        .unwrap();

    assert_eq!(summary.total(), 0);
    assert_eq!(creator.calls(), 0);
    assert!(expectations.all_satisfied(OWNER));
}

#[tokio::test]
async fn scenario_unversioned_object_creates_nothing() {
    let expectations = Expectations::new();
    let creator = RecordingCreator::default();
    let mut fixtures = Fixtures::empty();
    fixtures
        .cluster_roles
        .push(cluster_role(unversioned_meta("foo", None)));

    let summary = run_backup_pass(&state(4), fixtures.caches(), &expectations, &creator)
        .await
        .unwrap();

    assert_eq!(summary.total(), 0);
    assert_eq!(creator.calls(), 0);
}

#[tokio::test]
async fn failed_create_rolls_back_expectation() {
    let expectations = Expectations::new();
    expectations.raise(ObjectKind::ClusterRole, OWNER, 2, 0);
    let before = expectations.pending(ObjectKind::ClusterRole, OWNER);

    let creator = RecordingCreator::failing_on(0);
    let live = cluster_role(live_meta("foo", None, &target(), 3));

    let result = create_backup(&state(4), &expectations, &creator, &live, &target()).await;

    assert!(matches!(result, Err(Error::BackupError(_))));
    assert_eq!(expectations.pending(ObjectKind::ClusterRole, OWNER), before);
}

#[tokio::test]
async fn failed_create_from_zero_leaves_owner_unblocked() {
    let expectations = Expectations::new();
    let creator = RecordingCreator::failing_on(0);
    let cache = vec![cluster_role(live_meta("foo", None, &target(), 3))];

    let result = backup_kind::<ClusterRole, _>(&state(4), &cache, &expectations, &creator).await;

    assert!(result.is_err());
    assert!(expectations.all_satisfied(OWNER));
}

#[tokio::test]
async fn first_failure_aborts_the_pass() {
    let expectations = Expectations::new();
    let creator = RecordingCreator::failing_on(0);
    let mut fixtures = Fixtures::empty();
    fixtures.cluster_roles = vec![
        cluster_role(live_meta("foo", None, &target(), 3)),
        cluster_role(live_meta("bar", None, &target(), 3)),
    ];
    fixtures.roles.push(Role {
        metadata: live_meta("reader", Some("apps"), &target(), 3),
        ..Default::default()
    });

    let result = run_backup_pass(&state(4), fixtures.caches(), &expectations, &creator).await;

    assert!(matches!(result, Err(Error::BackupError(_))));
    assert_eq!(creator.calls(), 1);
    assert!(creator.created().is_empty());
    assert!(expectations.all_satisfied(OWNER));
}

#[tokio::test]
async fn later_failure_keeps_earlier_expectations() {
    let expectations = Expectations::new();
    let creator = RecordingCreator::failing_on(1);
    let mut fixtures = Fixtures::empty();
    fixtures
        .cluster_roles
        .push(cluster_role(live_meta("foo", None, &target(), 3)));
    fixtures.roles.push(Role {
        metadata: live_meta("reader", Some("apps"), &target(), 3),
        ..Default::default()
    });

    let result = run_backup_pass(&state(4), fixtures.caches(), &expectations, &creator).await;

    assert!(result.is_err());
    assert_eq!(
        expectations.pending(ObjectKind::ClusterRole, OWNER),
        Pending { adds: 1, deletes: 0 }
    );
    assert!(expectations.satisfied(ObjectKind::Role, OWNER));
}

#[tokio::test]
async fn pass_covers_all_four_kinds() {
    let expectations = Expectations::new();
    let creator = RecordingCreator::default();
    let mut fixtures = Fixtures::empty();
    fixtures
        .cluster_roles
        .push(cluster_role(live_meta("foo", None, &target(), 3)));
    fixtures.cluster_role_bindings.push(ClusterRoleBinding {
        metadata: live_meta("foo", None, &target(), 3),
        ..Default::default()
    });
    fixtures.roles.push(Role {
        metadata: live_meta("reader", Some("apps"), &target(), 3),
        ..Default::default()
    });
    fixtures
        .role_bindings
        .push(role_binding(live_meta("reader", Some("apps"), &target(), 3)));

    let summary = run_backup_pass(&state(4), fixtures.caches(), &expectations, &creator)
        .await
        .unwrap();

    assert_eq!(summary.cluster_roles, 1);
    assert_eq!(summary.cluster_role_bindings, 1);
    assert_eq!(summary.roles, 1);
    assert_eq!(summary.role_bindings, 1);

    for kind in [
        ObjectKind::ClusterRole,
        ObjectKind::ClusterRoleBinding,
        ObjectKind::Role,
        ObjectKind::RoleBinding,
    ] {
        assert_eq!(expectations.pending(kind, OWNER), Pending { adds: 1, deletes: 0 });
    }

    let namespaces: Vec<Option<String>> = creator
        .created()
        .into_iter()
        .map(|(_, meta)| meta.namespace)
        .collect();
    assert_eq!(
        namespaces,
        vec![None, None, Some("apps".to_string()), Some("apps".to_string())]
    );
}

#[tokio::test]
async fn role_bindings_follow_the_same_exemption_rule() {
    let expectations = Expectations::new();
    let creator = RecordingCreator::default();
    let mut fixtures = Fixtures::empty();
    fixtures.role_bindings = vec![
        role_binding(live_meta("versioned", Some("apps"), &target(), 3)),
        role_binding(unversioned_meta("plain", Some("apps"))),
    ];

    let summary = run_backup_pass(&state(4), fixtures.caches(), &expectations, &creator)
        .await
        .unwrap();

    assert_eq!(summary.role_bindings, 1);
    let created = creator.created();
    assert_eq!(backup_marker(&created[0].1), Some("uid-versioned"));
}

#[tokio::test]
async fn pass_only_backs_up_objects_of_its_owner() {
    let expectations = Arc::new(Expectations::new());
    let creator = RecordingCreator::watching(expectations.clone());
    let theirs = DeployedVersion::new("2.0", "quay.io", "idB");
    let mut fixtures = Fixtures::empty();
    fixtures.cluster_roles = vec![
        cluster_role(live_meta("mine", None, &target(), 3)),
        cluster_role(owned_meta("theirs", None, &theirs, 3, OTHER_OWNER)),
    ];
    fixtures.role_bindings = vec![
        role_binding(owned_meta("theirs", Some("tenant-b"), &theirs, 3, OTHER_OWNER)),
    ];

    // Generation bumps of this owner never reach the other owner's objects
    for generation in [4, 5] {
        run_backup_pass(&state(generation), fixtures.caches(), &expectations, &creator)
            .await
            .unwrap();
    }

    let created = creator.created();
    assert_eq!(created.len(), 2);
    for (kind, meta) in &created {
        assert_eq!(*kind, ObjectKind::ClusterRole);
        assert_eq!(backup_marker(meta), Some("uid-mine"));
        assert_eq!(owner_key(meta), Some(OWNER));
    }

    assert_eq!(
        expectations.pending(ObjectKind::ClusterRole, OWNER),
        Pending { adds: 2, deletes: 0 }
    );
    assert!(expectations.all_satisfied(OTHER_OWNER));
}

#[tokio::test]
async fn second_pass_after_backup_is_visible_creates_nothing() {
    let expectations = Expectations::new();
    let creator = RecordingCreator::default();
    let live = cluster_role(live_meta("foo", None, &target(), 3));
    let mut cache = vec![live.clone()];

    let created = backup_kind::<ClusterRole, _>(&state(4), &cache, &expectations, &creator)
        .await
        .unwrap();
    assert_eq!(created, 1);

    // The watch cache now holds the backup
    let (_, meta) = creator.created().remove(0);
    cache.push(ClusterRole {
        metadata: meta,
        ..live.clone()
    });

    let created = backup_kind::<ClusterRole, _>(&state(4), &cache, &expectations, &creator)
        .await
        .unwrap();
    assert_eq!(created, 0);
    assert_eq!(creator.calls(), 1);
}

// ============================================================================
// Watch Observer Tests
// ============================================================================

#[tokio::test]
async fn observed_backup_lowers_expectation_once() {
    let expectations = Arc::new(Expectations::new());
    let creator = RecordingCreator::default();
    let cache = vec![cluster_role(live_meta("foo", None, &target(), 3))];

    backup_kind::<ClusterRole, _>(&state(4), &cache, &expectations, &creator)
        .await
        .unwrap();
    assert!(!expectations.all_satisfied(OWNER));

    let (_, meta) = creator.created().remove(0);
    let backup = cluster_role(meta);
    let mut observer = CreationObserver::new(ObjectKind::ClusterRole, expectations.clone());

    observer.observe(&watcher::Event::Apply(backup.clone()));
    assert!(expectations.all_satisfied(OWNER));

    // A second raise is not satisfied by an update of the same object
    expectations.raise(ObjectKind::ClusterRole, OWNER, 1, 0);
    observer.observe(&watcher::Event::Apply(backup));
    assert!(!expectations.all_satisfied(OWNER));
}

#[test]
fn observer_ignores_live_objects() {
    let expectations = Arc::new(Expectations::new());
    expectations.raise(ObjectKind::ClusterRole, OWNER, 1, 0);
    let mut observer = CreationObserver::new(ObjectKind::ClusterRole, expectations.clone());

    let live = cluster_role(live_meta("foo", None, &target(), 3));
    assert!(live.annotations().get(BACKUP_MARKER_ANNOTATION).is_none());
    observer.observe(&watcher::Event::Apply(live));

    assert!(!expectations.all_satisfied(OWNER));
}

#[test]
fn relist_forgets_backups_deleted_while_disconnected() {
    let expectations = Arc::new(Expectations::new());
    let live = cluster_role(live_meta("foo", None, &target(), 3));
    let backup = existing_backup(&live, &target(), 4);
    let mut observer = CreationObserver::new(ObjectKind::ClusterRole, expectations.clone());

    expectations.raise(ObjectKind::ClusterRole, OWNER, 1, 0);
    observer.observe(&watcher::Event::Apply(backup.clone()));
    assert!(expectations.all_satisfied(OWNER));

    // The backup is gone from the relist, so its UID is no longer tracked
    observer.observe(&watcher::Event::<ClusterRole>::Init);
    observer.observe(&watcher::Event::InitApply(live));
    observer.observe(&watcher::Event::<ClusterRole>::InitDone);

    expectations.raise(ObjectKind::ClusterRole, OWNER, 1, 0);
    observer.observe(&watcher::Event::Apply(backup));
    assert!(expectations.all_satisfied(OWNER));
}

#[test]
fn relist_keeps_backups_still_present() {
    let expectations = Arc::new(Expectations::new());
    let live = cluster_role(live_meta("foo", None, &target(), 3));
    let backup = existing_backup(&live, &target(), 4);
    let mut observer = CreationObserver::new(ObjectKind::ClusterRole, expectations.clone());

    expectations.raise(ObjectKind::ClusterRole, OWNER, 1, 0);
    observer.observe(&watcher::Event::Apply(backup.clone()));
    assert!(expectations.all_satisfied(OWNER));

    expectations.raise(ObjectKind::ClusterRole, OWNER, 1, 0);
    observer.observe(&watcher::Event::<ClusterRole>::Init);
    observer.observe(&watcher::Event::InitApply(backup.clone()));
    observer.observe(&watcher::Event::<ClusterRole>::InitDone);
    observer.observe(&watcher::Event::Apply(backup));

    assert_eq!(
        expectations.pending(ObjectKind::ClusterRole, OWNER),
        Pending { adds: 1, deletes: 0 }
    );
}
