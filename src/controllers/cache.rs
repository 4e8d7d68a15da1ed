//! Watch caches of managed objects

use futures::StreamExt;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::reflector::{self, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt::Debug;
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapters::operator_metadata::MANAGED_BY_SELECTOR;
use crate::adapters::version_annotations::{backup_marker, owner_key};
use crate::crd::GenerationStatus;
use crate::metrics::prometheus::GENERATION_DRIFT;
use crate::reconcilers::expectations::Expectations;
use crate::reconcilers::generations::{record_owned_generations, ObjectKind};
use crate::reconcilers::rbac_backup::BackupCaches;
use crate::{Error, Result};

/// Lowers add expectations the first time a backup object shows up in a watch.
///
/// The set of seen UIDs is rebuilt from every relist, so objects deleted
/// while the watch was down are forgotten.
pub struct CreationObserver {
    kind: ObjectKind,
    expectations: Arc<Expectations>,
    seen: HashSet<String>,
    relisted: HashSet<String>,
}

impl CreationObserver {
    pub fn new(kind: ObjectKind, expectations: Arc<Expectations>) -> Self {
        Self {
            kind,
            expectations,
            seen: HashSet::new(),
            relisted: HashSet::new(),
        }
    }

    pub fn observe<K: Resource>(&mut self, event: &watcher::Event<K>) {
        match event {
            watcher::Event::Apply(object) => self.sighted(object.meta()),
            watcher::Event::InitApply(object) => {
                if let Some(uid) = object.meta().uid.as_ref() {
                    self.relisted.insert(uid.clone());
                }
                self.sighted(object.meta());
            }
            watcher::Event::Delete(object) => {
                if let Some(uid) = object.meta().uid.as_ref() {
                    self.seen.remove(uid);
                }
            }
            watcher::Event::Init => self.relisted.clear(),
            watcher::Event::InitDone => {
                self.seen = std::mem::take(&mut self.relisted);
                debug!(kind = %self.kind, tracked = self.seen.len(), "Relist complete");
            }
        }
    }

    fn sighted(&mut self, meta: &ObjectMeta) {
        let Some(uid) = meta.uid.clone() else {
            return;
        };
        if !self.seen.insert(uid) || backup_marker(meta).is_none() {
            return;
        }
        if let Some(owner) = owner_key(meta) {
            debug!(kind = %self.kind, owner, name = ?meta.name, "Observed backup creation");
            self.expectations.lower(self.kind, owner, 1, 0);
        }
    }
}

/// Start a reflector for managed objects of `K`, returning its store
fn spawn_reflector<K>(api: Api<K>, mut observer: Option<CreationObserver>) -> Store<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
{
    let (reader, writer) = reflector::store();
    let config = watcher::Config::default().labels(MANAGED_BY_SELECTOR);
    let stream = reflector::reflector(writer, watcher(api, config)).default_backoff();

    tokio::spawn(async move {
        let mut stream = pin!(stream);
        while let Some(event) = stream.next().await {
            match event {
                Ok(event) => {
                    if let Some(observer) = observer.as_mut() {
                        observer.observe(&event);
                    }
                }
                Err(e) => warn!(kind = %K::kind(&()), "Watch error: {}", e),
            }
        }
        warn!(kind = %K::kind(&()), "Watch stream ended");
    });

    reader
}

/// Watch caches of every object kind the operator manages
pub struct ManagedStores {
    pub cluster_roles: Store<ClusterRole>,
    pub cluster_role_bindings: Store<ClusterRoleBinding>,
    pub roles: Store<Role>,
    pub role_bindings: Store<RoleBinding>,
    pub mutating_webhooks: Store<MutatingWebhookConfiguration>,
    pub validating_webhooks: Store<ValidatingWebhookConfiguration>,
    pub pod_disruption_budgets: Store<PodDisruptionBudget>,
}

impl ManagedStores {
    /// Start watching; RBAC watches also report backup creations to `expectations`
    pub fn start(client: &Client, expectations: Arc<Expectations>) -> Self {
        let observer =
            |kind: ObjectKind| Some(CreationObserver::new(kind, expectations.clone()));

        Self {
            cluster_roles: spawn_reflector(
                Api::all(client.clone()),
                observer(ObjectKind::ClusterRole),
            ),
            cluster_role_bindings: spawn_reflector(
                Api::all(client.clone()),
                observer(ObjectKind::ClusterRoleBinding),
            ),
            roles: spawn_reflector(Api::all(client.clone()), observer(ObjectKind::Role)),
            role_bindings: spawn_reflector(
                Api::all(client.clone()),
                observer(ObjectKind::RoleBinding),
            ),
            mutating_webhooks: spawn_reflector(Api::all(client.clone()), None),
            validating_webhooks: spawn_reflector(Api::all(client.clone()), None),
            pod_disruption_budgets: spawn_reflector(Api::all(client.clone()), None),
        }
    }

    /// Wait for the initial list of every watch
    pub async fn wait_until_ready(&self) -> Result<()> {
        let ready = |_| Error::KubeError("Watch cache closed before syncing".to_string());
        self.cluster_roles.wait_until_ready().await.map_err(ready)?;
        self.cluster_role_bindings.wait_until_ready().await.map_err(ready)?;
        self.roles.wait_until_ready().await.map_err(ready)?;
        self.role_bindings.wait_until_ready().await.map_err(ready)?;
        self.mutating_webhooks.wait_until_ready().await.map_err(ready)?;
        self.validating_webhooks.wait_until_ready().await.map_err(ready)?;
        self.pod_disruption_budgets.wait_until_ready().await.map_err(ready)?;
        info!("Watch caches synced");
        Ok(())
    }

    pub fn backup_caches(&self) -> BackupCaches<'_> {
        BackupCaches {
            cluster_roles: &self.cluster_roles,
            cluster_role_bindings: &self.cluster_role_bindings,
            roles: &self.roles,
            role_bindings: &self.role_bindings,
        }
    }

    /// Refresh `previous` with the generations of webhooks and PDBs owned by `owner`
    pub fn record_generations(
        &self,
        owner: &str,
        previous: &[GenerationStatus],
    ) -> Vec<GenerationStatus> {
        let mut generations = previous.to_vec();

        let drifted = [
            (
                ObjectKind::MutatingWebhookConfiguration,
                record_owned_generations::<MutatingWebhookConfiguration>(
                    &mut generations,
                    &self.mutating_webhooks,
                    owner,
                ),
            ),
            (
                ObjectKind::ValidatingWebhookConfiguration,
                record_owned_generations::<ValidatingWebhookConfiguration>(
                    &mut generations,
                    &self.validating_webhooks,
                    owner,
                ),
            ),
            (
                ObjectKind::PodDisruptionBudget,
                record_owned_generations::<PodDisruptionBudget>(
                    &mut generations,
                    &self.pod_disruption_budgets,
                    owner,
                ),
            ),
        ];

        for (kind, count) in drifted {
            if count > 0 {
                GENERATION_DRIFT
                    .with_label_values(&[kind.kind()])
                    .inc_by(count as f64);
            }
        }

        generations
    }
}
