//! Read-only views over watch caches

use kube::runtime::reflector::Store;
use kube::Resource;
use std::sync::Arc;

/// Snapshot access to a locally replicated set of objects.
///
/// Reconcile code only ever lists; it never mutates what it gets back.
pub trait CacheStore<K>: Send + Sync {
    fn list(&self) -> Vec<Arc<K>>;
}

impl<K> CacheStore<K> for Store<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn list(&self) -> Vec<Arc<K>> {
        self.state()
    }
}

/// Fixture caches
impl<K> CacheStore<K> for Vec<K>
where
    K: Clone + Send + Sync,
{
    fn list(&self) -> Vec<Arc<K>> {
        self.iter().cloned().map(Arc::new).collect()
    }
}
