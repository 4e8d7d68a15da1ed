//! Controller implementations for watching and reconciling resources

pub mod cache;
pub mod installation_controller;

use kube::Client;
use std::sync::Arc;

use crate::config::OperatorConfig;
use crate::controllers::cache::ManagedStores;
use crate::reconcilers::expectations::Expectations;

/// Shared context for controllers
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Operator configuration
    pub config: OperatorConfig,
    /// Pending creations per (kind, Installation)
    pub expectations: Arc<Expectations>,
    /// Watch caches of managed objects
    pub stores: ManagedStores,
}

impl Context {
    /// Create a new context and start the managed-object watches
    pub fn new(client: Client, config: OperatorConfig) -> Arc<Self> {
        let expectations = Arc::new(Expectations::new());
        let stores = ManagedStores::start(&client, expectations.clone());
        Arc::new(Self {
            client,
            config,
            expectations,
            stores,
        })
    }
}
