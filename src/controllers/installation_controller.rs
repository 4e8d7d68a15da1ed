//! Controller for Installation resources

use futures::StreamExt;
use kube::{
    runtime::{
        controller::{Action, Controller},
        finalizer::{finalizer, Event},
        watcher::Config,
    },
    Api, ResourceExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use crate::controllers::Context;
use crate::crd::Installation;
use crate::metrics::prometheus::{
    DEFERRED_RECONCILES, RECONCILE_DURATION, RECONCILIATIONS, RECONCILIATION_ERRORS,
};
use crate::reconcilers::installation::{self, owner_key, OperatorState, PassOutcome};
use crate::reconcilers::rbac_backup::run_backup_pass;
use crate::Error;

/// Finalizer name for cleanup
pub const FINALIZER: &str = "install.oso.sh/installation-finalizer";

/// Delay before retrying an owner whose earlier creations are not yet cache-visible
const EXPECTATIONS_REQUEUE: Duration = Duration::from_secs(5);

/// Run the installation controller; the managed-object caches must already be synced
pub async fn run(ctx: Arc<Context>) {
    let client = ctx.client.clone();
    let installations: Api<Installation> = match ctx.config.watch_namespace.as_deref() {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };

    info!("Starting Installation controller");

    Controller::new(installations, Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok(o) => info!("Reconciled {:?}", o),
                Err(e) => error!("Reconcile failed: {:?}", e),
            }
        })
        .await;

    info!("Installation controller stopped");
}

/// Reconcile an Installation resource
#[instrument(skip(installation, ctx), fields(name = %installation.name_any(), namespace = installation.namespace().unwrap_or_default()))]
async fn reconcile(installation: Arc<Installation>, ctx: Arc<Context>) -> Result<Action, Error> {
    let start = std::time::Instant::now();
    let ns = installation.namespace().unwrap_or_default();
    let name = installation.name_any();

    RECONCILIATIONS.with_label_values(&["Installation"]).inc();

    let installations: Api<Installation> = Api::namespaced(ctx.client.clone(), &ns);

    let result = finalizer(&installations, FINALIZER, installation, |event| async {
        match event {
            Event::Apply(installation) => apply(&installation, &ctx).await,
            Event::Cleanup(installation) => cleanup(&installation, &ctx).await,
        }
    })
    .await;

    let duration = start.elapsed().as_secs_f64();
    RECONCILE_DURATION
        .with_label_values(&["Installation"])
        .observe(duration);

    match &result {
        Ok(_) => info!("Successfully reconciled {}/{} in {:.2}s", ns, name, duration),
        Err(e) => {
            RECONCILIATION_ERRORS
                .with_label_values(&["Installation"])
                .inc();
            error!("Failed to reconcile {}/{}: {:?}", ns, name, e);
        }
    }

    Ok(result?)
}

/// Apply changes for an Installation
async fn apply(installation: &Installation, ctx: &Context) -> Result<Action, Error> {
    let ns = installation.namespace().unwrap_or_default();
    let key = owner_key(installation);
    let previous = installation
        .status
        .as_ref()
        .map(|s| s.generations.clone())
        .unwrap_or_default();

    if installation.spec.suspend {
        info!("Installation {} is suspended", key);
        let outcome = PassOutcome {
            phase: "Suspended",
            backups_created: 0,
            generations: previous,
        };
        installation::update_status(installation, &ctx.client, &ns, &outcome).await?;
        return Ok(Action::await_change());
    }

    // Earlier creations must be cache-visible before deciding again
    if !ctx.expectations.all_satisfied(&key) {
        DEFERRED_RECONCILES
            .with_label_values(&["Installation"])
            .inc();
        debug!("Expectations for {} not yet satisfied, deferring", key);
        return Ok(Action::requeue(EXPECTATIONS_REQUEUE));
    }

    let state = OperatorState::from_installation(installation)?;
    info!("Applying Installation {} towards {}", key, state.target);

    let summary = run_backup_pass(
        &state,
        ctx.stores.backup_caches(),
        &ctx.expectations,
        &ctx.client,
    )
    .await?;

    let outcome = PassOutcome {
        phase: if summary.total() > 0 {
            "BackingUp"
        } else {
            "Reconciled"
        },
        backups_created: summary.total(),
        generations: ctx.stores.record_generations(&key, &previous),
    };

    installation::update_status(installation, &ctx.client, &ns, &outcome).await?;

    if summary.total() > 0 {
        // Come back once the new backups are observed
        Ok(Action::requeue(EXPECTATIONS_REQUEUE))
    } else {
        Ok(Action::requeue(Duration::from_secs(60)))
    }
}

/// Cleanup when an Installation is deleted
async fn cleanup(installation: &Installation, ctx: &Context) -> Result<Action, Error> {
    let key = owner_key(installation);

    info!("Cleaning up Installation {}", key);

    // Managed objects and their backups are left for the next release to adopt
    ctx.expectations.delete_expectations(&key);

    Ok(Action::await_change())
}

/// Error policy for the controller
fn error_policy(installation: Arc<Installation>, err: &Error, _ctx: Arc<Context>) -> Action {
    let ns = installation.namespace().unwrap_or_default();
    let name = installation.name_any();

    error!("Reconciliation error for {}/{}: {:?}", ns, name, err);

    match err {
        Error::KubeError(_) => Action::requeue(Duration::from_secs(30)),
        Error::BackupError(_) => Action::requeue(Duration::from_secs(15)),
        Error::ConfigError(_) | Error::ValidationError(_) => {
            Action::requeue(Duration::from_secs(300))
        }
        _ => Action::requeue(Duration::from_secs(60)),
    }
}
