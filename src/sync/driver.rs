//! Runs every registered tenant, once or on an interval.

use std::future::Future;

use tracing::{error, info, warn};

use super::tenant::{sync_tenant, TenantReport};
use crate::config::Config;
use crate::db::{self, Database};
use crate::discourse::PageSource;
use crate::error::SyncError;

/// Result of one tenant within a run.
#[derive(Debug)]
pub struct TenantRun {
    pub tenant_id: i64,
    pub tenant_name: String,
    pub outcome: Result<TenantReport, SyncError>,
}

/// Result of a whole run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub tenants: Vec<TenantRun>,
}

impl RunSummary {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.tenants.iter().filter(|t| t.outcome.is_ok()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.tenants.iter().filter(|t| t.outcome.is_err()).count()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Sync every registered tenant, one after another.
///
/// A failing tenant is logged and skipped; later tenants still run.
///
/// # Errors
///
/// Returns an error only if the tenant list itself cannot be loaded.
pub async fn run_once<S>(source: &S, db: &Database, config: &Config) -> Result<RunSummary, SyncError>
where
    S: PageSource + ?Sized,
{
    let tenants = db::find_tenants(db.pool()).await.map_err(SyncError::Storage)?;
    info!(tenants = tenants.len(), "Starting sync run");

    let mut summary = RunSummary::default();

    for tenant in tenants {
        let outcome = sync_tenant(source, db, config, &tenant).await;

        match &outcome {
            Ok(report) => info!(
                tenant = %report.tenant_name,
                pages = report.pages,
                created = report.counts.created,
                updated = report.counts.updated,
                final_cursor = report.final_cursor,
                "Tenant sync complete"
            ),
            Err(e) => {
                // Re-read so the log names the cursor the next run resumes from.
                let resume_cursor = match db::get_tenant(db.pool(), tenant.id).await {
                    Ok(Some(current)) => current.cursor,
                    Ok(None) => tenant.cursor,
                    Err(read_err) => {
                        warn!(tenant = %tenant.name, "Failed to re-read tenant cursor: {read_err:#}");
                        tenant.cursor
                    }
                };
                error!(
                    tenant = %tenant.name,
                    start_cursor = tenant.cursor,
                    resume_cursor,
                    remote = e.is_remote(),
                    error = %e,
                    "Tenant sync failed"
                );
            }
        }

        summary.tenants.push(TenantRun {
            tenant_id: tenant.id,
            tenant_name: tenant.name,
            outcome,
        });
    }

    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        "Sync run finished"
    );
    Ok(summary)
}

/// Invoke [`run_once`] every `config.sync_interval` until `shutdown` resolves.
///
/// `shutdown` is created once and kept across runs, so a request that
/// arrives while a run is in progress ends the loop as soon as that run
/// finishes. Runs never overlap. Returns the number of completed runs.
pub async fn watch<S, F>(source: &S, db: &Database, config: &Config, shutdown: F) -> u64
where
    S: PageSource + ?Sized,
    F: Future<Output = ()>,
{
    info!(interval_secs = config.sync_interval.as_secs(), "Starting sync trigger");

    tokio::pin!(shutdown);
    let mut runs = 0u64;

    loop {
        match run_once(source, db, config).await {
            Ok(summary) if !summary.is_success() => {
                warn!(failed = summary.failed(), "Sync run finished with failures");
            }
            Ok(_) => {}
            Err(e) => error!("Sync run error: {e}"),
        }
        runs += 1;

        tokio::select! {
            biased;
            () = &mut shutdown => {
                info!(runs, "Shutdown requested, stopping sync trigger");
                return runs;
            }
            () = tokio::time::sleep(config.sync_interval) => {}
        }
    }
}
