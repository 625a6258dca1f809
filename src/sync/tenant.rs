//! The per-tenant fetch, ingest, advance loop.

use tracing::{debug, info};

use super::cursor::{CursorPolicy, StopReason};
use super::ingest::{ingest_page, IngestCounts};
use crate::config::{validate_base_url, Config};
use crate::db::{self, Database, Tenant};
use crate::discourse::{ForumEndpoint, PageSource, PostPage};
use crate::error::SyncError;

/// Outcome of one completed tenant scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantReport {
    pub tenant_id: i64,
    pub tenant_name: String,
    pub start_cursor: i64,
    pub final_cursor: i64,
    pub pages: u64,
    pub counts: IngestCounts,
    pub stop: StopReason,
}

/// Check a tenant's stored settings before any request is made.
///
/// # Errors
///
/// Returns [`SyncError::Configuration`] describing the first problem found.
pub fn validate_tenant(tenant: &Tenant) -> Result<(), SyncError> {
    let fail = |message: String| SyncError::Configuration {
        tenant: tenant.name.clone(),
        message,
    };

    if tenant.api_key.trim().is_empty() {
        return Err(fail("API key is empty".to_string()));
    }
    if tenant.api_username.trim().is_empty() {
        return Err(fail("API username is empty".to_string()));
    }
    validate_base_url(&tenant.api_base_url).map_err(|e| fail(format!("invalid base URL: {e}")))?;
    if tenant.page_size < 1 {
        return Err(fail(format!("page size must be positive, got {}", tenant.page_size)));
    }
    if tenant.empty_streak_threshold < 1 || u32::try_from(tenant.empty_streak_threshold).is_err() {
        return Err(fail(format!(
            "empty streak threshold out of range: {}",
            tenant.empty_streak_threshold
        )));
    }
    Ok(())
}

/// Scan a tenant forward from its persisted cursor until the forum region is
/// exhausted.
///
/// Once a window comes back with its top end empty the newest page is fetched
/// once, so the cursor stops one window above the newest post instead of
/// running ahead of posts created before the next run.
///
/// The cursor is persisted after every page, once that page's posts are
/// committed, so an interrupted run resumes at most one page back.
///
/// # Errors
///
/// Fetch, ingestion and cursor-persistence failures end the scan. The stored
/// cursor then still points at the last fully ingested page.
pub async fn sync_tenant<S>(
    source: &S,
    db: &Database,
    config: &Config,
    tenant: &Tenant,
) -> Result<TenantReport, SyncError>
where
    S: PageSource + ?Sized,
{
    validate_tenant(tenant)?;

    let endpoint = ForumEndpoint::from(tenant);
    let threshold = u32::try_from(tenant.empty_streak_threshold).unwrap_or(u32::MAX);
    let mut policy = CursorPolicy::additive(tenant.page_size, threshold);
    let mut head_checked = false;

    info!(tenant = %tenant.name, cursor = tenant.cursor, "Syncing tenant");

    let mut cursor = tenant.cursor;
    let mut empty_streak = 0u32;
    let mut previous: Option<PostPage> = None;
    let mut pages = 0u64;
    let mut totals = IngestCounts::default();

    loop {
        let page = source.fetch_page(&endpoint, Some(cursor)).await?;

        let counts = ingest_page(db, tenant.id, &page, config.refresh_body_on_rescan)
            .await
            .map_err(|source| SyncError::Ingestion {
                before: cursor,
                source,
            })?;

        if !head_checked && policy.needs_forum_head(cursor, &page) {
            let latest = source.fetch_page(&endpoint, None).await?;
            policy.forum_head = latest.max_id();
            head_checked = true;
            debug!(tenant = %tenant.name, forum_head = ?policy.forum_head, "Looked up newest post");
        }

        let advance = policy.advance(cursor, &page, previous.as_ref(), empty_streak);

        // Persist even when nothing was created so an empty window is not
        // rescanned forever.
        db::update_tenant_cursor(db.pool(), tenant.id, advance.next_cursor)
            .await
            .map_err(SyncError::Storage)?;

        pages += 1;
        totals += counts;
        info!(
            tenant = %tenant.name,
            before = cursor,
            next_cursor = advance.next_cursor,
            fetched = page.len(),
            min_id = ?page.min_id(),
            max_id = ?page.max_id(),
            created = counts.created,
            updated = counts.updated,
            empty_streak = advance.empty_streak,
            "Processed page"
        );

        cursor = advance.next_cursor;
        empty_streak = advance.empty_streak;
        previous = Some(page);

        if let Some(stop) = advance.stop {
            debug!(tenant = %tenant.name, ?stop, "Scan finished");
            return Ok(TenantReport {
                tenant_id: tenant.id,
                tenant_name: tenant.name.clone(),
                start_cursor: tenant.cursor,
                final_cursor: cursor,
                pages,
                counts: totals,
                stop,
            });
        }
    }
}
