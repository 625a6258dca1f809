//! One-time reverse scan that mirrors a newly integrated forum from its
//! newest post downwards.
//!
//! The forward scan in [`super::tenant`] covers everything below the tenant's
//! cursor, so the backfill stops once it reaches that boundary. On completion
//! the cursor jumps forward to the newest mirrored post and steady-state runs
//! continue from there.

use tracing::info;

use super::cursor::{CursorPolicy, StopReason};
use super::ingest::ingest_page_new_only;
use super::tenant::validate_tenant;
use crate::config::Config;
use crate::db::{self, Database, Tenant};
use crate::discourse::{ForumEndpoint, PageSource};
use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    pub tenant_name: String,
    /// Boundary the scan started below.
    pub start_boundary: i64,
    pub pages: u64,
    pub inserted: u64,
    /// `None` when the forum has no posts at all.
    pub stop: Option<StopReason>,
    /// Tenant progress cursor after the backfill.
    pub cursor: i64,
}

/// Mirror a tenant's history from the newest post down to its cursor.
///
/// `before` overrides the starting boundary. Without it an interrupted
/// backfill resumes from its persisted boundary, and a fresh one starts just
/// above the newest post.
///
/// # Errors
///
/// Fetch, write and storage failures end the backfill; its persisted
/// boundary then points at the last fully written page.
pub async fn backfill_tenant<S>(
    source: &S,
    db: &Database,
    config: &Config,
    tenant: &Tenant,
    before: Option<i64>,
) -> Result<BackfillReport, SyncError>
where
    S: PageSource + ?Sized,
{
    validate_tenant(tenant)?;
    let endpoint = ForumEndpoint::from(tenant);

    let start = match before.or(tenant.backfill_cursor) {
        Some(start) => start,
        None => {
            let newest = source.fetch_page(&endpoint, None).await?;
            match newest.max_id() {
                Some(max_id) => max_id + 1,
                None => {
                    info!(tenant = %tenant.name, "Forum has no posts, nothing to backfill");
                    return Ok(BackfillReport {
                        tenant_name: tenant.name.clone(),
                        start_boundary: 0,
                        pages: 0,
                        inserted: 0,
                        stop: None,
                        cursor: tenant.cursor,
                    });
                }
            }
        }
    };

    let policy = CursorPolicy::reverse_scan(
        tenant.page_size,
        config.backfill_empty_streak_threshold,
        Some(tenant.cursor),
    );

    info!(
        tenant = %tenant.name,
        start,
        stored_boundary = tenant.cursor,
        "Starting backfill"
    );

    let mut cursor = start;
    let mut empty_streak = 0u32;
    let mut pages = 0u64;
    let mut inserted = 0u64;

    let stop = loop {
        let page = source.fetch_page(&endpoint, Some(cursor)).await?;

        let page_inserted = ingest_page_new_only(db, tenant.id, &page)
            .await
            .map_err(|source| SyncError::Ingestion {
                before: cursor,
                source,
            })?;

        let advance = policy.advance(cursor, &page, None, empty_streak);
        db::set_backfill_cursor(db.pool(), tenant.id, Some(advance.next_cursor))
            .await
            .map_err(SyncError::Storage)?;

        pages += 1;
        inserted += page_inserted;
        info!(
            tenant = %tenant.name,
            before = cursor,
            next_cursor = advance.next_cursor,
            fetched = page.len(),
            inserted = page_inserted,
            empty_streak = advance.empty_streak,
            "Backfilled page"
        );

        cursor = advance.next_cursor;
        empty_streak = advance.empty_streak;

        if let Some(stop) = advance.stop {
            break stop;
        }
    };

    db::set_backfill_cursor(db.pool(), tenant.id, None)
        .await
        .map_err(SyncError::Storage)?;

    // Everything up to the newest stored post is now mirrored.
    let newest_stored = db::max_post_id_for_tenant(db.pool(), tenant.id)
        .await
        .map_err(SyncError::Storage)?;
    let cursor_after = match newest_stored {
        Some(max_id) => db::raise_tenant_cursor(db.pool(), tenant.id, max_id + 1)
            .await
            .map_err(SyncError::Storage)?,
        None => tenant.cursor,
    };

    info!(
        tenant = %tenant.name,
        pages,
        inserted,
        ?stop,
        cursor = cursor_after,
        "Backfill complete"
    );

    Ok(BackfillReport {
        tenant_name: tenant.name.clone(),
        start_boundary: start,
        pages,
        inserted,
        stop: Some(stop),
        cursor: cursor_after,
    })
}
