//! Writing fetched pages into the mirror.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::db::{self, Database, NewStoredPost, UpsertOutcome};
use crate::discourse::{PostPage, RawPost};

/// Rows touched by one ingested page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestCounts {
    pub created: u64,
    pub updated: u64,
}

impl IngestCounts {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.created + self.updated
    }
}

impl std::ops::AddAssign for IngestCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.updated += rhs.updated;
    }
}

/// Upsert every post on the page by `(tenant_id, remote id)`.
///
/// The page is written in one transaction: either all of it lands or none
/// of it does.
///
/// # Errors
///
/// Returns an error if any post cannot be written.
pub async fn ingest_page(
    db: &Database,
    tenant_id: i64,
    page: &PostPage,
    refresh_body: bool,
) -> Result<IngestCounts> {
    let mut counts = IngestCounts::default();
    if page.is_empty() {
        return Ok(counts);
    }

    let mut tx = db.pool().begin().await.context("Failed to begin page transaction")?;

    for raw in &page.posts {
        let post = to_stored_post(raw);
        match db::upsert_post(&mut *tx, tenant_id, &post, refresh_body).await? {
            UpsertOutcome::Created => counts.created += 1,
            UpsertOutcome::Updated => counts.updated += 1,
        }
    }

    tx.commit().await.context("Failed to commit page transaction")?;

    debug!(
        tenant_id,
        created = counts.created,
        updated = counts.updated,
        "Ingested page"
    );
    Ok(counts)
}

/// Insert a page of posts expected to be new, ignoring ones already stored.
///
/// Returns the number of posts inserted.
///
/// # Errors
///
/// Returns an error if the batch cannot be written.
pub async fn ingest_page_new_only(db: &Database, tenant_id: i64, page: &PostPage) -> Result<u64> {
    if page.is_empty() {
        return Ok(0);
    }
    let posts: Vec<NewStoredPost> = page.posts.iter().map(to_stored_post).collect();
    let inserted = db::bulk_insert_skip_duplicates(db.pool(), tenant_id, &posts).await?;

    debug!(
        tenant_id,
        inserted,
        skipped = posts.len() as u64 - inserted,
        "Batch inserted page"
    );
    Ok(inserted)
}

/// Map an API post onto its stored form.
#[must_use]
pub fn to_stored_post(raw: &RawPost) -> NewStoredPost {
    NewStoredPost {
        discourse_id: raw.id,
        topic_discourse_id: raw.topic_id,
        author: raw.username.clone(),
        body: raw.raw.clone(),
        body_hash: compute_hash(&raw.raw),
        created_at: normalize_timestamp(&raw.created_at),
        views: raw.reads,
    }
}

/// Compute SHA256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalize to RFC 3339 UTC; unparseable values are kept verbatim.
fn normalize_timestamp(value: &str) -> String {
    DateTime::parse_from_rfc3339(value).map_or_else(
        |_| value.to_string(),
        |dt| dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}
