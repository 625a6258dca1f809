use anyhow::{Context, Result};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};

use super::models::{NewStoredPost, NewTenant, StoredPost, Tenant, UpsertOutcome};

// ========== Tenants ==========

/// Get all registered tenants in registration order.
pub async fn find_tenants(pool: &SqlitePool) -> Result<Vec<Tenant>> {
    sqlx::query_as("SELECT * FROM tenants ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to fetch tenants")
}

/// Get a tenant by its row id.
pub async fn get_tenant(pool: &SqlitePool, id: i64) -> Result<Option<Tenant>> {
    sqlx::query_as("SELECT * FROM tenants WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch tenant")
}

/// Get a tenant by its unique name.
pub async fn get_tenant_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Tenant>> {
    sqlx::query_as("SELECT * FROM tenants WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch tenant by name")
}

/// Insert a new tenant, returning its ID.
pub async fn insert_tenant(pool: &SqlitePool, tenant: &NewTenant) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO tenants (name, api_base_url, api_key, api_username, cursor, page_size, empty_streak_threshold)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(&tenant.name)
    .bind(&tenant.api_base_url)
    .bind(&tenant.api_key)
    .bind(&tenant.api_username)
    .bind(tenant.cursor)
    .bind(tenant.page_size)
    .bind(tenant.empty_streak_threshold)
    .execute(pool)
    .await
    .context("Failed to insert tenant")?;

    Ok(result.last_insert_rowid())
}

/// Persist a tenant's progress cursor.
pub async fn update_tenant_cursor(pool: &SqlitePool, tenant_id: i64, cursor: i64) -> Result<()> {
    sqlx::query("UPDATE tenants SET cursor = ?, updated_at = datetime('now') WHERE id = ?")
        .bind(cursor)
        .bind(tenant_id)
        .execute(pool)
        .await
        .context("Failed to update tenant cursor")?;

    Ok(())
}

/// Move a tenant's progress cursor up to `cursor`, never down.
///
/// Returns the cursor value stored afterwards.
pub async fn raise_tenant_cursor(pool: &SqlitePool, tenant_id: i64, cursor: i64) -> Result<i64> {
    let (stored,): (i64,) = sqlx::query_as(
        r"
        UPDATE tenants
        SET cursor = MAX(cursor, ?), updated_at = datetime('now')
        WHERE id = ?
        RETURNING cursor
        ",
    )
    .bind(cursor)
    .bind(tenant_id)
    .fetch_one(pool)
    .await
    .context("Failed to raise tenant cursor")?;

    Ok(stored)
}

/// Persist (or clear) the boundary of an in-progress backfill scan.
pub async fn set_backfill_cursor(
    pool: &SqlitePool,
    tenant_id: i64,
    cursor: Option<i64>,
) -> Result<()> {
    sqlx::query("UPDATE tenants SET backfill_cursor = ?, updated_at = datetime('now') WHERE id = ?")
        .bind(cursor)
        .bind(tenant_id)
        .execute(pool)
        .await
        .context("Failed to update backfill cursor")?;

    Ok(())
}

// ========== Posts ==========

/// Get a stored post by its natural key.
pub async fn get_stored_post<'e, E>(
    executor: E,
    tenant_id: i64,
    discourse_id: i64,
) -> Result<Option<StoredPost>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM posts WHERE tenant_id = ? AND discourse_id = ?")
        .bind(tenant_id)
        .bind(discourse_id)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch stored post")
}

/// Create the post if absent, otherwise refresh its volatile fields.
///
/// Identity fields (ids, author, `created_at`) are never rewritten. The body
/// is rewritten only when `refresh_body` is set and its hash changed.
pub async fn upsert_post(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    post: &NewStoredPost,
    refresh_body: bool,
) -> Result<UpsertOutcome> {
    let existing = get_stored_post(&mut *conn, tenant_id, post.discourse_id).await?;

    let Some(existing) = existing else {
        sqlx::query(
            r"
            INSERT INTO posts (tenant_id, discourse_id, topic_discourse_id, author, body, body_hash, created_at, views)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(tenant_id)
        .bind(post.discourse_id)
        .bind(post.topic_discourse_id)
        .bind(&post.author)
        .bind(&post.body)
        .bind(&post.body_hash)
        .bind(&post.created_at)
        .bind(post.views)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to insert post {}", post.discourse_id))?;

        return Ok(UpsertOutcome::Created);
    };

    if refresh_body && existing.body_hash != post.body_hash {
        sqlx::query(
            r"
            UPDATE posts
            SET views = ?, body = ?, body_hash = ?, last_synced_at = datetime('now')
            WHERE id = ?
            ",
        )
        .bind(post.views)
        .bind(&post.body)
        .bind(&post.body_hash)
        .bind(existing.id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to update post {}", post.discourse_id))?;
    } else {
        sqlx::query("UPDATE posts SET views = ?, last_synced_at = datetime('now') WHERE id = ?")
            .bind(post.views)
            .bind(existing.id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to update post {}", post.discourse_id))?;
    }

    Ok(UpsertOutcome::Updated)
}

/// Insert posts that are expected to be new, skipping any that already exist.
///
/// Returns the number of rows actually inserted.
pub async fn bulk_insert_skip_duplicates(
    pool: &SqlitePool,
    tenant_id: i64,
    posts: &[NewStoredPost],
) -> Result<u64> {
    let mut tx = pool.begin().await.context("Failed to begin bulk insert")?;
    let mut inserted = 0;

    for post in posts {
        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO posts (tenant_id, discourse_id, topic_discourse_id, author, body, body_hash, created_at, views)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(tenant_id)
        .bind(post.discourse_id)
        .bind(post.topic_discourse_id)
        .bind(&post.author)
        .bind(&post.body)
        .bind(&post.body_hash)
        .bind(&post.created_at)
        .bind(post.views)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to bulk insert post {}", post.discourse_id))?;

        inserted += result.rows_affected();
    }

    tx.commit().await.context("Failed to commit bulk insert")?;
    Ok(inserted)
}

/// Count stored posts for a tenant.
pub async fn count_posts_for_tenant(pool: &SqlitePool, tenant_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    Ok(count)
}

/// Get the remote ids of all stored posts for a tenant, ascending.
pub async fn get_post_ids_for_tenant(pool: &SqlitePool, tenant_id: i64) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT discourse_id FROM posts WHERE tenant_id = ? ORDER BY discourse_id")
            .bind(tenant_id)
            .fetch_all(pool)
            .await
            .context("Failed to fetch post ids")?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Get the highest stored remote id for a tenant.
pub async fn max_post_id_for_tenant(pool: &SqlitePool, tenant_id: i64) -> Result<Option<i64>> {
    let (max,): (Option<i64>,) =
        sqlx::query_as("SELECT MAX(discourse_id) FROM posts WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(pool)
            .await
            .context("Failed to fetch max post id")?;

    Ok(max)
}
