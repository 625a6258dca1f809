use serde::{Deserialize, Serialize};

/// A registered forum integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    pub api_base_url: String,
    pub api_key: String,
    pub api_username: String,
    /// The next scan starts with the window of posts below this value.
    pub cursor: i64,
    pub page_size: i64,
    pub empty_streak_threshold: i64,
    /// Boundary of an unfinished backfill scan, if one was interrupted.
    pub backfill_cursor: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// A mirrored forum post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredPost {
    pub id: i64,
    pub tenant_id: i64,
    pub discourse_id: i64,
    pub topic_discourse_id: i64,
    pub author: String,
    pub body: String,
    pub body_hash: String,
    pub created_at: String,
    pub views: i64,
    pub first_seen_at: String,
    pub last_synced_at: String,
}

/// Data for inserting a new tenant.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub api_base_url: String,
    pub api_key: String,
    pub api_username: String,
    pub cursor: i64,
    pub page_size: i64,
    pub empty_streak_threshold: i64,
}

/// Data for writing a post, keyed by `(tenant_id, discourse_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStoredPost {
    pub discourse_id: i64,
    pub topic_discourse_id: i64,
    pub author: String,
    pub body: String,
    pub body_hash: String,
    pub created_at: String,
    pub views: i64,
}

/// Which branch an upsert took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}
