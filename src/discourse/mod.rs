//! Discourse `/posts.json` access.
//!
//! [`PageSource`] is the seam the sync engine fetches through;
//! [`DiscourseClient`] is the HTTP implementation with retry and backoff.

mod client;
mod models;
mod retry;

pub use client::DiscourseClient;
pub use models::{LatestPostsResponse, PostPage, RawPost};
pub use retry::RetryPolicy;

use async_trait::async_trait;

use crate::db::Tenant;
use crate::error::SyncError;

/// Where and as whom to fetch a tenant's posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub api_username: String,
}

impl From<&Tenant> for ForumEndpoint {
    fn from(tenant: &Tenant) -> Self {
        Self {
            base_url: tenant.api_base_url.clone(),
            api_key: tenant.api_key.clone(),
            api_username: tenant.api_username.clone(),
        }
    }
}

/// Source of post pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page of posts strictly older than `before`, or the most
    /// recent page when `before` is `None`.
    ///
    /// An empty page is a valid result.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::FetchExhausted`] once the retry budget is spent.
    async fn fetch_page(
        &self,
        endpoint: &ForumEndpoint,
        before: Option<i64>,
    ) -> Result<PostPage, SyncError>;
}
