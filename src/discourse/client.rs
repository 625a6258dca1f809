use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::models::{LatestPostsResponse, PostPage};
use super::retry::RetryPolicy;
use super::{ForumEndpoint, PageSource};
use crate::config::Config;
use crate::constants::{API_KEY_HEADER, API_USERNAME_HEADER, MIRROR_USER_AGENT};
use crate::error::{SyncError, TransientFetchError};

/// HTTP client for the Discourse `/posts.json` endpoint.
#[derive(Debug, Clone)]
pub struct DiscourseClient {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl DiscourseClient {
    /// Create a client with the given request timeout and retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(MIRROR_USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, retry })
    }

    /// Create a client from application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.request_timeout, RetryPolicy::from_config(config))
    }

    /// Make a single request, without retrying.
    async fn fetch_once(
        &self,
        endpoint: &ForumEndpoint,
        before: Option<i64>,
    ) -> Result<PostPage, TransientFetchError> {
        let mut request = self
            .client
            .get(posts_url(&endpoint.base_url))
            .header(API_KEY_HEADER, &endpoint.api_key)
            .header(API_USERNAME_HEADER, &endpoint.api_username);
        if let Some(before) = before {
            request = request.query(&[("before", before)]);
        }

        let response = request.send().await.map_err(TransientFetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransientFetchError::Status {
                status: status.as_u16(),
            });
        }

        let body: LatestPostsResponse = response.json().await.map_err(TransientFetchError::Decode)?;
        Ok(PostPage::from(body))
    }
}

#[async_trait]
impl PageSource for DiscourseClient {
    async fn fetch_page(
        &self,
        endpoint: &ForumEndpoint,
        before: Option<i64>,
    ) -> Result<PostPage, SyncError> {
        let mut failed_attempts = 0u32;

        loop {
            match self.fetch_once(endpoint, before).await {
                Ok(page) => {
                    debug!(
                        before = ?before,
                        count = page.len(),
                        min_id = ?page.min_id(),
                        max_id = ?page.max_id(),
                        "Fetched posts"
                    );
                    return Ok(page);
                }
                Err(e) => {
                    failed_attempts += 1;
                    warn!(
                        base_url = %endpoint.base_url,
                        before = ?before,
                        attempt = failed_attempts,
                        max_attempts = self.retry.max_attempts,
                        error = %e,
                        "Error fetching posts"
                    );

                    let Some(delay) = self.retry.delay_after(failed_attempts) else {
                        return Err(SyncError::FetchExhausted {
                            attempts: failed_attempts,
                            before,
                            last: e,
                        });
                    };

                    info!(delay_ms = delay.as_millis(), "Retrying posts fetch");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Build the `/posts.json` URL, tolerating a trailing slash on the base.
fn posts_url(base_url: &str) -> String {
    format!("{}/posts.json", base_url.trim_end_matches('/'))
}
