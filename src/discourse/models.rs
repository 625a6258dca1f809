use serde::{Deserialize, Serialize};

/// Response body of `GET /posts.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestPostsResponse {
    pub latest_posts: Vec<RawPost>,
}

/// One post as returned by the Discourse API.
///
/// Discourse sends many more fields; only the ones mirrored are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPost {
    pub id: i64,
    pub topic_id: i64,
    pub username: String,
    #[serde(default)]
    pub raw: String,
    pub created_at: String,
    #[serde(default)]
    pub reads: i64,
}

/// One bounded batch of posts from a single fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostPage {
    pub posts: Vec<RawPost>,
}

impl PostPage {
    #[must_use]
    pub fn new(posts: Vec<RawPost>) -> Self {
        Self { posts }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    /// Smallest remote id on the page.
    #[must_use]
    pub fn min_id(&self) -> Option<i64> {
        self.posts.iter().map(|p| p.id).min()
    }

    /// Largest remote id on the page.
    #[must_use]
    pub fn max_id(&self) -> Option<i64> {
        self.posts.iter().map(|p| p.id).max()
    }
}

impl From<LatestPostsResponse> for PostPage {
    fn from(response: LatestPostsResponse) -> Self {
        Self::new(response.latest_posts)
    }
}
