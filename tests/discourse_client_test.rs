//! Integration tests for the Discourse posts client.

use std::time::Duration;

use discourse_post_mirror::discourse::{DiscourseClient, ForumEndpoint, PageSource, RetryPolicy};
use discourse_post_mirror::error::{SyncError, TransientFetchError};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn endpoint(server: &MockServer) -> ForumEndpoint {
    ForumEndpoint {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        api_username: "system".to_string(),
    }
}

/// Client that retries without meaningful sleeps.
fn fast_client(max_attempts: u32) -> DiscourseClient {
    DiscourseClient::new(
        Duration::from_secs(10),
        RetryPolicy {
            max_attempts,
            unit: Duration::from_millis(1),
        },
    )
    .unwrap()
}

fn posts_body(ids: impl IntoIterator<Item = i64>) -> serde_json::Value {
    let posts: Vec<serde_json::Value> = ids
        .into_iter()
        .map(|id| {
            json!({
                "id": id,
                "topic_id": 1201,
                "username": "marc",
                "raw": format!("post {id}"),
                "cooked": format!("<p>post {id}</p>"),
                "created_at": "2024-03-01T12:00:00.000Z",
                "reads": 5,
                "post_number": 1
            })
        })
        .collect();
    json!({ "latest_posts": posts })
}

#[tokio::test]
async fn test_fetch_sends_credentials_and_cursor() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .and(query_param("before", "36300"))
        .and(header("User-Api-Key", "test-key"))
        .and(header("Api-Username", "system"))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts_body((36270..36300).rev())))
        .expect(1)
        .mount(&mock_server)
        .await;

    let page = fast_client(8)
        .fetch_page(&endpoint(&mock_server), Some(36300))
        .await
        .expect("fetch failed");

    assert_eq!(page.len(), 30);
    assert_eq!(page.max_id(), Some(36299));
    assert_eq!(page.min_id(), Some(36270));
    assert_eq!(page.posts[0].raw, "post 36299");
}

#[tokio::test]
async fn test_fetch_latest_omits_cursor() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .and(query_param_is_missing("before"))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts_body([40000, 39999])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let page = fast_client(8)
        .fetch_page(&endpoint(&mock_server), None)
        .await
        .expect("fetch failed");

    assert_eq!(page.max_id(), Some(40000));
}

#[tokio::test]
async fn test_empty_page_is_not_an_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "latest_posts": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let page = fast_client(8)
        .fetch_page(&endpoint(&mock_server), Some(10))
        .await
        .expect("fetch failed");

    assert!(page.is_empty());
}

#[tokio::test]
async fn test_retries_transient_failures() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts_body([5, 4, 3])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let page = fast_client(8)
        .fetch_page(&endpoint(&mock_server), Some(6))
        .await
        .expect("fetch should succeed on third attempt");

    assert_eq!(page.len(), 3);
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .respond_with(ResponseTemplate::new(503))
        // Exactly eight attempts, never a ninth
        .expect(8)
        .mount(&mock_server)
        .await;

    let err = fast_client(8)
        .fetch_page(&endpoint(&mock_server), Some(36300))
        .await
        .expect_err("fetch should be exhausted");

    match err {
        SyncError::FetchExhausted {
            attempts,
            before,
            last,
        } => {
            assert_eq!(attempts, 8);
            assert_eq!(before, Some(36300));
            assert!(matches!(last, TransientFetchError::Status { status: 503 }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_undecodable_body_is_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let err = fast_client(2)
        .fetch_page(&endpoint(&mock_server), Some(1))
        .await
        .expect_err("fetch should be exhausted");

    assert!(matches!(
        err,
        SyncError::FetchExhausted {
            attempts: 2,
            last: TransientFetchError::Decode(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_transport_error_is_retried() {
    // Nothing listens on port 1, so every connect is refused
    let endpoint = ForumEndpoint {
        base_url: "http://127.0.0.1:1".to_string(),
        api_key: "k".to_string(),
        api_username: "u".to_string(),
    };

    let err = fast_client(3)
        .fetch_page(&endpoint, Some(1))
        .await
        .expect_err("fetch should be exhausted");

    assert!(matches!(
        err,
        SyncError::FetchExhausted {
            attempts: 3,
            last: TransientFetchError::Transport(_),
            ..
        }
    ));
}
