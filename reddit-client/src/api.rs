use alphabot_core::{CoreError, RedditApiError};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

/// The comment Reddit hands back after a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditCommentData {
    pub id: String,
    pub parent_id: String,
    pub link_id: String,
    pub subreddit: String,
    pub body: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub created_utc: f64,
}

#[derive(Debug, Deserialize)]
struct CommentSubmitResponse {
    json: CommentSubmitJson,
}

#[derive(Debug, Deserialize)]
struct CommentSubmitJson {
    #[serde(default)]
    errors: Vec<Vec<serde_json::Value>>,
    data: Option<CommentSubmitData>,
}

#[derive(Debug, Deserialize)]
struct CommentSubmitData {
    things: Vec<RedditListingChild<RedditCommentData>>,
}

/// Maps a non-success HTTP status onto the error taxonomy.
pub fn error_for_status(
    status: StatusCode,
    retry_after: Option<&str>,
    endpoint: &str,
) -> CoreError {
    match status.as_u16() {
        429 => {
            let retry_after = retry_after
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(60);
            warn!("Rate limited, retry after {} seconds", retry_after);
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after })
        }
        401 => CoreError::RedditApi(RedditApiError::InvalidToken),
        403 => CoreError::RedditApi(RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        }),
        404 => CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: format!("Resource not found: {}", endpoint),
        }),
        code if status.is_server_error() => {
            CoreError::RedditApi(RedditApiError::ServerError { status_code: code })
        }
        code => CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: format!("Unexpected status {} from {}", code, endpoint),
        }),
    }
}

/// Turns a transport failure into a `CoreError`.
pub fn error_for_transport(error: reqwest::Error) -> CoreError {
    if error.is_timeout() {
        CoreError::RedditApi(RedditApiError::RequestTimeout)
    } else {
        CoreError::Network(error)
    }
}

/// Sends the request and rejects non-success responses.
pub async fn send_checked(
    request_builder: reqwest::RequestBuilder,
    method: &Method,
    endpoint: &str,
) -> Result<Response, CoreError> {
    let response = request_builder.send().await.map_err(|e| {
        error!("Network error for {} {}: {}", method, endpoint, e);
        error_for_transport(e)
    })?;

    if response.status().is_success() {
        debug!("Request successful: {} {}", response.status(), endpoint);
        return Ok(response);
    }

    error!(
        "Request failed with status: {} for {}",
        response.status(),
        endpoint
    );
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok());
    Err(error_for_status(response.status(), retry_after, endpoint))
}

/// Reads Reddit's "try again in N minutes" style rate-limit message.
pub fn parse_ratelimit_delay(message: &str) -> Option<u64> {
    let words: Vec<&str> = message.split_whitespace().collect();
    words.windows(2).find_map(|pair| {
        let amount = pair[0].parse::<u64>().ok()?;
        let unit = pair[1].trim_end_matches(|c: char| !c.is_alphabetic());
        match unit {
            "second" | "seconds" => Some(amount),
            "minute" | "minutes" => Some(amount * 60),
            _ => None,
        }
    })
}

fn rejection_error(errors: &[Vec<serde_json::Value>], parent_fullname: &str) -> Option<CoreError> {
    let first = errors.first()?;
    let code = first.first().and_then(|v| v.as_str()).unwrap_or("UNKNOWN");
    let message = first.get(1).and_then(|v| v.as_str()).unwrap_or_default();

    if code == "RATELIMIT" {
        let retry_after = parse_ratelimit_delay(message).unwrap_or(60);
        return Some(CoreError::RedditApi(RedditApiError::RateLimitExceeded {
            retry_after,
        }));
    }

    if code == "DELETED_COMMENT" {
        return Some(CoreError::RedditApi(RedditApiError::CommentNotFound {
            comment_id: parent_fullname.to_string(),
        }));
    }

    Some(CoreError::RedditApi(RedditApiError::ReplyRejected {
        reason: format!("{}: {}", code, message),
    }))
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    user_agent: String,
    base_url: String,
}

impl RedditApiClient {
    pub fn new(user_agent: String) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            user_agent,
            base_url: REDDIT_API_BASE.to_string(),
        })
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        form: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token)
            .header("User-Agent", &self.user_agent);

        if let Some(fields) = form {
            request_builder = request_builder.form(fields);
        }

        info!("Making Reddit API request: {} {}", method, endpoint);
        send_checked(request_builder, &method, endpoint).await
    }

    /// Posts `text` as a reply to the thing named by `parent_fullname`.
    pub async fn submit_comment(
        &self,
        access_token: &str,
        parent_fullname: &str,
        text: &str,
    ) -> Result<RedditCommentData, CoreError> {
        let form = [("api_type", "json"), ("thing_id", parent_fullname), ("text", text)];
        let response = self
            .make_request(Method::POST, "/api/comment", access_token, Some(&form))
            .await?;

        let submitted: CommentSubmitResponse = response.json().await.map_err(|e| {
            error!("Failed to parse comment submission: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse reply to {}", parent_fullname),
            })
        })?;

        parse_submitted_comment(submitted, parent_fullname)
    }
}

fn parse_submitted_comment(
    submitted: CommentSubmitResponse,
    parent_fullname: &str,
) -> Result<RedditCommentData, CoreError> {
    if let Some(error) = rejection_error(&submitted.json.errors, parent_fullname) {
        return Err(error);
    }

    submitted
        .json
        .data
        .and_then(|data| data.things.into_iter().next())
        .map(|thing| thing.data)
        .ok_or_else(|| {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Reply to {} returned no comment", parent_fullname),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_client_creation() {
        assert!(RedditApiClient::new("test-user-agent/1.0".to_string()).is_ok());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, Some("12"), "/api/comment"),
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 12 })
        ));
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, None, "/api/comment"),
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 })
        ));
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, None, "/api/comment"),
            CoreError::RedditApi(RedditApiError::InvalidToken)
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, None, "/api/comment"),
            CoreError::RedditApi(RedditApiError::ServerError { status_code: 502 })
        ));
    }

    #[test]
    fn test_parse_ratelimit_delay() {
        assert_eq!(
            parse_ratelimit_delay("you are doing that too much. try again in 5 minutes."),
            Some(300)
        );
        assert_eq!(
            parse_ratelimit_delay("Take a break for 30 seconds before trying again."),
            Some(30)
        );
        assert_eq!(parse_ratelimit_delay("try again later"), None);
    }

    #[test]
    fn test_parse_submitted_comment() {
        let raw = r#"{"json": {"errors": [], "data": {"things": [{"kind": "t1", "data": {
            "id": "k2abc", "parent_id": "t1_k1xyz", "link_id": "t3_17qqq",
            "subreddit": "rust", "body": "Congratulations!", "author": "alphabotical",
            "permalink": "/r/rust/comments/17qqq/_/k2abc/", "created_utc": 1700000000.0
        }}]}}}"#;
        let submitted: CommentSubmitResponse = serde_json::from_str(raw).unwrap();
        let comment = parse_submitted_comment(submitted, "t1_k1xyz").unwrap();
        assert_eq!(comment.id, "k2abc");
        assert_eq!(comment.parent_id, "t1_k1xyz");
        assert_eq!(comment.link_id, "t3_17qqq");
    }

    #[test]
    fn test_rejected_submission() {
        let raw = r#"{"json": {"errors": [["RATELIMIT", "you are doing that too much. try again in 2 minutes.", "ratelimit"]]}}"#;
        let submitted: CommentSubmitResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            parse_submitted_comment(submitted, "t1_k1xyz"),
            Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 120 }))
        ));

        let raw = r#"{"json": {"errors": [["DELETED_COMMENT", "that comment has been deleted", "parent"]]}}"#;
        let submitted: CommentSubmitResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            parse_submitted_comment(submitted, "t1_k1xyz"),
            Err(CoreError::RedditApi(RedditApiError::CommentNotFound { .. }))
        ));

        let raw = r#"{"json": {"errors": [["THREAD_LOCKED", "that thread is locked", "parent"]]}}"#;
        let submitted: CommentSubmitResponse = serde_json::from_str(raw).unwrap();
        match parse_submitted_comment(submitted, "t1_k1xyz") {
            Err(CoreError::RedditApi(RedditApiError::ReplyRejected { reason })) => {
                assert_eq!(reason, "THREAD_LOCKED: that thread is locked")
            }
            other => panic!("Expected ReplyRejected, got {:?}", other),
        }
    }
}
