use crate::RedditToken;
use replybot_core::{CoreError, PostedComment, RedditApiError};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const REDDIT_WEB_BASE: &str = "https://reddit.com";

#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: String,
    pub error: Option<String>,
}

impl AccessTokenResponse {
    /// Reddit answers a rejected password grant with `200 {"error": "invalid_grant"}`.
    pub fn into_token(self) -> Result<RedditToken, RedditApiError> {
        if let Some(reason) = self.error {
            return Err(RedditApiError::AuthenticationFailed { reason });
        }
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RedditApiError::InvalidResponse {
                details: "token response without access_token".to_string(),
            })?;

        Ok(RedditToken {
            access_token,
            expires_at: SystemTime::now() + Duration::from_secs(self.expires_in.unwrap_or(3600)),
            scope: self
                .scope
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditUserData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub comment_karma: i64,
}

#[derive(Debug, Deserialize)]
pub struct CommentResponse {
    pub json: CommentResponseBody,
}

#[derive(Debug, Deserialize)]
pub struct CommentResponseBody {
    #[serde(default)]
    pub errors: Vec<Vec<Value>>,
    pub data: Option<CommentResponseData>,
}

#[derive(Debug, Deserialize)]
pub struct CommentResponseData {
    #[serde(default)]
    pub things: Vec<CommentThing>,
}

#[derive(Debug, Deserialize)]
pub struct CommentThing {
    pub data: CommentThingData,
}

#[derive(Debug, Deserialize)]
pub struct CommentThingData {
    pub id: String,
    pub permalink: Option<String>,
}

impl CommentResponse {
    pub fn into_posted(self) -> Result<PostedComment, RedditApiError> {
        if !self.json.errors.is_empty() {
            let reasons = self
                .json
                .errors
                .iter()
                .map(|entry| {
                    entry
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(": ")
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RedditApiError::CommentRejected { reasons });
        }

        let thing = self
            .json
            .data
            .and_then(|data| data.things.into_iter().next())
            .ok_or_else(|| RedditApiError::InvalidResponse {
                details: "comment response without a created thing".to_string(),
            })?;

        let permalink = thing
            .data
            .permalink
            .ok_or_else(|| RedditApiError::InvalidResponse {
                details: format!("comment {} has no permalink", thing.data.id),
            })?;

        Ok(PostedComment {
            comment_id: thing.data.id,
            comment_url: format!("{}{}", REDDIT_WEB_BASE, permalink),
        })
    }
}

/// Prefix a bare id with its Reddit type (`t1` comment, `t3` link).
pub fn fullname(kind: &str, id: &str) -> String {
    let prefix = format!("{}_", kind);
    if id.starts_with(&prefix) {
        id.to_string()
    } else {
        format!("{}{}", prefix, id)
    }
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    user_agent: String,
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
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Script-app password grant.
    pub async fn request_token(
        &self,
        client_id: &str,
        client_secret: &str,
        username: &str,
        password: &str,
    ) -> Result<RedditToken, CoreError> {
        info!("Requesting Reddit access token for u/{}", username);
        let response = self
            .http_client
            .post(REDDIT_TOKEN_URL)
            .basic_auth(client_id, Some(client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
            ])
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(RedditApiError::AuthenticationFailed {
                reason: "client id or secret rejected".to_string(),
            }
            .into());
        }
        if !status.is_success() {
            error!("Token request failed with status: {}", status);
            return Err(RedditApiError::AuthenticationFailed {
                reason: format!("token endpoint returned {}", status),
            }
            .into());
        }

        let body: AccessTokenResponse = response.json().await.map_err(|e| {
            error!("Failed to parse token response: {}", e);
            RedditApiError::InvalidResponse {
                details: "Failed to parse token response".to_string(),
            }
        })?;

        Ok(body.into_token()?)
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
        form: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", REDDIT_API_BASE, endpoint);

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token)
            .header("User-Agent", &self.user_agent);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }
        if let Some(fields) = form {
            request_builder = request_builder.form(fields);
        }

        info!("Making Reddit API request: {} {}", method, endpoint);
        let response = request_builder.send().await.map_err(|e| {
            error!("Network error for {} {}: {}", method, endpoint, e);
            map_send_error(e)
        })?;

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        Err(match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                RedditApiError::RateLimitExceeded { retry_after }.into()
            }
            401 => RedditApiError::InvalidToken.into(),
            403 => RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            }
            .into(),
            404 => RedditApiError::InvalidResponse {
                details: "Resource not found".to_string(),
            }
            .into(),
            code if status.is_server_error() => {
                RedditApiError::ServerError { status_code: code }.into()
            }
            code => CoreError::RequestFailed {
                message: format!("{} {} returned {}", method, endpoint, status),
                status_code: Some(code),
            },
        })
    }

    pub async fn get_user_info(&self, access_token: &str) -> Result<RedditUserData, CoreError> {
        let response = self
            .make_request(Method::GET, "/api/v1/me", access_token, None, None)
            .await?;

        let user_data: RedditUserData = response.json().await.map_err(|e| {
            error!("Failed to parse user data: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: "Failed to parse user data".to_string(),
            })
        })?;

        debug!("Retrieved user info for: {}", user_data.name);
        Ok(user_data)
    }

    /// Reply to `thing_id` (a `t1_`/`t3_` fullname).
    pub async fn submit_comment(
        &self,
        access_token: &str,
        thing_id: &str,
        text: &str,
    ) -> Result<PostedComment, CoreError> {
        let form = [("api_type", "json"), ("thing_id", thing_id), ("text", text)];
        let response = self
            .make_request(Method::POST, "/api/comment", access_token, None, Some(&form[..]))
            .await
            .map_err(|e| match e {
                CoreError::RedditApi(RedditApiError::InvalidResponse { .. }) => {
                    RedditApiError::ThingNotFound {
                        thing_id: thing_id.to_string(),
                    }
                    .into()
                }
                other => other,
            })?;

        let body: CommentResponse = response.json().await.map_err(|e| {
            error!("Failed to parse comment response: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse comment response for {}", thing_id),
            })
        })?;

        let posted = body.into_posted()?;
        info!("Posted comment {} under {}", posted.comment_id, thing_id);
        Ok(posted)
    }
}

fn map_send_error(e: reqwest::Error) -> CoreError {
    if e.is_timeout() {
        CoreError::RedditApi(RedditApiError::RequestTimeout)
    } else {
        CoreError::Network(e)
    }
}
