pub mod api;

pub use api::{fullname, RedditApiClient, RedditUserData};

use replybot_core::{CoreError, PostedComment, RedditApiError, RedditConfig};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};


/// Tokens are refreshed this long before Reddit would reject them.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Posts replies on Reddit.
pub trait Gateway {
    /// Reply directly to a submission.
    async fn post_top_level(&self, post_id: &str, text: &str)
        -> Result<PostedComment, CoreError>;

    /// Reply to an existing comment.
    async fn post_reply(&self, comment_id: &str, text: &str) -> Result<PostedComment, CoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub enum AuthState {
    NotAuthenticated,
    Authenticated { token: RedditToken, username: String },
    TokenExpired { username: String },
}

#[derive(Debug, Clone)]
struct Credentials {
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
}

/// Script-app Reddit account used to post replies.
pub struct RedditClient {
    credentials: Credentials,
    api: RedditApiClient,
    auth_state: Mutex<AuthState>,
}

impl RedditClient {
    pub fn new(config: &RedditConfig) -> Result<Self, CoreError> {
        let credentials = match (
            config.client_id.as_deref(),
            config.client_secret.as_deref(),
            config.username.as_deref(),
            config.password.as_deref(),
        ) {
            (Some(client_id), Some(client_secret), Some(username), Some(password))
                if config.has_credentials() =>
            {
                Credentials {
                    client_id: client_id.to_string(),
                    client_secret: client_secret.to_string(),
                    username: username.to_string(),
                    password: password.to_string(),
                }
            }
            _ => {
                return Err(RedditApiError::AuthenticationFailed {
                    reason: "Reddit credentials are not configured".to_string(),
                }
                .into())
            }
        };

        Ok(Self {
            credentials,
            api: RedditApiClient::new(config.user_agent.clone())?,
            auth_state: Mutex::new(AuthState::NotAuthenticated),
        })
    }

    /// Obtain a token and confirm the account identity. Returns the account name.
    pub async fn authenticate(&self) -> Result<String, CoreError> {
        let token = self.fetch_token().await?;
        let user = self.api.get_user_info(&token.access_token).await?;

        info!("Authenticated with Reddit as u/{}", user.name);
        self.set_token(token, user.name.clone());
        Ok(user.name)
    }

    pub fn set_token(&self, token: RedditToken, username: String) {
        *self.state() = if token.is_expired() {
            AuthState::TokenExpired { username }
        } else {
            AuthState::Authenticated { token, username }
        };
    }

    pub fn get_auth_state(&self) -> AuthState {
        self.state().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(&*self.state(), AuthState::Authenticated { token, .. } if !token.is_expired())
    }

    pub fn needs_refresh(&self) -> bool {
        match &*self.state() {
            AuthState::Authenticated { token, .. } => token.is_expired(),
            AuthState::TokenExpired { .. } => true,
            AuthState::NotAuthenticated => false,
        }
    }

    /// A usable access token, renewing it if it has expired since `authenticate`.
    pub async fn ensure_authenticated(&self) -> Result<String, CoreError> {
        let username = match self.get_auth_state() {
            AuthState::Authenticated { token, .. } if !token.is_expired() => {
                return Ok(token.access_token)
            }
            AuthState::Authenticated { username, .. } | AuthState::TokenExpired { username } => {
                username
            }
            AuthState::NotAuthenticated => {
                return Err(RedditApiError::AuthenticationFailed {
                    reason: "Not authenticated with Reddit".to_string(),
                }
                .into())
            }
        };

        warn!("Reddit token expired, requesting a new one");
        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        self.set_token(token, username);
        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<RedditToken, CoreError> {
        self.api
            .request_token(
                &self.credentials.client_id,
                &self.credentials.client_secret,
                &self.credentials.username,
                &self.credentials.password,
            )
            .await
    }

    fn state(&self) -> MutexGuard<'_, AuthState> {
        self.auth_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Gateway for RedditClient {
    async fn post_top_level(
        &self,
        post_id: &str,
        text: &str,
    ) -> Result<PostedComment, CoreError> {
        let access_token = self.ensure_authenticated().await?;
        self.api
            .submit_comment(&access_token, &fullname("t3", post_id), text)
            .await
    }

    async fn post_reply(&self, comment_id: &str, text: &str) -> Result<PostedComment, CoreError> {
        let access_token = self.ensure_authenticated().await?;
        self.api
            .submit_comment(&access_token, &fullname("t1", comment_id), text)
            .await
    }
}
