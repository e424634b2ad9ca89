//! Gmail access for reading notification mail and sending the run summary.

pub mod mime;
pub mod payload;

use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{AuthUrl, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl};
use payload::{extract_text, GmailMessage, HtmlToText};
use replybot_core::{CoreError, MailMessage, MailboxConfig, MailboxError, OutgoingEmail};
use reqwest::{Client, Method, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};


const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

pub trait Mailbox {
    /// Ids of unread messages matching `query`.
    async fn list_unread(&self, query: &str) -> Result<Vec<String>, CoreError>;

    async fn fetch_message(&self, message_id: &str) -> Result<MailMessage, CoreError>;

    async fn mark_read(&self, message_id: &str) -> Result<(), CoreError>;
}

pub trait MailSender {
    /// Send `email`, returning the provider's id for the sent message. An empty recipient means
    /// the mailbox owner.
    async fn send_email(&self, email: &OutgoingEmail) -> Result<String, CoreError>;
}

/// Restrict `query` to unread mail.
pub fn unread_query(query: &str) -> String {
    let query = query.trim();
    if query.to_lowercase().contains("is:unread") {
        query.to_string()
    } else {
        format!("{} is:unread", query).trim().to_string()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    #[serde(default)]
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    secret: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

pub struct GmailClient {
    oauth: BasicClient,
    refresh_token: RefreshToken,
    http_client: Client,
    html: HtmlToText,
    access_token: Mutex<Option<CachedToken>>,
}

impl GmailClient {
    pub fn new(config: &MailboxConfig) -> Result<Self, CoreError> {
        let field = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| MailboxError::AuthenticationFailed {
                    reason: format!("{} is not configured", name),
                })
        };
        let client_id = field(&config.client_id, "client_id")?;
        let client_secret = field(&config.client_secret, "client_secret")?;
        let refresh_token = field(&config.refresh_token, "refresh_token")?;

        let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string()).map_err(|e| {
            MailboxError::AuthenticationFailed {
                reason: e.to_string(),
            }
        })?;
        let token_url = TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).map_err(|e| {
            MailboxError::AuthenticationFailed {
                reason: e.to_string(),
            }
        })?;

        let oauth = BasicClient::new(
            ClientId::new(client_id),
            Some(ClientSecret::new(client_secret)),
            auth_url,
            Some(token_url),
        );

        let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            oauth,
            refresh_token: RefreshToken::new(refresh_token),
            http_client,
            html: HtmlToText::new(),
            access_token: Mutex::new(None),
        })
    }

    /// Exchange the refresh token for an access token.
    pub async fn authenticate(&self) -> Result<(), CoreError> {
        self.refresh_access_token().await?;
        info!("Authenticated with Gmail");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token_slot()
            .as_ref()
            .is_some_and(|token| !token.is_expired())
    }

    /// The mailbox owner's address.
    pub async fn get_user_email(&self) -> Result<String, CoreError> {
        let response = self.make_request(Method::GET, "/profile", None, None).await?;
        let profile: Profile = parse_json(response, "/profile").await?;
        Ok(profile.email_address)
    }

    async fn refresh_access_token(&self) -> Result<String, CoreError> {
        let token = self
            .oauth
            .exchange_refresh_token(&self.refresh_token)
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                error!("Gmail token refresh failed: {}", e);
                MailboxError::AuthenticationFailed {
                    reason: e.to_string(),
                }
            })?;

        let secret = token.access_token().secret().clone();
        let lifetime = token.expires_in().unwrap_or(Duration::from_secs(3600));
        *self.token_slot() = Some(CachedToken {
            secret: secret.clone(),
            expires_at: Instant::now() + lifetime,
        });
        debug!("Gmail access token valid for {}s", lifetime.as_secs());
        Ok(secret)
    }

    async fn current_token(&self) -> Result<String, CoreError> {
        let cached = self.token_slot().clone();
        match cached {
            Some(token) if !token.is_expired() => Ok(token.secret),
            _ => self.refresh_access_token().await,
        }
    }

    async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: Option<&[(&str, &str)]>,
        body: Option<&Value>,
    ) -> Result<Response, CoreError> {
        let access_token = self.current_token().await?;
        let url = format!("{}{}", GMAIL_API_BASE, endpoint);

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token);
        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }
        if let Some(body) = body {
            request_builder = request_builder.json(body);
        }

        debug!("Gmail request: {} {}", method, endpoint);
        let response = request_builder.send().await.map_err(|e| {
            error!("Network error for {} {}: {}", method, endpoint, e);
            CoreError::Network(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        error!("Gmail request failed with status: {} for {}", status, endpoint);
        Err(match status.as_u16() {
            401 => MailboxError::AuthenticationFailed {
                reason: format!("{} rejected the access token", endpoint),
            }
            .into(),
            code => MailboxError::ApiError {
                endpoint: endpoint.to_string(),
                status_code: code,
            }
            .into(),
        })
    }

    fn token_slot(&self) -> MutexGuard<'_, Option<CachedToken>> {
        self.access_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn to_mail_message(&self, message: GmailMessage) -> Result<MailMessage, CoreError> {
        let payload = message
            .payload
            .ok_or_else(|| MailboxError::MalformedMessage {
                message_id: message.id.clone(),
                details: "message has no payload".to_string(),
            })?;

        let subject = payload.header("Subject").unwrap_or_default().to_string();
        let body = extract_text(&payload, &self.html).unwrap_or_default();
        Ok(MailMessage {
            id: message.id,
            subject,
            body,
        })
    }
}

impl Mailbox for GmailClient {
    async fn list_unread(&self, query: &str) -> Result<Vec<String>, CoreError> {
        let query = unread_query(query);
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![("q", query.as_str())];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let response = self
                .make_request(Method::GET, "/messages", Some(params.as_slice()), None)
                .await?;
            let page: ListResponse = parse_json(response, "/messages").await?;
            ids.extend(page.messages.into_iter().map(|m| m.id));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        info!("Found {} unread messages for {}", ids.len(), query);
        Ok(ids)
    }

    async fn fetch_message(&self, message_id: &str) -> Result<MailMessage, CoreError> {
        let endpoint = format!("/messages/{}", message_id);
        let response = self
            .make_request(Method::GET, &endpoint, Some(&[("format", "full")][..]), None)
            .await
            .map_err(|e| match e {
                CoreError::Mailbox(MailboxError::ApiError {
                    status_code: 404, ..
                }) => MailboxError::MessageNotFound {
                    message_id: message_id.to_string(),
                }
                .into(),
                other => other,
            })?;

        let message: GmailMessage = parse_json(response, &endpoint).await?;
        self.to_mail_message(message)
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), CoreError> {
        let endpoint = format!("/messages/{}/modify", message_id);
        let body = json!({ "removeLabelIds": ["UNREAD"] });
        self.make_request(Method::POST, &endpoint, None, Some(&body))
            .await?;
        debug!("Marked {} as read", message_id);
        Ok(())
    }
}

impl MailSender for GmailClient {
    async fn send_email(&self, email: &OutgoingEmail) -> Result<String, CoreError> {
        let to = if email.to.trim().is_empty() {
            self.get_user_email().await?
        } else {
            email.to.trim().to_string()
        };
        if to.is_empty() {
            return Err(MailboxError::NoRecipient.into());
        }

        let boundary = format!("replybot-{}", uuid::Uuid::new_v4().simple());
        let raw = mime::encode_raw(&mime::build_message(email, &to, &boundary));
        let response = self
            .make_request(
                Method::POST,
                "/messages/send",
                None,
                Some(&json!({ "raw": raw })),
            )
            .await?;

        let sent: SentMessage = parse_json(response, "/messages/send").await?;
        info!("Sent \"{}\" to {}", email.subject, to);
        Ok(sent.id)
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: Response,
    endpoint: &str,
) -> Result<T, CoreError> {
    response.json().await.map_err(|e| {
        error!("Failed to parse response from {}: {}", endpoint, e);
        MailboxError::MalformedMessage {
            message_id: endpoint.to_string(),
            details: e.to_string(),
        }
        .into()
    })
}
