//! Runtime configuration.
//!
//! Values come from an optional TOML file and are then overridden by environment
//! variables, so a deployment can keep secrets out of the file entirely.

use crate::error::ConfigError;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_SENDER: &str = "admin@f5bot.com";
pub const DEFAULT_SUBJECT_FILTER: &str = "debt recycling";
pub const DEFAULT_LABEL: &str = "Automations/F5 Bot";
pub const DEFAULT_CALCULATOR_URL: &str = "https://debt-recycler.aufintools.com";
pub const DEFAULT_LEARN_URL: &str = "https://debt-recycler.aufintools.com/learn";
pub const DEFAULT_USER_AGENT: &str = "DebtRecyclingBot/1.0 by /u/yourusername";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_RELEVANCE_PROMPT: &str = r#"You are analysing Reddit posts and comments about debt recycling and leveraged investing in an Australian context.

Determine if this post/comment is relevant to debt recycling, leveraged investing, or related financial strategies in an Australian context.

A post is relevant if it:
- Asks questions about debt recycling, leveraged investing, or calculators related to these topics.
- Discusses debt recycling strategies or questions about doing it in single name, joint names.
- Mentions leveraged investing in the context of purchasing ETFs or shares
- Asks about using home equity for investing in ETFs or Shares
- Discusses tax-effective investment strategies involving debt

A post is NOT relevant if it:
- Is about general debt management (not recycling), tax structures for recycling such as trusts or companies
- Is about credit card debt or consumer debt
- Is spam or promotional content
- Is completely unrelated to finance/investing

Respond with ONLY "RELEVANT" or "NOT_RELEVANT" followed by a brief one-sentence explanation."#;

pub const DEFAULT_RESPONSE_PROMPT_TEMPLATE: &str = r#"You are a helpful reddit user experienced in debt recycling and leveraged investing for ETFs and Shares in an Australian context.

A Reddit user has posted the following about debt recycling:

---
{post_content}
---

Craft a helpful, concise response (2-3 sentences) that:
1. Provides a small piece of useful information or clarification about debt recycling
2. Is friendly and non-promotional
3. Directs them to either:
   - {calculator_url} (if they need a calculator or want to calculate something)
   - {learn_url} (if they want to learn more about debt recycling and leveraged investing)

Choose the most appropriate link based on their question. If they're asking "how do I calculate" or "what would my numbers be", or help with their scenario use the calculator. Otherwise, use the learn page.

Keep the response natural and helpful. Do not be overly salesy or promotional."#;

pub const DEFAULT_CALCULATOR_KEYWORDS: &[&str] = &[
    "calculate",
    "how much",
    "numbers",
    "figure out",
    "work out",
    "what would",
    "estimate",
    "compute",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mailbox: MailboxConfig,
    pub oracle: OracleConfig,
    pub reddit: RedditConfig,
    pub database: DatabaseConfig,
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    pub sender: String,
    pub subject_filter: String,
    pub label: Option<String>,
    /// Full search query; when set, `sender`, `subject_filter` and `label` are ignored.
    pub query: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            sender: DEFAULT_SENDER.to_string(),
            subject_filter: DEFAULT_SUBJECT_FILTER.to_string(),
            label: Some(DEFAULT_LABEL.to_string()),
            query: None,
            client_id: None,
            client_secret: None,
            refresh_token: None,
        }
    }
}

impl MailboxConfig {
    pub fn query(&self) -> String {
        if let Some(query) = &self.query {
            return query.clone();
        }

        let mut query = format!(
            "from:{} subject:\"{}\"",
            self.sender, self.subject_filter
        );
        if let Some(label) = self.label.as_deref().filter(|l| !l.is_empty()) {
            query.push_str(&format!(" label:\"{}\"", label));
        }
        query
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub relevance_prompt: String,
    pub response_prompt_template: String,
    pub calculator_url: String,
    pub learn_url: String,
    pub calculator_keywords: Vec<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            relevance_prompt: DEFAULT_RELEVANCE_PROMPT.to_string(),
            response_prompt_template: DEFAULT_RESPONSE_PROMPT_TEMPLATE.to_string(),
            calculator_url: DEFAULT_CALCULATOR_URL.to_string(),
            learn_url: DEFAULT_LEARN_URL.to_string(),
            calculator_keywords: DEFAULT_CALCULATOR_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_agent: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl RedditConfig {
    /// Script-app credentials are all-or-nothing.
    pub fn has_credentials(&self) -> bool {
        [
            &self.client_id,
            &self.client_secret,
            &self.username,
            &self.password,
        ]
        .iter()
        .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: std::env::temp_dir().join("processed_emails.db"),
        }
    }
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub enabled: bool,
    /// Falls back to the mailbox owner when unset.
    pub recipient: Option<String>,
    pub bot_name: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recipient: None,
            bot_name: "Reddit Debt Recycling Bot".to_string(),
        }
    }
}

/// Authorized-user token blob as exported by Google's OAuth tooling.
#[derive(Debug, Deserialize)]
struct AuthorizedUserInfo {
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load the file (if given) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let contents =
                    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    })?;
                Self::from_toml_str(&contents)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Empty values count as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token_json) = get("GMAIL_TOKEN_JSON") {
            let info = parse_authorized_user(&token_json)?;
            self.mailbox.client_id = info.client_id.or(self.mailbox.client_id.take());
            self.mailbox.client_secret = info.client_secret.or(self.mailbox.client_secret.take());
            self.mailbox.refresh_token = info.refresh_token.or(self.mailbox.refresh_token.take());
        }
        if let Some(v) = get("GMAIL_CLIENT_ID") {
            self.mailbox.client_id = Some(v);
        }
        if let Some(v) = get("GMAIL_CLIENT_SECRET") {
            self.mailbox.client_secret = Some(v);
        }
        if let Some(v) = get("GMAIL_REFRESH_TOKEN") {
            self.mailbox.refresh_token = Some(v);
        }
        if let Some(v) = get("F5BOT_LABEL") {
            self.mailbox.label = Some(v);
        }
        if let Some(v) = get("GMAIL_QUERY") {
            self.mailbox.query = Some(v);
        }

        if let Some(v) = get("GEMINI_API_KEY") {
            self.oracle.api_key = Some(v);
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.oracle.model = v;
        }

        if let Some(v) = get("REDDIT_CLIENT_ID") {
            self.reddit.client_id = Some(v);
        }
        if let Some(v) = get("REDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = Some(v);
        }
        if let Some(v) = get("REDDIT_USERNAME") {
            self.reddit.username = Some(v);
        }
        if let Some(v) = get("REDDIT_PASSWORD") {
            self.reddit.password = Some(v);
        }
        if let Some(v) = get("REDDIT_USER_AGENT") {
            self.reddit.user_agent = v;
        }

        if let Some(v) = get("DB_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = get("SUMMARY_EMAIL") {
            self.summary.recipient = Some(v);
        }

        Ok(())
    }

    /// Check the settings without which a run cannot start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("mailbox.client_id", &self.mailbox.client_id),
            ("mailbox.client_secret", &self.mailbox.client_secret),
            ("mailbox.refresh_token", &self.mailbox.refresh_token),
            ("oracle.api_key", &self.oracle.api_key),
        ];
        for (field, value) in required {
            if value.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        for (field, value) in [
            ("oracle.calculator_url", &self.oracle.calculator_url),
            ("oracle.learn_url", &self.oracle.learn_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.clone(),
                });
            }
        }

        if self.mailbox.query().trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "mailbox.query".to_string(),
                value: String::new(),
            });
        }

        Ok(())
    }
}

fn parse_authorized_user(raw: &str) -> Result<AuthorizedUserInfo, ConfigError> {
    let trimmed = raw.trim();
    let json = if trimmed.starts_with('{') {
        trimmed.to_string()
    } else {
        let bytes = general_purpose::STANDARD
            .decode(trimmed)
            .map_err(|e| ConfigError::InvalidFormat {
                details: format!("GMAIL_TOKEN_JSON is neither JSON nor base64: {e}"),
            })?;
        String::from_utf8(bytes).map_err(|e| ConfigError::InvalidFormat {
            details: format!("GMAIL_TOKEN_JSON is not UTF-8: {e}"),
        })?
    };

    serde_json::from_str(&json).map_err(|e| ConfigError::InvalidFormat {
        details: format!("GMAIL_TOKEN_JSON: {e}"),
    })
}
