use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Reddit post or comment referenced by a notification email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReference {
    pub url: String,
    pub post_id: String,
    pub comment_id: Option<String>,
    pub content: String,
    pub subject: String,
}

impl ParsedReference {
    pub fn is_comment(&self) -> bool {
        self.comment_id.is_some()
    }
}

/// One row of the processed-email ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub message_id: String,
    pub reddit_url: String,
    pub post_id: String,
    pub comment_id: Option<String>,
    pub relevant: bool,
    pub response_posted: bool,
    pub response_url: Option<String>,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_processed: u64,
    pub relevant: u64,
    pub responses_posted: u64,
}

/// A notification mail with its body already reduced to plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub id: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Empty means "send to the mailbox owner".
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceVerdict {
    pub relevant: bool,
    pub explanation: String,
}

/// A reply that Reddit accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedComment {
    pub comment_id: String,
    pub comment_url: String,
}
